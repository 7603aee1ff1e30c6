//! `nvidia-smi dmon` columnar output.
//!
//! ```text
//! # gpu    pwr  gtemp  mtemp     sm    mem    enc    dec    jpg    ofa   mclk   pclk
//! # Idx      W      C      C      %      %      %      %      %      %    MHz    MHz
//!     0     75     60      -     12      8      0      0      0      0   9501   2520
//! ```

use serde::Serialize;

/// Column positions of the values we read, counted on whitespace-split fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DmonSchema {
    pub power: usize,
    pub temperature: Option<usize>,
    pub utilization: usize,
    pub memory: usize,
}

impl DmonSchema {
    /// `gpu pwr gtemp mtemp sm mem ...`
    pub const STANDARD: DmonSchema = DmonSchema {
        power: 1,
        temperature: Some(2),
        utilization: 4,
        memory: 5,
    };

    /// Older drivers: `gpu pwr sm mem ...`, no temperature column.
    pub const LEGACY: DmonSchema = DmonSchema {
        power: 1,
        temperature: None,
        utilization: 2,
        memory: 3,
    };

    /// Minimum number of fields a data line must have.
    pub fn required_columns(&self) -> usize {
        let max = self
            .power
            .max(self.utilization)
            .max(self.memory)
            .max(self.temperature.unwrap_or(0));
        max + 1
    }

    /// Build a schema from the tool's column-name header, if it names the
    /// columns we need.
    pub fn from_header(line: &str) -> Option<Self> {
        let body = line.trim().trim_start_matches('#');
        let columns: Vec<&str> = body.split_whitespace().collect();
        let position = |name: &str| columns.iter().position(|c| c.eq_ignore_ascii_case(name));

        Some(DmonSchema {
            power: position("pwr")?,
            temperature: position("gtemp").or_else(|| position("temp")),
            utilization: position("sm")?,
            memory: position("mem")?,
        })
    }
}

impl Default for DmonSchema {
    fn default() -> Self {
        DmonSchema::STANDARD
    }
}

/// One parsed data row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DmonSample {
    pub power_watts: f64,
    pub temperature_celsius: Option<i64>,
    pub utilization_percent: i64,
    pub memory_percent: i64,
}

impl DmonSample {
    /// Values in schema order: power, temperature (if present), utilization, memory.
    pub fn values(&self) -> Vec<f64> {
        let mut values = vec![self.power_watts];
        if let Some(temp) = self.temperature_celsius {
            values.push(temp as f64);
        }
        values.push(self.utilization_percent as f64);
        values.push(self.memory_percent as f64);
        values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Metrics(DmonSample),
    /// A comment line that named the columns.
    Header(DmonSchema),
    Ignorable,
    Malformed(String),
}

/// Line parser carrying the schema currently in effect.
#[derive(Debug, Clone, Default)]
pub struct DmonParser {
    schema: DmonSchema,
}

impl DmonParser {
    pub fn new(schema: DmonSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> DmonSchema {
        self.schema
    }

    pub fn parse_line(&mut self, line: &str) -> ParsedLine {
        let line = line.trim();
        if line.is_empty() {
            return ParsedLine::Ignorable;
        }

        if line.starts_with('#') {
            return match DmonSchema::from_header(line) {
                Some(schema) => {
                    self.schema = schema;
                    ParsedLine::Header(schema)
                }
                None => ParsedLine::Ignorable,
            };
        }

        match parse_fields(line, &self.schema) {
            Some(sample) => ParsedLine::Metrics(sample),
            None => ParsedLine::Malformed(line.to_string()),
        }
    }
}

/// Parse a data line against `schema` without touching parser state.
pub fn parse_fields(line: &str, schema: &DmonSchema) -> Option<DmonSample> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    let power_watts = fields.get(schema.power)?.parse::<f64>().ok()?;
    let temperature_celsius = match schema.temperature {
        Some(index) => Some(fields.get(index)?.parse::<i64>().ok()?),
        None => None,
    };
    let utilization_percent = fields.get(schema.utilization)?.parse::<i64>().ok()?;
    let memory_percent = fields.get(schema.memory)?.parse::<i64>().ok()?;

    Some(DmonSample {
        power_watts,
        temperature_celsius,
        utilization_percent,
        memory_percent,
    })
}
