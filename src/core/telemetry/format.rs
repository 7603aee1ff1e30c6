//! Display formatting for metric values.
//!
//! Formatters are plain data evaluated by [`ValueFormat::format`], so a series
//! can carry its formatting rule without holding a closure.

use serde::{Deserialize, Serialize};

/// How the latest value of a series is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueFormat {
    /// `" 42.0%"`
    Percent,
    /// `"231.4 W"`
    Unit { unit: String },
    /// Percentage of a known total, e.g. `" 50.0% - 8.00 GiB"`.
    ///
    /// With `normed` the input is a fraction in `0.0..=1.0` instead of a
    /// percentage.
    Memory { total_bytes: f64, normed: bool },
}

impl ValueFormat {
    pub fn unit<S: Into<String>>(unit: S) -> Self {
        ValueFormat::Unit { unit: unit.into() }
    }

    pub fn memory(total_bytes: f64) -> Self {
        ValueFormat::Memory {
            total_bytes,
            normed: false,
        }
    }

    pub fn format(&self, value: f64) -> String {
        match self {
            ValueFormat::Percent => format!("{}%", signed_space(value, 1)),
            ValueFormat::Unit { unit } => format!("{:.1} {}", value, unit),
            ValueFormat::Memory {
                total_bytes,
                normed,
            } => format_memory(value, *total_bytes, *normed),
        }
    }
}

/// Fallback used when a series has no bound format.
pub fn format_plain(value: f64) -> String {
    format!("{:.2}", value)
}

fn format_memory(value: f64, total_bytes: f64, normed: bool) -> String {
    let fraction = if normed { value } else { value / 100.0 };
    let percent = if normed { value * 100.0 } else { value };
    let bytes = total_bytes * fraction;

    let (scaled, suffix) = if bytes >= 1e9 {
        (bytes / 1e9, "GiB")
    } else if bytes >= 1e6 {
        (bytes / 1e6, "MiB")
    } else if bytes >= 1e3 {
        (bytes / 1e3, "KiB")
    } else {
        (bytes, "B")
    };

    format!(
        "{}% -{} {}",
        signed_space(percent, 1),
        signed_space(scaled, 2),
        suffix
    )
}

/// Fixed-precision number with a leading space in place of a plus sign.
fn signed_space(value: f64, precision: usize) -> String {
    if value.is_sign_negative() {
        format!("{:.*}", precision, value)
    } else {
        format!(" {:.*}", precision, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_gib() {
        let format = ValueFormat::memory(16_000_000_000.0);
        assert_eq!(format.format(50.0), " 50.0% - 8.00 GiB");
    }

    #[test]
    fn test_memory_unit_thresholds() {
        let format = ValueFormat::memory(1_000_000_000.0);
        assert_eq!(format.format(10.0), " 10.0% - 100.00 MiB");
        assert_eq!(format.format(0.001), " 0.0% - 10.00 KiB");
        assert_eq!(format.format(0.00001), " 0.0% - 100.00 B");
    }

    #[test]
    fn test_memory_normed_input() {
        let format = ValueFormat::Memory {
            total_bytes: 16_000_000_000.0,
            normed: true,
        };
        assert_eq!(format.format(0.25), " 25.0% - 4.00 GiB");
    }

    #[test]
    fn test_percent_and_unit() {
        assert_eq!(ValueFormat::Percent.format(42.0), " 42.0%");
        assert_eq!(ValueFormat::unit("W").format(231.44), "231.4 W");
        assert_eq!(ValueFormat::unit("°C").format(61.0), "61.0 °C");
        assert_eq!(format_plain(3.14159), "3.14");
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&ValueFormat::unit("W")).unwrap();
        assert_eq!(json, r#"{"kind":"unit","unit":"W"}"#);
    }
}
