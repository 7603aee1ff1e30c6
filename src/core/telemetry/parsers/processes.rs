//! `nvidia-smi --query-compute-apps=pid,name,used_gpu_memory --format=csv,noheader,nounits`

use serde::Serialize;

/// Text the tool prints when the query is unsupported on this device.
pub const NOT_SUPPORTED: &str = "[Not Supported]";

pub const PLACEHOLDER_TEXT: &str = "No running processes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProcessRow {
    Process {
        pid: String,
        name: String,
        /// Used GPU memory, already suffixed (`"512 MB"`)
        memory: String,
    },
    Placeholder,
}

impl ProcessRow {
    pub fn process<P, N, M>(pid: P, name: N, memory: M) -> Self
    where
        P: Into<String>,
        N: Into<String>,
        M: Into<String>,
    {
        ProcessRow::Process {
            pid: pid.into(),
            name: name.into(),
            memory: memory.into(),
        }
    }

    /// Cells for a `PID | Name | Memory` table.
    pub fn cells(&self) -> [&str; 3] {
        match self {
            ProcessRow::Process { pid, name, memory } => [pid, name, memory],
            ProcessRow::Placeholder => [PLACEHOLDER_TEXT, "", ""],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessListing {
    pub rows: Vec<ProcessRow>,
    /// Lines skipped because they did not have three fields
    pub malformed: Vec<String>,
}

pub fn parse_process_rows(output: &str) -> ProcessListing {
    if output.trim().is_empty() || output.contains(NOT_SUPPORTED) {
        return ProcessListing {
            rows: vec![ProcessRow::Placeholder],
            malformed: Vec::new(),
        };
    }

    let mut listing = ProcessListing::default();
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        match fields.as_slice() {
            [pid, name, memory] => listing
                .rows
                .push(ProcessRow::process(*pid, *name, format!("{} MB", memory))),
            _ => listing.malformed.push(line.to_string()),
        }
    }
    listing
}
