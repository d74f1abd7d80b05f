//! Staging reclamation reporting types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome of one reclamation sweep over the staging area.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepStats {
    /// Top-level session directories inspected.
    pub directories_scanned: u64,
    /// Directories removed (or that would be, in dry-run mode).
    pub directories_deleted: u64,
    /// Directories touched within the threshold and left alone.
    pub directories_active: u64,
    pub bytes_reclaimed: u64,
    pub errors: u64,
}

impl SweepStats {
    /// Reclaimed space in MiB, for log lines.
    pub fn mib_reclaimed(&self) -> f64 {
        self.bytes_reclaimed as f64 / (1024.0 * 1024.0)
    }
}

/// Snapshot of the staging area.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingStats {
    pub staging_root: PathBuf,
    pub root_exists: bool,
    pub staged_directory_count: u64,
    pub total_staged_bytes: u64,
}

/// What started a sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepTrigger {
    Scheduled,
    Manual,
}

impl SweepTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for SweepTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
