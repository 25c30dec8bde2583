use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::prng::{Generation, Seed};
use crate::session::{Frame, Mode, Sides};

/// Everything known about a failed session at the moment it failed.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub mode: Mode,
    pub generation: Generation,
    pub seed: Seed,
    pub seed_hex: String,
    pub error: String,
    pub input_log: Vec<String>,
    pub frames: Sides<Vec<Frame>>,
    pub partial: Sides<Frame>,
}

impl FailureReport {
    pub fn log_name(&self) -> String {
        self.seed.log_name()
    }
}

/// Where failed sessions are handed off for persistence or display.
pub trait FailureSink {
    fn record(&mut self, report: &FailureReport);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FailureSink for NullSink {
    fn record(&mut self, _report: &FailureReport) {}
}

#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub reports: Vec<FailureReport>,
}

impl FailureSink for MemorySink {
    fn record(&mut self, report: &FailureReport) {
        self.reports.push(report.clone());
    }
}

/// Writes each failed session's input log into a directory, named so that
/// `lockstep replay <seed hex>` finds it.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    pub written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    fn write(&self, report: &FailureReport) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(report.log_name());
        fs::write(&path, report.input_log.join("\n"))?;
        Ok(path)
    }
}

impl FailureSink for DirectorySink {
    fn record(&mut self, report: &FailureReport) {
        match self.write(report) {
            Ok(path) => {
                info!(target: "lockstep.report", path = %path.display(), "input log written");
                self.written.push(path);
            }
            Err(err) => warn!(
                target: "lockstep.report",
                dir = %self.dir.display(),
                error = %err,
                "could not write input log"
            ),
        }
    }
}

/// The binary and subcommand a failure's `reproduce` line is meant for.
pub const REPRODUCE_COMMAND: &str = "lockstep run";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub id: String,
    pub timestamp: String,
    pub seed: Seed,
    pub seed_hex: String,
    pub summary: BatchSummary,
    pub failures: Vec<FailureSummary>,
}

impl BatchReport {
    pub fn new(id: impl Into<String>, seed: Seed) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now().to_rfc3339(),
            seed,
            seed_hex: seed.to_hex(),
            summary: BatchSummary {
                status: ReportStatus::Pass,
                sessions: 0,
                failures: 0,
            },
            failures: Vec::new(),
        }
    }

    pub fn record_pass(&mut self) {
        self.summary.sessions += 1;
    }

    pub fn record_failure(&mut self, failure: FailureSummary) {
        self.summary.sessions += 1;
        self.summary.failures += 1;
        self.summary.status = ReportStatus::Fail;
        self.failures.push(failure);
    }

    /// Failure count, which wrappers use as the process exit status.
    pub fn exit_code(&self) -> i32 {
        i32::try_from(self.summary.failures).unwrap_or(i32::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub status: ReportStatus,
    pub sessions: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSummary {
    pub generation: Generation,
    /// Also the seed generator's state when the session was set up, which is
    /// what `reproduce` restarts from.
    pub seed: Seed,
    pub seed_hex: String,
    pub log_name: String,
    pub error: String,
    pub reproduce: String,
}

impl FailureSummary {
    pub fn new(generation: Generation, seed: Seed, error: impl Into<String>) -> Self {
        Self {
            generation,
            seed,
            seed_hex: seed.to_hex(),
            log_name: seed.log_name(),
            error: error.into(),
            reproduce: format!(
                "{REPRODUCE_COMMAND} --cycles=1 --gen={} --seed={seed}",
                generation.num()
            ),
        }
    }
}
