//! JSONL append-only log of completed pipeline runs.
//!
//! One JSON object per line, written after a run reaches `Done` or `Failed`.
//! Malformed lines are skipped on read so a torn write never hides the
//! rest of the log.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{PipelineState, RunReport};
use crate::stages::{Stage, StageReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: Stage,
    pub ok: usize,
    pub skipped: usize,
}

impl From<&StageReport> for StageSummary {
    fn from(report: &StageReport) -> Self {
        Self {
            stage: report.stage,
            ok: report.succeeded(),
            skipped: report.skipped(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    Done,
    Failed,
}

impl fmt::Display for FinalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalState::Done => f.write_str("done"),
            FinalState::Failed => f.write_str("failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_state: FinalState,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub stage_summaries: Vec<StageSummary>,
}

impl RunRecord {
    pub fn from_report(report: &RunReport) -> Self {
        let (final_state, failed_stage, error) = match &report.state {
            PipelineState::Failed { stage, error } => {
                (FinalState::Failed, Some(*stage), Some(error.clone()))
            }
            _ => (FinalState::Done, None, None),
        };
        Self {
            run_id: report.run_id.clone(),
            started_at: report.started_at,
            finished_at: report.finished_at,
            final_state,
            failed_stage,
            error,
            stage_summaries: report.stages.iter().map(StageSummary::from).collect(),
        }
    }
}

pub struct RunHistory {
    path: PathBuf,
}

impl RunHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, record: &RunRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }

    /// All records in file order. A missing file is an empty history.
    pub fn load_all(&self) -> io::Result<Vec<RunRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "skipping malformed history line"
                ),
            }
        }
        Ok(records)
    }

    /// The most recent `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> io::Result<Vec<RunRecord>> {
        let mut records = self.load_all()?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
