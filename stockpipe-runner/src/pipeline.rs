//! The fixed extract → parse → load → unify chain.
//!
//! Each stage runs to completion before the next starts. The first fatal
//! stage error moves the pipeline to `Failed` and no later stage runs.
//! There is no resume: a failed run is retried from the extract stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use stockpipe_core::provider::DailySeriesSource;
use stockpipe_core::secrets::SecretStore;
use stockpipe_core::storage::ObjectStore;
use stockpipe_core::warehouse::Warehouse;
use stockpipe_core::PipelineConfig;

use crate::ids::job_id;
use crate::stages::{self, Stage, StageError, StageReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Extracting,
    Parsing,
    Loading,
    Unifying,
    Done,
    Failed { stage: Stage, error: String },
}

impl PipelineState {
    fn running(stage: Stage) -> Self {
        match stage {
            Stage::Extract => PipelineState::Extracting,
            Stage::Parse => PipelineState::Parsing,
            Stage::Load => PipelineState::Loading,
            Stage::Unify => PipelineState::Unifying,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Pending => f.write_str("pending"),
            PipelineState::Extracting => f.write_str("extracting"),
            PipelineState::Parsing => f.write_str("parsing"),
            PipelineState::Loading => f.write_str("loading"),
            PipelineState::Unifying => f.write_str("unifying"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed { stage, .. } => write!(f, "failed ({stage})"),
        }
    }
}

/// The fatal error that ended a run, with the stage it happened in.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

/// Outcome of one full run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: PipelineState,
    /// Reports of the stages that completed, in run order.
    pub stages: Vec<StageReport>,
    pub error: Option<PipelineError>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Done
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn into_result(self) -> Result<Vec<StageReport>, PipelineError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.stages),
        }
    }
}

/// Explicit run context: configuration plus every external collaborator.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    secrets: &'a dyn SecretStore,
    source: &'a dyn DailySeriesSource,
    store: &'a dyn ObjectStore,
    warehouse: &'a dyn Warehouse,
    state: PipelineState,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        secrets: &'a dyn SecretStore,
        source: &'a dyn DailySeriesSource,
        store: &'a dyn ObjectStore,
        warehouse: &'a dyn Warehouse,
    ) -> Self {
        Self {
            config,
            secrets,
            source,
            store,
            warehouse,
            state: PipelineState::Pending,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn extract(&self) -> Result<StageReport, StageError> {
        stages::extract(self.config, self.secrets, self.source, self.store)
    }

    pub fn parse(&self) -> Result<StageReport, StageError> {
        stages::parse(self.config, self.store)
    }

    pub fn load(&self) -> Result<StageReport, StageError> {
        stages::load(self.config, self.store, self.warehouse)
    }

    pub fn unify(&self) -> Result<StageReport, StageError> {
        stages::unify(self.config, self.warehouse)
    }

    pub fn run_stage(&self, stage: Stage) -> Result<StageReport, StageError> {
        match stage {
            Stage::Extract => self.extract(),
            Stage::Parse => self.parse(),
            Stage::Load => self.load(),
            Stage::Unify => self.unify(),
        }
    }

    /// Run all four stages in order.
    pub fn run(&mut self) -> RunReport {
        let run_id = job_id();
        let started_at = Utc::now();
        self.state = PipelineState::Pending;
        tracing::info!(run_id = %run_id, symbols = self.config.symbols.len(), "pipeline run started");

        let mut reports = Vec::with_capacity(Stage::ORDER.len());
        let mut error = None;
        for stage in Stage::ORDER {
            self.state = PipelineState::running(stage);
            match self.run_stage(stage) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    self.state = PipelineState::Failed {
                        stage,
                        error: e.to_string(),
                    };
                    error = Some(PipelineError { stage, source: e });
                    break;
                }
            }
        }
        if error.is_none() {
            self.state = PipelineState::Done;
        }

        let finished_at = Utc::now();
        match &error {
            None => tracing::info!(run_id = %run_id, "pipeline run finished"),
            Some(e) => tracing::error!(run_id = %run_id, stage = %e.stage, error = %e.source, "pipeline run failed"),
        }

        RunReport {
            run_id,
            started_at,
            finished_at,
            state: self.state.clone(),
            stages: reports,
            error,
        }
    }
}
