use crate::error::Stage;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Why a sample is missing from the final table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// A tool or the report parser failed for this sample
    Failed,
    /// The sample has no metadata row
    NoMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSample {
    pub sample_id: String,
    pub kind: SkipKind,
    pub stage: Option<Stage>,
    pub reason: String,
}

/// End-of-run report of what happened to every sample
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub rank: String,
    pub succeeded: Vec<String>,
    pub skipped: Vec<SkippedSample>,
    /// Distinct taxa above the read-count threshold
    pub taxa_observed: usize,
    pub taxa_selected: usize,
    pub rows: usize,
    pub table: Option<PathBuf>,
    pub plot: Option<PathBuf>,
    pub plot_error: Option<String>,
}

impl RunSummary {
    pub fn new(rank: &str) -> Self {
        Self {
            rank: rank.to_string(),
            ..Default::default()
        }
    }

    pub fn record_failure(&mut self, sample_id: &str, stage: Option<Stage>, reason: String) {
        self.skipped.push(SkippedSample {
            sample_id: sample_id.to_string(),
            kind: SkipKind::Failed,
            stage,
            reason,
        });
    }

    pub fn record_no_metadata(&mut self, sample_id: &str) {
        self.skipped.push(SkippedSample {
            sample_id: sample_id.to_string(),
            kind: SkipKind::NoMetadata,
            stage: None,
            reason: "no metadata row".to_string(),
        });
    }

    pub fn failed(&self) -> impl Iterator<Item = &SkippedSample> {
        self.skipped.iter().filter(|s| s.kind == SkipKind::Failed)
    }

    pub fn is_skipped(&self, sample_id: &str) -> bool {
        self.skipped.iter().any(|s| s.sample_id == sample_id)
    }

    /// Log the succeeded / failed / skipped breakdown
    pub fn log(&self) {
        info!(
            "Run finished: {} succeeded, {} failed, {} skipped",
            self.succeeded.len(),
            self.failed().count(),
            self.skipped.len() - self.failed().count()
        );
        if !self.succeeded.is_empty() {
            info!("Succeeded: {}", self.succeeded.join(", "));
        }
        for s in &self.skipped {
            match (s.kind, s.stage) {
                (SkipKind::Failed, Some(stage)) => warn!("Failed: {} ({}): {}", s.sample_id, stage, s.reason),
                (SkipKind::Failed, None) => warn!("Failed: {}: {}", s.sample_id, s.reason),
                (SkipKind::NoMetadata, _) => warn!("Skipped: {}: {}", s.sample_id, s.reason),
            }
        }
        info!(
            "Selected {} of {} taxa ({} table rows)",
            self.taxa_selected, self.taxa_observed, self.rows
        );
    }
}
