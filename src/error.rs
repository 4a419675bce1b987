use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stage of per-sample processing an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Trimming,
    Depletion,
    Classification,
    Parsing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Trimming => "trimming",
            Stage::Depletion => "host depletion",
            Stage::Classification => "classification",
            Stage::Parsing => "report parsing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or missing CLI argument or path, detected before any tool runs
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("sample {sample}: {stage} failed: {message}")]
    SampleProcessing {
        sample: String,
        stage: Stage,
        message: String,
    },

    #[error("{}: {message}", location(.path, .line))]
    Parse {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    #[error("no metadata row for sample '{sample}'")]
    MissingMetadata { sample: String },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("plot rendering failed: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

fn location(path: &Path, line: &Option<usize>) -> String {
    match line {
        Some(line) => format!("{}:{}", path.display(), line),
        None => path.display().to_string(),
    }
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io { path: path.into(), source }
    }

    pub fn parse(path: impl Into<PathBuf>, line: Option<usize>, message: impl Into<String>) -> Self {
        PipelineError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Per-sample stage an error belongs to, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::SampleProcessing { stage, .. } => Some(*stage),
            PipelineError::Parse { .. } => Some(Stage::Parsing),
            _ => None,
        }
    }

    /// Fatal errors abort the run; everything else is recovered per sample.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_) | PipelineError::MissingMetadata { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_includes_line() {
        let err = PipelineError::parse("/tmp/s1_report.txt", Some(3), "expected 6 columns, found 4");
        assert_eq!(err.to_string(), "/tmp/s1_report.txt:3: expected 6 columns, found 4");

        let err = PipelineError::parse("/tmp/s1_report.txt", None, "report is empty");
        assert_eq!(err.to_string(), "/tmp/s1_report.txt: report is empty");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(PipelineError::Configuration("missing --kraken_db".into()).is_fatal());
        assert!(PipelineError::MissingMetadata { sample: "s1".into() }.is_fatal());

        let sample_err = PipelineError::SampleProcessing {
            sample: "s1".into(),
            stage: Stage::Depletion,
            message: "bowtie2 exited with status 1".into(),
        };
        assert!(!sample_err.is_fatal());
        assert_eq!(sample_err.stage(), Some(Stage::Depletion));
        assert_eq!(
            sample_err.to_string(),
            "sample s1: host depletion failed: bowtie2 exited with status 1"
        );
    }
}
