use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::io::fastq::SampleReads;
use crate::io::report::{parse_report, report_path, TaxonRecord};
use crate::tools::{bowtie2, kraken2, log_path, trimmomatic, ToolCommand, ToolRunner};
use tracing::{debug, info};

/// One unit of work: a sample and, unless only a report exists, its reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleJob {
    pub sample_id: String,
    pub reads: Option<SampleReads>,
}

impl From<SampleReads> for SampleJob {
    fn from(reads: SampleReads) -> Self {
        Self {
            sample_id: reads.sample_id.clone(),
            reads: Some(reads),
        }
    }
}

fn run_stage(
    runner: &dyn ToolRunner,
    config: &PipelineConfig,
    sample_id: &str,
    stage: Stage,
    command: &ToolCommand,
) -> Result<()> {
    let log = log_path(&config.log_dir(), sample_id, command.tool);
    runner
        .run(command, &log)
        .map_err(|message| PipelineError::SampleProcessing {
            sample: sample_id.to_string(),
            stage,
            message,
        })
}

fn missing_setting(sample_id: &str, stage: Stage, what: &str) -> PipelineError {
    PipelineError::SampleProcessing {
        sample: sample_id.to_string(),
        stage,
        message: format!("{} not configured", what),
    }
}

/// Trim, deplete and classify one sample, then parse its report.
///
/// With precomputed reports the read stages are skipped and only the existing
/// report is parsed. Every child process runs to completion before the next
/// stage starts. Any error is specific to this sample; the caller records it
/// and moves on.
pub fn process_sample(job: &SampleJob, config: &PipelineConfig, runner: &dyn ToolRunner) -> Result<Vec<TaxonRecord>> {
    let sample_id = job.sample_id.as_str();
    let out = &config.output_dir;
    info!("Processing sample {}", sample_id);

    if config.use_precomputed_reports {
        let path = report_path(out, sample_id);
        debug!("Using precomputed report {}", path.display());
        return parse_report(&path, sample_id, config.rank);
    }

    let mut reads = job
        .reads
        .clone()
        .ok_or_else(|| missing_setting(sample_id, Stage::Classification, "read files"))?;

    if config.trim {
        let (cmd, trimmed) = trimmomatic::trim_command(&config.tools.trimmomatic, &reads, out, config.threads);
        run_stage(runner, config, sample_id, Stage::Trimming, &cmd)?;
        reads = trimmed;
    }

    if config.deplete_host {
        let index = config
            .bowtie2_index
            .as_deref()
            .ok_or_else(|| missing_setting(sample_id, Stage::Depletion, "Bowtie2 index"))?;
        let (cmd, depleted) = bowtie2::depletion_command(&config.tools.bowtie2, &reads, index, out, config.threads);
        run_stage(runner, config, sample_id, Stage::Depletion, &cmd)?;
        reads = depleted.into_sample(sample_id);
    }

    let db = config
        .kraken_db
        .as_deref()
        .ok_or_else(|| missing_setting(sample_id, Stage::Classification, "Kraken2 database"))?;
    let (cmd, outputs) = kraken2::classify_command(&config.tools.kraken2, &reads, db, out, config.threads);
    run_stage(runner, config, sample_id, Stage::Classification, &cmd)?;

    parse_report(&outputs.report, sample_id, config.rank)
}
