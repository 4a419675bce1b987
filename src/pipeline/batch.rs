use crate::abundance::{apply_threshold, select_top_n};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::io::export::{write_abundance_csv, write_json, write_taxon_totals};
use crate::io::fastq::discover_samples;
use crate::io::metadata::{join_records, table_for, write_sample_ids, JoinPolicy, MetadataTable};
use crate::io::report::{discover_reports, TaxonRecord};
use crate::pipeline::sample::{process_sample, SampleJob};
use crate::pipeline::summary::RunSummary;
use crate::tools::{ProcessRunner, ToolRunner};
use crate::visualize::plot::{render_abundance_plot, PlotOptions};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::time::Instant;
use tracing::{info, warn};

/// Samples to process: read groups from the input directory, or in
/// precomputed mode with no reads, the reports already in the output directory.
pub fn collect_jobs(config: &PipelineConfig) -> Result<Vec<SampleJob>> {
    let samples = discover_samples(&config.input_dir)?;
    if !samples.is_empty() || !config.use_precomputed_reports {
        return Ok(samples.into_iter().map(SampleJob::from).collect());
    }

    info!(
        "No read files in {}; using reports found in {}",
        config.input_dir.display(),
        config.output_dir.display()
    );
    let reports = discover_reports(&config.output_dir)?;
    Ok(reports
        .into_iter()
        .map(|(sample_id, _)| SampleJob { sample_id, reads: None })
        .collect())
}

fn load_metadata(config: &PipelineConfig) -> Result<Option<MetadataTable>> {
    if config.join_policy == JoinPolicy::Disabled {
        info!("Metadata disabled; rows carry sample IDs only");
        return Ok(None);
    }
    let path = config.metadata_file.as_deref().ok_or_else(|| {
        PipelineError::Configuration("metadata join requested without --metadata_file".into())
    })?;
    let metadata = MetadataTable::from_csv(path)?;

    if let Some(column) = &config.group_by {
        if !metadata.columns().iter().any(|c| c == column) {
            return Err(PipelineError::Configuration(format!(
                "--group_by column '{}' not found in {} (columns: {})",
                column,
                path.display(),
                metadata.columns().join(", ")
            )));
        }
    }
    Ok(Some(metadata))
}

/// Run every job, `config.jobs` samples at a time. Returns once all jobs are done.
fn process_all(
    jobs: &[SampleJob],
    config: &PipelineConfig,
    runner: &dyn ToolRunner,
) -> Result<Vec<Result<Vec<TaxonRecord>>>> {
    if config.jobs <= 1 {
        return Ok(jobs.iter().map(|job| process_sample(job, config, runner)).collect());
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build()
        .map_err(|e| PipelineError::Configuration(format!("cannot start {} workers: {}", config.jobs, e)))?;

    Ok(pool.install(|| {
        jobs.par_iter()
            .map(|job| process_sample(job, config, runner))
            .collect()
    }))
}

fn plot_title(config: &PipelineConfig) -> String {
    match config.top_n {
        Some(n) => format!("Top {} {} taxa", n, config.rank.label()),
        None => format!("{} abundance", config.rank.label()),
    }
}

/// Run the pipeline with real child processes.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    run_with(config, &ProcessRunner::default())
}

/// Run the whole pipeline with the given tool runner.
///
/// Configuration problems (metadata, group-by column, no samples, samples
/// lacking required metadata) are reported before any tool is started. After
/// that only output failures are fatal; sample failures end up in the summary.
pub fn run_with(config: &PipelineConfig, runner: &dyn ToolRunner) -> Result<RunSummary> {
    let start = Instant::now();
    config.prepare_output()?;

    let metadata = load_metadata(config)?;
    let jobs = collect_jobs(config)?;
    if jobs.is_empty() {
        return Err(PipelineError::Configuration(format!(
            "no samples found in {}",
            config.input_dir.display()
        )));
    }

    let missing = match metadata.as_ref() {
        Some(meta) if config.join_policy != JoinPolicy::Disabled => {
            meta.missing_samples(jobs.iter().map(|j| j.sample_id.as_str()))
        }
        _ => Vec::new(),
    };
    if config.join_policy == JoinPolicy::Required {
        if let Some(sample) = missing.first() {
            return Err(PipelineError::MissingMetadata { sample: sample.clone() });
        }
    }

    write_sample_ids(
        jobs.iter().map(|j| j.sample_id.as_str()),
        &config.output_dir.join("sample_ids.csv"),
    )?;

    // Samples without metadata would be dropped at the join; skip their tools.
    let mut summary = RunSummary::new(config.rank.label());
    let (jobs, unmatched): (Vec<SampleJob>, Vec<SampleJob>) =
        jobs.into_iter().partition(|j| !missing.contains(&j.sample_id));
    for job in &unmatched {
        warn!("No metadata for sample {}; skipping it", job.sample_id);
        summary.record_no_metadata(&job.sample_id);
    }

    let results = process_all(&jobs, config, runner)?;

    // All samples are done; build the table in sample order.
    let mut table = table_for(metadata.as_ref(), config.join_policy);
    for (job, result) in jobs.iter().zip(results) {
        let records = match result {
            Ok(records) => records,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Skipping sample {}: {}", job.sample_id, e);
                summary.record_failure(&job.sample_id, e.stage(), e.to_string());
                continue;
            }
        };

        join_records(records, metadata.as_ref(), config.join_policy, &mut table)?;
        summary.succeeded.push(job.sample_id.clone());
    }

    let table = apply_threshold(table, config.min_reads);
    let selection = select_top_n(table, config.top_n, config.score);
    summary.taxa_observed = selection.total_taxa;
    summary.taxa_selected = selection.ranking.len();
    summary.rows = selection.table.len();

    let table_path = config.output_file("abundance.csv");
    write_abundance_csv(&selection.table, &table_path)?;
    write_taxon_totals(&selection.ranking, &config.output_file("taxon_totals.csv"))?;
    info!("Abundance table written to {}", table_path.display());
    summary.table = Some(table_path);

    let opts = PlotOptions {
        title: plot_title(config),
        relative: config.relative,
        ..PlotOptions::default()
    };
    let plot_path = config.plot_path();
    match render_abundance_plot(&selection, config.group_by.as_deref(), &opts, &plot_path) {
        Ok(_) => summary.plot = Some(plot_path),
        Err(e) => {
            warn!("Could not render plot {}: {}", plot_path.display(), e);
            summary.plot_error = Some(e.to_string());
        }
    }

    write_json(&summary, &config.output_dir.join("run_summary.json"))?;
    summary.log();
    info!("Pipeline completed in {:.2}s", start.elapsed().as_secs_f32());
    Ok(summary)
}
