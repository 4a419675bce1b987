use super::ToolCommand;
use crate::io::fastq::{is_gzipped, SampleReads};
use crate::io::report::report_path;
use std::path::{Path, PathBuf};

/// Files Kraken2 writes for one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrakenOutputs {
    pub report: PathBuf,
    pub classifications: PathBuf,
}

/// Build the Kraken2 classification command for one sample.
///
/// The report lands at `<output_dir>/<sample>_report.txt`, the location that
/// `--use_precomputed_reports` reads back on later runs.
pub fn classify_command(
    program: &Path,
    reads: &SampleReads,
    database: &Path,
    output_dir: &Path,
    threads: usize,
) -> (ToolCommand, KrakenOutputs) {
    let outputs = KrakenOutputs {
        report: report_path(output_dir, &reads.sample_id),
        classifications: output_dir.join(format!("{}_kraken.txt", reads.sample_id)),
    };

    let mut cmd = ToolCommand::new("kraken2", program)
        .arg("--db")
        .arg(database.as_os_str())
        .arg("--threads")
        .arg(threads.to_string())
        .arg("--report")
        .arg(outputs.report.as_os_str())
        .arg("--output")
        .arg(outputs.classifications.as_os_str());

    if reads.is_paired() {
        cmd = cmd.arg("--paired");
    }
    if is_gzipped(&reads.forward) {
        cmd = cmd.arg("--gzip-compressed");
    }
    cmd = cmd.arg(reads.forward.as_os_str());
    if let Some(reverse) = &reads.reverse {
        cmd = cmd.arg(reverse.as_os_str());
    }

    (cmd, outputs)
}

/// True if `dir` looks like a built Kraken2 database
pub fn database_exists(dir: &Path) -> bool {
    dir.join("hash.k2d").is_file()
}
