// src/io/fastq.rs
use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Forward-read suffixes recognised in the input directory
const FORWARD_SUFFIXES: [&str; 4] = ["_R1.fastq.gz", "_R1.fastq", "_R1.fq.gz", "_R1.fq"];

/// Read files of one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleReads {
    pub sample_id: String,
    pub forward: PathBuf,
    /// Mate file for paired-end samples
    pub reverse: Option<PathBuf>,
}

impl SampleReads {
    pub fn is_paired(&self) -> bool {
        self.reverse.is_some()
    }
}

/// Split a forward-read file name into (sample ID, matching reverse name)
fn split_forward_name(name: &str) -> Option<(String, String)> {
    FORWARD_SUFFIXES.iter().find_map(|suffix| {
        let sample = name.strip_suffix(suffix)?;
        if sample.is_empty() {
            return None;
        }
        let reverse = format!("{}{}", sample, suffix.replacen("_R1", "_R2", 1));
        Some((sample.to_string(), reverse))
    })
}

/// Find all samples under `input_dir`, sorted by sample ID.
///
/// A sample is a `<id>_R1.fastq[.gz]` (or `.fq`) file; the `<id>_R2` file with
/// the same extension, if present, makes it paired-end.
pub fn discover_samples(input_dir: &Path) -> Result<Vec<SampleReads>> {
    let entries = std::fs::read_dir(input_dir).map_err(|e| PipelineError::io(input_dir, e))?;

    let mut samples = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::io(input_dir, e))?.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        let (sample_id, reverse_name) = match split_forward_name(name) {
            Some(parts) => parts,
            None => continue,
        };

        let reverse = input_dir.join(reverse_name);
        let reverse = if reverse.is_file() { Some(reverse) } else { None };
        debug!(
            "Found sample {} ({})",
            sample_id,
            if reverse.is_some() { "paired" } else { "single" }
        );
        samples.push(SampleReads {
            sample_id,
            forward: path,
            reverse,
        });
    }

    samples.sort_by(|a, b| a.sample_id.cmp(&b.sample_id).then_with(|| a.forward.cmp(&b.forward)));
    samples.dedup_by(|b, a| a.sample_id == b.sample_id);

    info!("Discovered {} samples in {}", samples.len(), input_dir.display());
    Ok(samples)
}

/// True if a read file is gzip-compressed, judged by its extension
pub fn is_gzipped(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}
