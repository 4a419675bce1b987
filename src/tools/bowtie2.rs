use super::ToolCommand;
use crate::io::fastq::SampleReads;
use std::path::{Path, PathBuf};

/// Host-depleted reads written by Bowtie2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepletedReads {
    pub forward: PathBuf,
    pub reverse: Option<PathBuf>,
}

impl DepletedReads {
    pub fn into_sample(self, sample_id: &str) -> SampleReads {
        SampleReads {
            sample_id: sample_id.to_string(),
            forward: self.forward,
            reverse: self.reverse,
        }
    }
}

/// Build the Bowtie2 command that keeps reads not aligning to the host index.
///
/// Alignments go to /dev/null; only the unaligned (gzipped) reads are kept,
/// as `<sample>_unmapped_1.fastq.gz` / `<sample>_unmapped_2.fastq.gz`.
pub fn depletion_command(
    program: &Path,
    reads: &SampleReads,
    index: &Path,
    output_dir: &Path,
    threads: usize,
) -> (ToolCommand, DepletedReads) {
    let sample = &reads.sample_id;
    let unmapped_1 = output_dir.join(format!("{}_unmapped_1.fastq.gz", sample));

    let cmd = ToolCommand::new("bowtie2", program)
        .arg("--threads")
        .arg(threads.to_string())
        .arg("-x")
        .arg(index.as_os_str());

    match &reads.reverse {
        Some(reverse) => {
            // bowtie2 substitutes the mate number for '%'
            let pattern = output_dir.join(format!("{}_unmapped_%.fastq.gz", sample));
            let unmapped_2 = output_dir.join(format!("{}_unmapped_2.fastq.gz", sample));
            let cmd = cmd
                .arg("-1")
                .arg(reads.forward.as_os_str())
                .arg("-2")
                .arg(reverse.as_os_str())
                .arg("--un-conc-gz")
                .arg(pattern.as_os_str())
                .args(["-S", "/dev/null"]);
            (
                cmd,
                DepletedReads {
                    forward: unmapped_1,
                    reverse: Some(unmapped_2),
                },
            )
        }
        None => {
            let cmd = cmd
                .arg("-U")
                .arg(reads.forward.as_os_str())
                .arg("--un-gz")
                .arg(unmapped_1.as_os_str())
                .args(["-S", "/dev/null"]);
            (
                cmd,
                DepletedReads {
                    forward: unmapped_1,
                    reverse: None,
                },
            )
        }
    }
}

/// True if `prefix` names a built Bowtie2 index (small or large)
pub fn index_exists(prefix: &Path) -> bool {
    ["1.bt2", "1.bt2l"].iter().any(|ext| {
        let mut name = prefix.as_os_str().to_os_string();
        name.push(".");
        name.push(ext);
        PathBuf::from(name).is_file()
    })
}
