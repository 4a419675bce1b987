use super::ToolCommand;
use crate::io::fastq::SampleReads;
use std::path::Path;

/// Trimming steps applied to every sample
const TRIM_STEPS: [&str; 4] = ["LEADING:3", "TRAILING:3", "SLIDINGWINDOW:4:15", "MINLEN:36"];

/// Build the Trimmomatic command (PE or SE) and the trimmed reads it produces.
///
/// Unpaired survivors of PE mode are written next to the trimmed pairs but
/// not carried forward.
pub fn trim_command(program: &Path, reads: &SampleReads, output_dir: &Path, threads: usize) -> (ToolCommand, SampleReads) {
    let sample = &reads.sample_id;
    let trimmed_1 = output_dir.join(format!("{}_trimmed_R1.fastq.gz", sample));

    match &reads.reverse {
        Some(reverse) => {
            let trimmed_2 = output_dir.join(format!("{}_trimmed_R2.fastq.gz", sample));
            let unpaired_1 = output_dir.join(format!("{}_unpaired_R1.fastq.gz", sample));
            let unpaired_2 = output_dir.join(format!("{}_unpaired_R2.fastq.gz", sample));
            let cmd = ToolCommand::new("trimmomatic", program)
                .args(["PE", "-threads"])
                .arg(threads.to_string())
                .arg(reads.forward.as_os_str())
                .arg(reverse.as_os_str())
                .arg(trimmed_1.as_os_str())
                .arg(unpaired_1.as_os_str())
                .arg(trimmed_2.as_os_str())
                .arg(unpaired_2.as_os_str())
                .args(TRIM_STEPS);
            let trimmed = SampleReads {
                sample_id: sample.clone(),
                forward: trimmed_1,
                reverse: Some(trimmed_2),
            };
            (cmd, trimmed)
        }
        None => {
            let cmd = ToolCommand::new("trimmomatic", program)
                .args(["SE", "-threads"])
                .arg(threads.to_string())
                .arg(reads.forward.as_os_str())
                .arg(trimmed_1.as_os_str())
                .args(TRIM_STEPS);
            let trimmed = SampleReads {
                sample_id: sample.clone(),
                forward: trimmed_1,
                reverse: None,
            };
            (cmd, trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paired_end_trim() {
        let reads = SampleReads {
            sample_id: "s1".into(),
            forward: "/in/s1_R1.fastq.gz".into(),
            reverse: Some("/in/s1_R2.fastq.gz".into()),
        };
        let (cmd, trimmed) = trim_command(Path::new("trimmomatic"), &reads, Path::new("/out"), 4);
        let args: Vec<String> = cmd.args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(&args[..3], &["PE", "-threads", "4"]);
        assert_eq!(args[5], "/out/s1_trimmed_R1.fastq.gz");
        assert_eq!(args[6], "/out/s1_unpaired_R1.fastq.gz");
        assert_eq!(&args[args.len() - 4..], &TRIM_STEPS);
        assert!(trimmed.is_paired());
        assert_eq!(trimmed.forward, Path::new("/out/s1_trimmed_R1.fastq.gz"));
    }

    #[test]
    fn test_single_end_trim() {
        let reads = SampleReads {
            sample_id: "s2".into(),
            forward: "/in/s2_R1.fastq".into(),
            reverse: None,
        };
        let (cmd, trimmed) = trim_command(Path::new("trimmomatic"), &reads, Path::new("/out"), 1);
        assert_eq!(cmd.args[0], "SE");
        assert_eq!(cmd.args.len(), 5 + TRIM_STEPS.len());
        assert!(!trimmed.is_paired());
    }
}
