use crate::abundance::ScoreMode;
use crate::visualize::plot::PlotFormat;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "run_kr_abundance",
    version,
    about = "Trimming, Bowtie2 host depletion and Kraken2 classification with top-N abundance plots",
    long_about = None
)]
#[command(group(ArgGroup::new("rank").required(true).args(["virus", "bacteria"])))]
pub struct Cli {
    /// Directory containing input FASTQ files (<sample>_R1/_R2.fastq[.gz])
    #[arg(long = "input_dir")]
    pub input_dir: PathBuf,

    /// Directory for reports, tables, plots and logs
    #[arg(long = "output_dir")]
    pub output_dir: PathBuf,

    /// Path to the Kraken2 database
    #[arg(long = "kraken_db")]
    pub kraken_db: Option<PathBuf>,

    /// Bowtie2 index prefix of the host genome
    #[arg(long = "bowtie2_index")]
    pub bowtie2_index: Option<PathBuf>,

    /// Metadata CSV; first column is the sample ID
    #[arg(long = "metadata_file")]
    pub metadata_file: Option<PathBuf>,

    /// Threads passed to each external tool
    #[arg(long, default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Number of samples processed concurrently
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// Report viral taxa
    #[arg(long)]
    pub virus: bool,

    /// Report bacterial taxa
    #[arg(long)]
    pub bacteria: bool,

    /// Minimum reads assigned directly to a taxon for a sample to count
    #[arg(long = "read_count", default_value_t = 0)]
    pub read_count: u64,

    /// Keep only the N most abundant taxa
    #[arg(long = "top_N", value_parser = clap::value_parser!(u64).range(1..))]
    pub top_n: Option<u64>,

    /// How per-sample counts are combined when ranking taxa
    #[arg(long, value_enum, default_value_t = ScoreMode::Sum)]
    pub score: ScoreMode,

    /// Skip Bowtie2 host depletion
    #[arg(long = "no_bowtie", alias = "no_bowtie2")]
    pub no_bowtie: bool,

    /// Quality-trim reads with Trimmomatic before depletion
    #[arg(long)]
    pub trim: bool,

    /// Reuse <output_dir>/<sample>_report.txt instead of running Kraken2
    #[arg(long = "use_precomputed_reports")]
    pub use_precomputed_reports: bool,

    /// Run without a metadata file
    #[arg(long = "no_metadata", conflicts_with_all = ["metadata_file", "require_metadata"])]
    pub no_metadata: bool,

    /// Abort if any sample has no metadata row (default: drop it with a warning)
    #[arg(long = "require_metadata")]
    pub require_metadata: bool,

    /// Metadata column used to group bars in the plot (default: one bar per sample)
    #[arg(long = "group_by")]
    pub group_by: Option<String>,

    /// Plot relative abundance instead of read counts
    #[arg(long)]
    pub relative: bool,

    /// Image format of the abundance plot
    #[arg(long = "plot_format", value_enum, default_value_t = PlotFormat::Png)]
    pub plot_format: PlotFormat,

    /// Bowtie2 executable
    #[arg(long = "bowtie2_bin", default_value = "bowtie2")]
    pub bowtie2_bin: PathBuf,

    /// Kraken2 executable
    #[arg(long = "kraken2_bin", default_value = "kraken2")]
    pub kraken2_bin: PathBuf,

    /// Trimmomatic executable
    #[arg(long = "trimmomatic_bin", default_value = "trimmomatic")]
    pub trimmomatic_bin: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "run_kr_abundance",
            "--input_dir", "reads",
            "--output_dir", "out",
            "--kraken_db", "db",
            "--metadata_file", "meta.csv",
            "--virus",
            "--read_count", "10",
            "--top_N", "5",
            "--no_bowtie2",
            "--threads", "4",
        ])
        .unwrap();

        assert!(cli.virus && !cli.bacteria);
        assert_eq!(cli.read_count, 10);
        assert_eq!(cli.top_n, Some(5));
        assert!(cli.no_bowtie);
        assert_eq!(cli.threads, 4);
        assert_eq!(cli.score, ScoreMode::Sum);
    }

    #[test]
    fn test_rank_selection_is_exclusive_and_required() {
        let base = ["run_kr_abundance", "--input_dir", "r", "--output_dir", "o"];

        let none = Cli::try_parse_from(base);
        assert!(none.is_err());

        let both = Cli::try_parse_from(base.iter().copied().chain(["--virus", "--bacteria"]));
        assert!(both.is_err());
    }

    #[test]
    fn test_top_n_must_be_positive() {
        let result = Cli::try_parse_from([
            "run_kr_abundance", "--input_dir", "r", "--output_dir", "o", "--virus", "--top_N", "0",
        ]);
        assert!(result.is_err());
    }
}
