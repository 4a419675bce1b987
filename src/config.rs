use crate::abundance::ScoreMode;
use crate::cli_main::Cli;
use crate::error::{PipelineError, Result};
use crate::io::metadata::JoinPolicy;
use crate::io::report::RankFilter;
use crate::tools::{bowtie2, kraken2};
use crate::visualize::plot::PlotFormat;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Resolved executables of the external tools a run needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub bowtie2: PathBuf,
    pub kraken2: PathBuf,
    pub trimmomatic: PathBuf,
}

/// Validated settings for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub kraken_db: Option<PathBuf>,
    pub bowtie2_index: Option<PathBuf>,
    pub metadata_file: Option<PathBuf>,
    pub threads: usize,
    pub jobs: usize,
    pub rank: RankFilter,
    pub min_reads: u64,
    pub top_n: Option<usize>,
    pub score: ScoreMode,
    pub trim: bool,
    pub deplete_host: bool,
    pub use_precomputed_reports: bool,
    pub join_policy: JoinPolicy,
    pub group_by: Option<String>,
    pub relative: bool,
    pub plot_format: PlotFormat,
    pub tools: ToolPaths,
}

fn require_dir(path: &Path, what: &str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(PipelineError::Configuration(format!(
            "{} {} does not exist or is not a directory",
            what,
            path.display()
        )))
    }
}

/// Locate an executable on $PATH (or check an explicit path)
fn resolve_tool(program: &Path, flag: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| {
        PipelineError::Configuration(format!(
            "required program '{}' not found (set {} or add it to $PATH)",
            program.display(),
            flag
        ))
    })
}

impl PipelineConfig {
    /// Validate the command line. Nothing here launches a subprocess.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        require_dir(&cli.input_dir, "input directory")?;

        if cli.threads == 0 {
            return Err(PipelineError::Configuration("--threads must be at least 1".into()));
        }
        if cli.jobs == 0 {
            return Err(PipelineError::Configuration("--jobs must be at least 1".into()));
        }

        let rank = match (cli.virus, cli.bacteria) {
            (true, false) => RankFilter::Virus,
            (false, true) => RankFilter::Bacteria,
            _ => {
                return Err(PipelineError::Configuration(
                    "select exactly one of --virus or --bacteria".into(),
                ))
            }
        };

        let join_policy = if cli.no_metadata {
            JoinPolicy::Disabled
        } else {
            match &cli.metadata_file {
                None => {
                    return Err(PipelineError::Configuration(
                        "--metadata_file is required unless --no_metadata is given".into(),
                    ))
                }
                Some(path) if !path.is_file() => {
                    return Err(PipelineError::Configuration(format!(
                        "metadata file {} does not exist",
                        path.display()
                    )))
                }
                Some(_) if cli.require_metadata => JoinPolicy::Required,
                Some(_) => JoinPolicy::Lenient,
            }
        };

        if join_policy == JoinPolicy::Disabled {
            if let Some(column) = &cli.group_by {
                return Err(PipelineError::Configuration(format!(
                    "--group_by {} needs a metadata file",
                    column
                )));
            }
        }

        // Precomputed reports replace every read stage.
        if cli.use_precomputed_reports && (cli.trim || !cli.no_bowtie) {
            info!("Using precomputed reports; trimming and host depletion are skipped");
        }
        let trim = cli.trim && !cli.use_precomputed_reports;
        let deplete_host = !cli.no_bowtie && !cli.use_precomputed_reports;
        let bowtie2_index = if deplete_host {
            let index = cli.bowtie2_index.clone().ok_or_else(|| {
                PipelineError::Configuration(
                    "--bowtie2_index is required for host depletion (or pass --no_bowtie)".into(),
                )
            })?;
            if !bowtie2::index_exists(&index) {
                return Err(PipelineError::Configuration(format!(
                    "no Bowtie2 index found at prefix {}",
                    index.display()
                )));
            }
            Some(index)
        } else {
            if cli.bowtie2_index.is_some() && cli.no_bowtie {
                warn!("--bowtie2_index ignored because --no_bowtie is set");
            }
            None
        };

        let kraken_db = if cli.use_precomputed_reports {
            cli.kraken_db.clone()
        } else {
            let db = cli.kraken_db.clone().ok_or_else(|| {
                PipelineError::Configuration(
                    "--kraken_db is required unless --use_precomputed_reports is given".into(),
                )
            })?;
            require_dir(&db, "Kraken2 database")?;
            if !kraken2::database_exists(&db) {
                return Err(PipelineError::Configuration(format!(
                    "{} is not a Kraken2 database (hash.k2d missing)",
                    db.display()
                )));
            }
            Some(db)
        };

        let tools = ToolPaths {
            bowtie2: if deplete_host {
                resolve_tool(&cli.bowtie2_bin, "--bowtie2_bin")?
            } else {
                cli.bowtie2_bin.clone()
            },
            kraken2: if cli.use_precomputed_reports {
                cli.kraken2_bin.clone()
            } else {
                resolve_tool(&cli.kraken2_bin, "--kraken2_bin")?
            },
            trimmomatic: if trim {
                resolve_tool(&cli.trimmomatic_bin, "--trimmomatic_bin")?
            } else {
                cli.trimmomatic_bin.clone()
            },
        };

        let top_n = match cli.top_n {
            Some(n) => Some(usize::try_from(n).map_err(|_| {
                PipelineError::Configuration(format!("--top_N {} is too large", n))
            })?),
            None => None,
        };

        Ok(Self {
            input_dir: cli.input_dir,
            output_dir: cli.output_dir,
            kraken_db,
            bowtie2_index,
            metadata_file: if cli.no_metadata { None } else { cli.metadata_file },
            threads: cli.threads,
            jobs: cli.jobs,
            rank,
            min_reads: cli.read_count,
            top_n,
            score: cli.score,
            trim,
            deplete_host,
            use_precomputed_reports: cli.use_precomputed_reports,
            join_policy,
            group_by: cli.group_by,
            relative: cli.relative,
            plot_format: cli.plot_format,
            tools,
        })
    }

    /// Per-sample tool logs
    pub fn log_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }

    /// Create the output and log directories
    pub fn prepare_output(&self) -> Result<()> {
        let log_dir = self.log_dir();
        std::fs::create_dir_all(&log_dir).map_err(|e| {
            PipelineError::Configuration(format!(
                "cannot create output directory {}: {}",
                log_dir.display(),
                e
            ))
        })?;
        info!("Writing results to {}", self.output_dir.display());
        Ok(())
    }

    /// Output file `<output_dir>/<rank>_<suffix>`
    pub fn output_file(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{}", self.rank.label(), suffix))
    }

    pub fn plot_path(&self) -> PathBuf {
        self.output_file(&format!("abundance.{}", self.plot_format.extension()))
    }
}
