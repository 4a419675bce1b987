use clap::Parser;
use kraken_abundance::cli_main::Cli;
use kraken_abundance::config::PipelineConfig;
use kraken_abundance::pipeline;
use kraken_abundance::tools::ChildRegistry;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Setting tracing default failed");

    // SIGINT, SIGTERM and SIGHUP: stop running tools before exiting.
    let registry = ChildRegistry::global();
    if let Err(e) = ctrlc::set_handler(move || {
        let stopped = registry.terminate_all();
        error!("Interrupted; stopped {} running tool process(es)", stopped);
        std::process::exit(130);
    }) {
        warn!("Could not install interrupt handler: {}", e);
    }

    let config = match PipelineConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Running {} abundance pipeline on {}",
        config.rank.label(),
        config.input_dir.display()
    );

    // Partial sample failures are listed in the summary and do not change
    // the exit status.
    match pipeline::run(&config) {
        Ok(summary) => {
            if summary.succeeded.is_empty() {
                error!("No sample completed successfully");
            }
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
