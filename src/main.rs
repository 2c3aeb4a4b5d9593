use clap::Parser;
use log::{error, info};

use yolo_merge::{merge, filter, Cli, Command};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Merge(args) => {
            info!("Starting dataset merge...");
            args.into_config().and_then(|config| merge::run(&config))
        }
        Command::Filter(args) => {
            info!("Starting dataset filtering...");
            args.into_config().and_then(|config| filter::run(&config))
        }
    };

    match result {
        Ok(report) => {
            report.stats.print_summary();
            if !report.warnings.is_empty() {
                info!("Run finished with {} warnings.", report.warnings.len());
            }
            if let Some(manifest) = &report.manifest_path {
                info!("Done. Manifest: {}", manifest.display());
            }
        }
        Err(e) => {
            error!("Run failed: {}", e);
            std::process::exit(1);
        }
    }
}
