use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use coco_recategorize::{run, Args, Taxonomy};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.to_pipeline_config();

    info!("Starting category update...");

    match run(&config, &Taxonomy::default()) {
        Ok(summary) => {
            info!(
                "Removed {} redundant annotations, merged {} images",
                summary.transform.cleanup.annotations_removed(),
                summary.transform.merge.images_merged
            );
            for (name, count) in &summary.transform.merge.images_per_category {
                info!("  {}: {} images", name, count);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            for violation in e.violations() {
                error!("{}", violation);
            }
            error!("Failed to update categories: {}", e);
            ExitCode::FAILURE
        }
    }
}
