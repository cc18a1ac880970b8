use std::process;

use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};

use memorymap::config::AppConfig;

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    info!("Configuration loaded successfully");

    info!(
        "Building memory map from {} (thumbnails in {}, max {}x{})",
        config.input_path.display(),
        config.cache_dir.display(),
        config.thumbnail_width,
        config.thumbnail_height
    );

    match memorymap::run(&config).await {
        Ok(report) => info!(
            "Done: {} markers, {}/{} thumbnails available, map at {}",
            report.markers,
            report.summary.with_thumbnail(),
            report.summary.total - report.summary.without_locator,
            report.output_path.display()
        ),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
