use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use crate::cache::ThumbnailCache;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::images::{HttpFetcher, ImageFetcher};
use crate::map::{collect_markers, render_map_page, write_map_page};
use crate::pipeline::{build_thumbnails, BatchSummary};
use crate::records::load_records;

#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: BatchSummary,
    pub markers: usize,
    pub output_path: PathBuf,
}

pub async fn run(config: &AppConfig) -> Result<RunReport, AppError> {
    let fetcher = HttpFetcher::new(config.timeout, &config.user_agent, config.proxy.as_deref())?;
    run_with_fetcher(config, Arc::new(fetcher)).await
}

/// Loads the records, fills the thumbnail cache and writes the map page.
/// Only setup problems are returned as errors; a map is written even if
/// every thumbnail fails.
pub async fn run_with_fetcher(config: &AppConfig, fetcher: Arc<dyn ImageFetcher>) -> Result<RunReport, AppError> {
    config.validate()?;

    let records = load_records(&config.input_path, &config.columns())?;

    let cache = ThumbnailCache::new(&config.cache_dir, config.max_dimensions(), fetcher)
        .with_quality(config.jpeg_quality);
    cache.prepare()?;

    let (records, summary) = build_thumbnails(records, &cache, &config.batch_options()).await;

    let markers = collect_markers(&records, &config.popup_options());
    let html = render_map_page(&markers, &config.map_view())?;
    write_map_page(&config.output_path, &html)?;

    info!(
        "Placed {} markers, {} with thumbnails",
        markers.len(),
        records
            .iter()
            .filter(|r| r.is_mappable() && r.thumbnail_path.is_some())
            .count()
    );

    Ok(RunReport {
        summary,
        markers: markers.len(),
        output_path: config.output_path.clone(),
    })
}
