pub mod fetcher;
pub mod tools;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use fetcher::{HttpFetcher, ImageFetcher};
pub use tools::{make_thumbnail, MaxDimensions};

/// Everything that can go wrong while producing one thumbnail. None of these
/// abort a batch; the record is simply left without a thumbnail.
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Network error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Image request failed with status: {0}")]
    FetchStatus(reqwest::StatusCode),

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Thumbnail worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
