pub mod thumbnail;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use thumbnail::{cache_stem, ThumbnailCache, ThumbnailOutcome, THUMBNAIL_SUFFIX};

/// The cache directory itself is unusable, so no thumbnail can be stored.
#[derive(Error, Debug)]
#[error("Cache directory {path} is unusable: {source}")]
pub struct CacheDirError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}
