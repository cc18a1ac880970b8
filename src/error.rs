use thiserror::Error;

use crate::cache::CacheDirError;
use crate::config::ConfigError;
use crate::map::OutputError;
use crate::records::RecordsError;

/// Setup-level failures. Anything that goes wrong for a single record is
/// logged and absorbed by the batch instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to load records: {0}")]
    Records(#[from] RecordsError),

    #[error(transparent)]
    CacheDir(#[from] CacheDirError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Output(#[from] OutputError),
}
