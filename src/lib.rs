pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod images;
pub mod map;
pub mod models;
pub mod pipeline;
pub mod popup;
pub mod records;

pub use app::{run, run_with_fetcher, RunReport};
pub use error::AppError;
