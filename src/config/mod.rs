use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::images::MaxDimensions;
use crate::map::MapView;
use crate::pipeline::BatchOptions;
use crate::popup::PopupOptions;
use crate::records::ColumnMapping;

const DEFAULT_CONFIG_FILE: &str = "App.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub input_path: PathBuf,
    pub cache_dir: PathBuf,
    pub output_path: PathBuf,
    pub id_column: String,
    pub url_column: String,
    pub latitude_column: String,
    pub longitude_column: String,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub jpeg_quality: u8,
    pub timeout: u64,
    pub task_timeout: u64,
    pub max_concurrent: usize,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub map_title: String,
    pub map_center_lat: f64,
    pub map_center_lon: f64,
    pub map_zoom: u8,
    pub map_height: u32,
    pub popup_image_width: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("geotag_test_csv.csv"),
            cache_dir: PathBuf::from("thumbnails"),
            output_path: PathBuf::from("memory_map.html"),
            id_column: "image_name".to_string(),
            url_column: "word_presslink".to_string(),
            latitude_column: "lat".to_string(),
            longitude_column: "lomg".to_string(),
            thumbnail_width: 128,
            thumbnail_height: 128,
            jpeg_quality: 85,
            timeout: 15,
            task_timeout: 30,
            max_concurrent: 8,
            user_agent: concat!("memorymap/", env!("CARGO_PKG_VERSION")).to_string(),
            proxy: None,
            map_title: "Memory Map: Geotagged Images with Thumbnails".to_string(),
            map_center_lat: 12.9716,
            map_center_lon: 77.5946,
            map_zoom: 12,
            map_height: 700,
            popup_image_width: 100,
        }
    }
}

impl AppConfig {
    /// Loads `App.toml` (or the file named by `MEMORYMAP_CONFIG`) and
    /// `MEMORYMAP_*` environment overrides on top of the built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let file = env::var("MEMORYMAP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::from_file(Path::new(&file))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("MEMORYMAP")
                    .try_parsing(true)
                    .ignore_empty(true),
            )
            .build()?;

        let config = settings.try_deserialize::<AppConfig>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "thumbnail dimensions must be positive, got {}x{}",
                self.thumbnail_width, self.thumbnail_height
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.timeout == 0 || self.task_timeout == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".to_string()));
        }
        if self.max_concurrent == 0 {
            return Err(ConfigError::Invalid("max_concurrent must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn columns(&self) -> ColumnMapping {
        ColumnMapping {
            id: self.id_column.clone(),
            url: self.url_column.clone(),
            latitude: self.latitude_column.clone(),
            longitude: self.longitude_column.clone(),
        }
    }

    pub fn max_dimensions(&self) -> MaxDimensions {
        MaxDimensions::new(self.thumbnail_width, self.thumbnail_height)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            max_concurrent: self.max_concurrent,
            task_timeout: Duration::from_secs(self.task_timeout),
        }
    }

    pub fn popup_options(&self) -> PopupOptions {
        PopupOptions {
            image_width: self.popup_image_width,
        }
    }

    pub fn map_view(&self) -> MapView {
        MapView {
            title: self.map_title.clone(),
            center: (self.map_center_lat, self.map_center_lon),
            zoom: self.map_zoom,
            height: self.map_height,
        }
    }
}
