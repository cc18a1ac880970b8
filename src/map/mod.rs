use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::models::ImageRecord;
use crate::popup::{escape_html, render_popup, PopupOptions};

const LEAFLET_VERSION: &str = "1.9.4";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to serialize markers: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write map page {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    pub tooltip: String,
    pub popup: String,
}

#[derive(Debug, Clone)]
pub struct MapView {
    pub title: String,
    pub center: (f64, f64),
    pub zoom: u8,
    pub height: u32,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            title: "Memory Map".to_string(),
            center: (12.9716, 77.5946),
            zoom: 12,
            height: 700,
        }
    }
}

/// One marker per record that has both coordinates; the rest are skipped.
pub fn collect_markers(records: &[ImageRecord], options: &PopupOptions) -> Vec<Marker> {
    let markers: Vec<Marker> = records
        .iter()
        .filter_map(|record| {
            let (latitude, longitude) = record.coordinates()?;
            Some(Marker {
                latitude,
                longitude,
                tooltip: record.id.clone(),
                popup: render_popup(record, options),
            })
        })
        .collect();

    let skipped = records.len() - markers.len();
    if skipped > 0 {
        log::info!("{} records without coordinates left off the map", skipped);
    }
    markers
}

pub fn render_map_page(markers: &[Marker], view: &MapView) -> Result<String, OutputError> {
    // "</" inside the inline script would end it early
    let markers_json = serde_json::to_string(markers)?.replace("</", "<\\/");
    let title = escape_html(&view.title);
    let center = serde_json::to_string(&[view.center.0, view.center.1])?;

    Ok(format!(
        r##"<!DOCTYPE html>
<!-- generated {generated} -->
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@{leaflet}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{leaflet}/dist/leaflet.js"></script>
<style>
  body {{ margin: 0; font-family: sans-serif; }}
  h1 {{ margin: 12px 16px; font-size: 1.4em; }}
  #map {{ height: {height}px; }}
</style>
</head>
<body>
<h1>{title}</h1>
<div id="map"></div>
<script>
  const map = L.map("map").setView({center}, {zoom});
  L.tileLayer("https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png", {{
    maxZoom: 19,
    attribution: "&copy; OpenStreetMap contributors"
  }}).addTo(map);
  const markers = {markers};
  for (const m of markers) {{
    const tooltip = document.createElement("span");
    tooltip.textContent = m.tooltip;
    L.marker([m.lat, m.lon]).addTo(map).bindPopup(m.popup).bindTooltip(tooltip);
  }}
</script>
</body>
</html>
"##,
        generated = Utc::now().to_rfc3339(),
        title = title,
        leaflet = LEAFLET_VERSION,
        height = view.height,
        center = center,
        zoom = view.zoom,
        markers = markers_json,
    ))
}

pub fn write_map_page(path: &Path, html: &str) -> Result<(), OutputError> {
    let write_error = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    fs::write(path, html).map_err(write_error)?;

    log::info!("Map written to {}", path.display());
    Ok(())
}
