use std::path::PathBuf;

/// One row of input describing a geotagged image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    pub source_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Set only by the thumbnail batch; `None` until then, and stays `None`
    /// when the record has no locator or its thumbnail could not be built.
    pub thumbnail_path: Option<PathBuf>,
}

impl ImageRecord {
    pub fn new(
        id: impl Into<String>,
        source_url: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.filter(|url| !url.trim().is_empty()),
            latitude: latitude.filter(|v| v.is_finite()),
            longitude: longitude.filter(|v| v.is_finite()),
            thumbnail_path: None,
        }
    }

    /// Both coordinates, or `None` when the record can't be placed on a map.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    pub fn is_mappable(&self) -> bool {
        self.coordinates().is_some()
    }

    pub fn with_thumbnail(self, thumbnail_path: Option<PathBuf>) -> Self {
        Self {
            thumbnail_path,
            ..self
        }
    }
}
