use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::raster::{DEFAULT_RASTER_PATTERN, DirRasterStore};
use crate::region::{BoundaryProvider, FileBoundaryProvider};
use crate::stats::RegionStatsAggregator;

/// Runtime settings. Every field has a default, so a settings file may set any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the per-year population GeoTIFFs.
    pub raster_dir: PathBuf,
    /// Raster file name with a `{year}` placeholder.
    pub raster_pattern: String,
    /// Boundary service URL with `{adcode}` and `{suffix}` placeholders.
    pub boundary_url: String,
    /// Read boundaries from `{adcode}.json` / `{adcode}_full.json` files here instead of over HTTP.
    pub boundary_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// City batch workers; 0 uses one per core.
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            raster_dir: PathBuf::from("data/city"),
            raster_pattern: DEFAULT_RASTER_PATTERN.to_string(),
            boundary_url: "https://geo.datav.aliyun.com/areas_v3/bound/{adcode}{suffix}.json".to_string(),
            boundary_dir: None,
            request_timeout_secs: 30,
            workers: 0,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read settings file: {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("[config] Failed to parse settings from {:?}", path))
    }

    #[inline] pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

    pub fn raster_store(&self) -> DirRasterStore {
        DirRasterStore::new(&self.raster_dir).with_pattern(&self.raster_pattern)
    }

    /// Local directory provider when `boundary_dir` is set, otherwise the HTTP provider.
    pub fn boundary_provider(&self) -> Result<Arc<dyn BoundaryProvider>> {
        if let Some(dir) = &self.boundary_dir {
            return Ok(Arc::new(FileBoundaryProvider::new(dir)));
        }
        self.http_boundary_provider()
    }

    #[cfg(feature = "download")]
    fn http_boundary_provider(&self) -> Result<Arc<dyn BoundaryProvider>> {
        let provider = crate::region::DataVBoundaryProvider::new(self.request_timeout())
            .context("[config] Failed to build HTTP client")?
            .with_url_template(&self.boundary_url);
        Ok(Arc::new(provider))
    }

    #[cfg(not(feature = "download"))]
    fn http_boundary_provider(&self) -> Result<Arc<dyn BoundaryProvider>> {
        anyhow::bail!("[config] Built without the `download` feature; set `boundary_dir` to read boundaries from disk")
    }

    /// Aggregator wired to the configured stores.
    pub fn aggregator(&self) -> Result<RegionStatsAggregator> {
        Ok(RegionStatsAggregator::new(Arc::new(self.raster_store()), self.boundary_provider()?)
            .with_workers(self.workers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "raster_dir": "/srv/worldpop", "workers": 4 }"#).unwrap();

        let settings = Settings::from_json_file(&path).unwrap();
        assert_eq!(settings.raster_dir, PathBuf::from("/srv/worldpop"));
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.raster_pattern, DEFAULT_RASTER_PATTERN);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.raster_store().path_for(2020), PathBuf::from("/srv/worldpop/chn_pop_2020_CN_100m_R2025A_v1.tif"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ workers: }").unwrap();
        assert!(Settings::from_json_file(&path).is_err());
    }

    #[test]
    fn boundary_dir_selects_file_provider() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings { boundary_dir: Some(dir.path().to_path_buf()), ..Settings::default() };
        let provider = settings.boundary_provider().unwrap();
        assert!(provider.fetch(crate::region::RegionId(110105), false).is_err());
    }
}
