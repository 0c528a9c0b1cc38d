use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::{GeoTiffRaster, RasterGrid, RasterSource};

/// File name pattern of the WorldPop China 100m constrained rasters.
pub const DEFAULT_RASTER_PATTERN: &str = "chn_pop_{year}_CN_100m_R2025A_v1.tif";

/// Source of per-year population rasters.
pub trait RasterStore: Send + Sync {
    /// Open the raster for `year`, or fail with [`Error::RasterNotFound`].
    fn open(&self, year: u16) -> Result<Arc<dyn RasterSource>>;
}

/// Rasters stored as GeoTIFF files in one directory, named by a `{year}` pattern.
/// Files are opened lazily; cells are decoded per clipping window.
#[derive(Debug, Clone)]
pub struct DirRasterStore {
    dir: PathBuf,
    pattern: String,
}

impl DirRasterStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), pattern: DEFAULT_RASTER_PATTERN.to_string() }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    #[inline] pub fn dir(&self) -> &Path { &self.dir }

    /// Path the raster for `year` is expected at.
    pub fn path_for(&self, year: u16) -> PathBuf {
        self.dir.join(self.pattern.replace("{year}", &year.to_string()))
    }
}

impl RasterStore for DirRasterStore {
    fn open(&self, year: u16) -> Result<Arc<dyn RasterSource>> {
        let path = self.path_for(year);
        if !path.is_file() {
            return Err(Error::RasterNotFound { year, path });
        }

        let raster = GeoTiffRaster::open(&path)?;
        debug!(target: "raster::store", "year {year}: {}", path.display());
        Ok(Arc::new(raster))
    }
}

/// Rasters held in memory, keyed by year.
#[derive(Debug, Clone, Default)]
pub struct MemoryRasterStore {
    grids: AHashMap<u16, Arc<RasterGrid>>,
}

impl MemoryRasterStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_year(mut self, year: u16, grid: RasterGrid) -> Self {
        self.insert(year, grid);
        self
    }

    pub fn insert(&mut self, year: u16, grid: RasterGrid) {
        self.grids.insert(year, Arc::new(grid));
    }
}

impl RasterStore for MemoryRasterStore {
    fn open(&self, year: u16) -> Result<Arc<dyn RasterSource>> {
        self.grids.get(&year)
            .map(|grid| Arc::clone(grid) as Arc<dyn RasterSource>)
            .ok_or_else(|| Error::RasterNotFound { year, path: PathBuf::from(format!("<memory:{year}>")) })
    }
}
