//! Population rasters: the grid type, windowed sources, GeoTIFF I/O, per-year stores, and clipping.

mod clip;
mod geotiff;
mod grid;
mod source;
mod store;
mod transform;

pub use clip::{PopulationSample, RegionRasterClipper, samples};
pub use geotiff::{GeoTiffRaster, read_geotiff, read_geotiff_from, write_geotiff, write_geotiff_to};
pub use grid::RasterGrid;
pub use source::RasterSource;
pub use store::{DEFAULT_RASTER_PATTERN, DirRasterStore, MemoryRasterStore, RasterStore};
pub use transform::GeoTransform;
