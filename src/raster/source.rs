use std::ops::Range;

use ndarray::s;

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterGrid};

/// A georeferenced single-band raster that can be read one pixel window at a time.
///
/// Implemented by in-memory grids and by [`GeoTiffRaster`](crate::raster::GeoTiffRaster),
/// which decodes only the strips or tiles a window touches.
pub trait RasterSource: Send + Sync {
    fn transform(&self) -> &GeoTransform;

    fn height(&self) -> usize;

    fn width(&self) -> usize;

    fn nodata(&self) -> Option<f64>;

    fn epsg(&self) -> u32;

    /// Cells `rows x cols` as a grid whose transform starts at the window's upper-left cell.
    fn read_window(&self, rows: Range<usize>, cols: Range<usize>) -> Result<RasterGrid>;
}

/// Reject windows that are empty or fall outside a `height x width` raster.
pub(crate) fn check_window(rows: &Range<usize>, cols: &Range<usize>, height: usize, width: usize) -> Result<()> {
    if rows.is_empty() || cols.is_empty() || rows.end > height || cols.end > width {
        return Err(Error::InvalidRaster(format!(
            "window rows {rows:?} cols {cols:?} outside {height}x{width} raster",
        )));
    }
    Ok(())
}

impl RasterSource for RasterGrid {
    #[inline] fn transform(&self) -> &GeoTransform { RasterGrid::transform(self) }

    #[inline] fn height(&self) -> usize { RasterGrid::height(self) }

    #[inline] fn width(&self) -> usize { RasterGrid::width(self) }

    #[inline] fn nodata(&self) -> Option<f64> { RasterGrid::nodata(self) }

    #[inline] fn epsg(&self) -> u32 { RasterGrid::epsg(self) }

    fn read_window(&self, rows: Range<usize>, cols: Range<usize>) -> Result<RasterGrid> {
        check_window(&rows, &cols, RasterGrid::height(self), RasterGrid::width(self))?;
        let transform = RasterGrid::transform(self).window(cols.start, rows.start);
        let data = self.data().slice(s![rows, cols]).to_owned();
        RasterGrid::new(data, transform, RasterGrid::nodata(self), RasterGrid::epsg(self))
    }
}
