use geo::{Coord, Rect};
use ndarray::Array2;

use crate::error::{Error, Result};
use crate::raster::GeoTransform;

/// Single-band raster of population counts. Immutable once built.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    data: Array2<f32>,     // (rows, cols), row 0 at the top
    transform: GeoTransform,
    nodata: Option<f64>,   // NaN cells are always treated as nodata as well
    epsg: u32,
}

impl RasterGrid {
    /// Build a grid, rejecting empty, rotated, or degenerate layouts.
    pub fn new(data: Array2<f32>, transform: GeoTransform, nodata: Option<f64>, epsg: u32) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidRaster("raster has zero rows or columns".into()));
        }
        check_transform(&transform)?;

        Ok(Self { data, transform, nodata, epsg })
    }

    #[inline] pub fn data(&self) -> &Array2<f32> { &self.data }

    #[inline] pub fn transform(&self) -> &GeoTransform { &self.transform }

    #[inline] pub fn nodata(&self) -> Option<f64> { self.nodata }

    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    #[inline] pub fn height(&self) -> usize { self.data.nrows() }

    #[inline] pub fn width(&self) -> usize { self.data.ncols() }

    #[inline] pub fn resolution(&self) -> (f64, f64) { self.transform.resolution() }

    /// Cell value, or None when out of range.
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> Option<f32> {
        self.data.get((row, col)).copied()
    }

    /// True for NaN and for values equal to the nodata sentinel.
    #[inline]
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nodata| value as f64 == nodata)
    }

    /// Extent covered by the grid in its CRS.
    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            self.transform.apply(0.0, 0.0),
            self.transform.apply(self.width() as f64, self.height() as f64),
        )
    }

    /// Pixel-space position (fractional col, row) of a CRS coordinate.
    pub fn pixel_of(&self, coord: Coord<f64>) -> Option<Coord<f64>> {
        self.transform.inverse().map(|inv| inv.apply(coord.x, coord.y))
    }
}

/// Reject rotated transforms and zero or non-finite cell sizes.
pub(crate) fn check_transform(transform: &GeoTransform) -> Result<()> {
    if !transform.is_north_up() {
        return Err(Error::InvalidRaster(format!("rotated transforms are not supported: {transform:?}")));
    }
    let (x_res, y_res) = transform.resolution();
    if x_res == 0.0 || y_res == 0.0 || !x_res.is_finite() || !y_res.is_finite() {
        return Err(Error::InvalidRaster(format!("degenerate cell size ({x_res}, {y_res})")));
    }
    Ok(())
}
