use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// Six-parameter affine transform from pixel space (col, row) to CRS space (x, y):
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// Pixel (0, 0) is the upper-left corner of the upper-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// North-up transform from the upper-left corner and positive cell sizes.
    pub const fn from_origin(west: f64, north: f64, x_res: f64, y_res: f64) -> Self {
        Self::new(x_res, 0.0, west, 0.0, -y_res, north)
    }

    /// Build from GDAL ordering `[c, a, b, f, d, e]`.
    pub const fn from_gdal(gt: [f64; 6]) -> Self {
        Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    /// GDAL ordering `[c, a, b, f, d, e]`.
    pub const fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// True when rows and columns are aligned with the CRS axes.
    #[inline] pub fn is_north_up(&self) -> bool { self.b == 0.0 && self.d == 0.0 }

    /// Absolute cell size `(x, y)` for a north-up transform.
    #[inline] pub fn resolution(&self) -> (f64, f64) { (self.a.abs(), self.e.abs()) }

    #[inline]
    fn determinant(&self) -> f64 { self.a * self.e - self.b * self.d }

    /// Map a (fractional) pixel position to CRS coordinates.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> Coord<f64> {
        Coord {
            x: self.a * col + self.b * row + self.c,
            y: self.d * col + self.e * row + self.f,
        }
    }

    /// Inverse transform (CRS space to pixel space), if the matrix is invertible.
    pub fn inverse(&self) -> Option<GeoTransform> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() { return None }

        let (ia, ib, id, ie) = (self.e / det, -self.b / det, -self.d / det, self.a / det);
        Some(Self::new(
            ia, ib, -(ia * self.c + ib * self.f),
            id, ie, -(id * self.c + ie * self.f),
        ))
    }

    /// Transform of a sub-window whose upper-left cell is (`col_off`, `row_off`).
    pub fn window(&self, col_off: usize, row_off: usize) -> GeoTransform {
        let origin = self.apply(col_off as f64, row_off as f64);
        Self { c: origin.x, f: origin.y, ..*self }
    }

    /// Footprint of cell (`row`, `col`) for a north-up transform.
    #[inline]
    pub fn cell_rect(&self, row: usize, col: usize) -> Rect<f64> {
        Rect::new(self.apply(col as f64, row as f64), self.apply(col as f64 + 1.0, row as f64 + 1.0))
    }

    /// Centre of cell (`row`, `col`).
    #[inline]
    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_and_far_corner() {
        let gt = GeoTransform::from_origin(116.0, 40.0, 0.25, 0.5);
        assert_eq!(gt.apply(0.0, 0.0), Coord { x: 116.0, y: 40.0 });
        assert_eq!(gt.apply(4.0, 2.0), Coord { x: 117.0, y: 39.0 });
        assert_eq!(gt.resolution(), (0.25, 0.5));
    }

    #[test]
    fn inverse_round_trips() {
        let gt = GeoTransform::new(0.5, 0.1, 100.0, -0.2, -0.5, 50.0);
        let inv = gt.inverse().unwrap();
        let world = gt.apply(3.0, 7.0);
        let pixel = inv.apply(world.x, world.y);
        assert!((pixel.x - 3.0).abs() < 1e-12);
        assert!((pixel.y - 7.0).abs() < 1e-12);
    }

    #[test]
    fn singular_transform_has_no_inverse() {
        assert!(GeoTransform::new(0.0, 0.0, 1.0, 0.0, 0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn window_shifts_origin_only() {
        let gt = GeoTransform::from_origin(10.0, 20.0, 1.0, 1.0);
        let window = gt.window(3, 2);
        assert_eq!(window.apply(0.0, 0.0), Coord { x: 13.0, y: 18.0 });
        assert_eq!(window.resolution(), gt.resolution());
    }

    #[test]
    fn gdal_ordering() {
        let gdal = [116.0, 0.01, 0.0, 40.0, 0.0, -0.01];
        let gt = GeoTransform::from_gdal(gdal);
        assert_eq!(gt, GeoTransform::from_origin(116.0, 40.0, 0.01, 0.01));
        assert_eq!(gt.to_gdal(), gdal);
    }

    #[test]
    fn cell_rect_is_normalized() {
        let rect = GeoTransform::from_origin(0.0, 10.0, 1.0, 1.0).cell_rect(0, 0);
        assert_eq!(rect.min(), Coord { x: 0.0, y: 9.0 });
        assert_eq!(rect.max(), Coord { x: 1.0, y: 10.0 });
    }
}
