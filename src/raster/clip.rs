use std::ops::Range;

use geo::Rect;
use ndarray::{Array2, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::geom::{Boundary, EdgeIndex, inside_by_parity};
use crate::raster::{GeoTransform, RasterGrid, RasterSource};

/// One retained raster cell: upper-left corner of the cell plus its population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationSample {
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
}

/// Pixel positions within this distance of an integer are snapped to it,
/// so boundaries drawn along cell edges don't pick up a sliver row or column.
const PIXEL_SNAP: f64 = 1e-6;

/// Masks and crops a raster to administrative boundaries.
///
/// A cell is kept when its footprint touches the boundary at all ("all-touched"),
/// so edge cells of small districts are not dropped. Only the boundary's pixel
/// window is read from the source.
pub struct RegionRasterClipper<'a> {
    source: &'a dyn RasterSource,
}

impl<'a> RegionRasterClipper<'a> {
    pub fn new(source: &'a dyn RasterSource) -> Self {
        Self { source }
    }

    /// Clip to `boundary` and return the surviving cells as samples in row-major order.
    /// A boundary entirely outside the raster yields no samples.
    pub fn clip(&self, boundary: &Boundary) -> Result<Vec<PopulationSample>> {
        match self.mask(boundary) {
            Ok(masked) => Ok(samples(&masked)),
            Err(Error::NoOverlap) => {
                debug!(target: "raster::clip", "boundary outside raster extent, no samples");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Mask and crop the raster to `boundary`.
    ///
    /// The result covers the boundary's bounding window; cells outside the boundary
    /// and source nodata cells are NaN, and the returned grid's nodata is NaN.
    pub fn mask(&self, boundary: &Boundary) -> Result<RasterGrid> {
        boundary.validate()?;

        let epsg = self.source.epsg();
        let boundary = if boundary.epsg() != epsg {
            debug!(target: "raster::clip", "reprojecting boundary EPSG:{} -> EPSG:{epsg}", boundary.epsg());
            boundary.to_epsg(epsg)?
        } else {
            boundary.clone()
        };

        let bounds = boundary.bounds().ok_or(Error::EmptyGeometry)?;
        let (rows, cols) = self.window(&bounds).ok_or(Error::NoOverlap)?;
        debug!(target: "raster::clip", "window rows {rows:?} cols {cols:?}");

        let window = self.source.read_window(rows.clone(), cols.clone())?;
        let transform = *window.transform();
        let inside = touched_cells(&EdgeIndex::new(&boundary), &transform, rows.len(), cols.len(), bounds.min().x);

        let masked = Zip::from(window.data()).and(&inside)
            .map_collect(|&value, &keep| if keep && !window.is_nodata(value) { value } else { f32::NAN });

        RasterGrid::new(masked, transform, Some(f64::NAN), epsg)
    }

    /// Pixel window (rows, cols) covering `bounds`, clamped to the raster.
    fn window(&self, bounds: &Rect<f64>) -> Option<(Range<usize>, Range<usize>)> {
        let inverse = self.source.transform().inverse()?;
        let a = inverse.apply(bounds.min().x, bounds.min().y);
        let b = inverse.apply(bounds.max().x, bounds.max().y);

        let clamp = |lo: f64, hi: f64, len: usize| -> Option<Range<usize>> {
            let start = snap(lo).floor().max(0.0);
            let end = snap(hi).ceil().min(len as f64);
            (start < end).then(|| start as usize..end as usize)
        };

        let cols = clamp(a.x.min(b.x), a.x.max(b.x), self.source.width())?;
        let rows = clamp(a.y.min(b.y), a.y.max(b.y), self.source.height())?;
        Some((rows, cols))
    }
}

#[inline]
fn snap(v: f64) -> f64 {
    let nearest = v.round();
    if (v - nearest).abs() < PIXEL_SNAP { nearest } else { v }
}

/// All-touched mask over a `rows x cols` window whose upper-left cell maps through `transform`.
///
/// A cell is kept when a boundary edge crosses its footprint, or, failing that,
/// when its centre lies inside by even-odd parity along the row's centre line.
/// The window may be clamped to the raster, so parity counts crossings from
/// `x_min`, the boundary's western extent, rather than from the window's left edge.
fn touched_cells(
    edges: &EdgeIndex,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    x_min: f64,
) -> Array2<bool> {
    let mut inside = Array2::from_elem((rows, cols), false);
    if edges.is_empty() { return inside }

    let (west, east) = (transform.apply(0.0, 0.0).x, transform.apply(cols as f64, 0.0).x);
    let left = x_min.min(west).min(east);
    let right = west.max(east);

    // Crossings are shared by every cell of a row, so compute them once per row.
    let crossings = (0..rows).into_par_iter()
        .map(|row| edges.crossings(transform.cell_center(row, 0).y, left, right))
        .collect::<Vec<_>>();

    Zip::indexed(&mut inside).par_for_each(|(row, col), keep| {
        *keep = edges.touches(&transform.cell_rect(row, col))
            || inside_by_parity(transform.cell_center(row, col).x, &crossings[row]);
    });

    inside
}

/// Extract samples from a masked grid: one pass in row-major order, skipping
/// nodata and non-positive cells, with coordinates at each cell's upper-left corner.
pub fn samples(masked: &RasterGrid) -> Vec<PopulationSample> {
    let transform = masked.transform();
    masked.data().indexed_iter()
        .filter(|&(_, &value)| !masked.is_nodata(value) && value > 0.0)
        .map(|((row, col), &value)| {
            let corner = transform.apply(col as f64, row as f64);
            PopulationSample { lon: corner.x, lat: corner.y, value: value as f64 }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use geo::{Coord, LineString, MultiPolygon, Polygon, polygon};
    use ndarray::array;

    use super::*;

    const WEST: f64 = 116.0;
    const NORTH: f64 = 40.0;
    const RES: f64 = 0.01;

    /// The 4x4 reference grid with nodata = -1.
    fn reference_grid() -> RasterGrid {
        RasterGrid::new(
            array![
                [0.0, 5.0, 10.0, 0.0],
                [3.0, 0.0, 0.0, 8.0],
                [0.0, 6.0, 7.0, 0.0],
                [2.0, 0.0, 0.0, 4.0],
            ],
            GeoTransform::from_origin(WEST, NORTH, RES, RES),
            Some(-1.0),
            4326,
        ).unwrap()
    }

    fn full_extent() -> Boundary {
        Boundary::from_rect(Coord { x: WEST, y: NORTH - 4.0 * RES }, Coord { x: WEST + 4.0 * RES, y: NORTH })
    }

    #[test]
    fn full_extent_keeps_every_positive_cell() {
        let grid = reference_grid();
        let samples = RegionRasterClipper::new(&grid).clip(&full_extent()).unwrap();

        assert_eq!(samples.len(), 8);
        assert_eq!(samples.iter().map(|s| s.value).sum::<f64>(), 45.0);
        assert!(samples.iter().all(|s| s.value > 0.0));
    }

    #[test]
    fn samples_are_row_major_upper_left_corners() {
        let grid = reference_grid();
        let samples = RegionRasterClipper::new(&grid).clip(&full_extent()).unwrap();

        let values = samples.iter().map(|s| s.value).collect::<Vec<_>>();
        assert_eq!(values, vec![5.0, 10.0, 3.0, 8.0, 6.0, 7.0, 2.0, 4.0]);

        // Cell (0, 1) has its upper-left corner one column east of the origin.
        assert!((samples[0].lon - (WEST + RES)).abs() < 1e-12);
        assert!((samples[0].lat - NORTH).abs() < 1e-12);
        // Cell (3, 0).
        assert!((samples[6].lon - WEST).abs() < 1e-12);
        assert!((samples[6].lat - (NORTH - 3.0 * RES)).abs() < 1e-12);
    }

    #[test]
    fn clipping_is_deterministic() {
        let grid = reference_grid();
        let clipper = RegionRasterClipper::new(&grid);
        let boundary = Boundary::from_polygon(polygon![
            (x: 116.005, y: 39.995), (x: 116.035, y: 39.99), (x: 116.02, y: 39.965), (x: 116.005, y: 39.995),
        ]);
        assert_eq!(clipper.clip(&boundary).unwrap(), clipper.clip(&boundary).unwrap());
    }

    #[test]
    fn mask_crops_to_bounding_window() {
        let grid = reference_grid();
        // Covers columns 1..3 and rows 1..3 with some margin inside the cells.
        let boundary = Boundary::from_rect(Coord { x: 116.012, y: 39.972 }, Coord { x: 116.028, y: 39.988 });
        let masked = RegionRasterClipper::new(&grid).mask(&boundary).unwrap();

        assert_eq!((masked.height(), masked.width()), (2, 2));
        assert_eq!(masked.transform().apply(0.0, 0.0), grid.transform().apply(1.0, 1.0));
        assert_eq!(samples(&masked).iter().map(|s| s.value).collect::<Vec<_>>(), vec![6.0, 7.0]);
    }

    #[test]
    fn all_touched_keeps_cell_whose_centre_is_outside() {
        let grid = reference_grid();
        // A sliver in the corner of cell (0, 2), well away from its centre.
        let boundary = Boundary::from_rect(Coord { x: 116.0201, y: 39.9981 }, Coord { x: 116.0205, y: 39.9985 });
        let samples = RegionRasterClipper::new(&grid).clip(&boundary).unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 10.0);
    }

    #[test]
    fn nodata_and_outside_cells_become_nan() {
        let mut data = reference_grid().data().clone();
        data[[0, 1]] = -1.0;
        let grid = RasterGrid::new(data, GeoTransform::from_origin(WEST, NORTH, RES, RES), Some(-1.0), 4326).unwrap();

        // Triangle over the upper-left half; cell (3, 3) is outside it.
        let boundary = Boundary::from_polygon(polygon![
            (x: 116.0, y: 40.0), (x: 116.04, y: 40.0), (x: 116.0, y: 39.96), (x: 116.0, y: 40.0),
        ]);
        let masked = RegionRasterClipper::new(&grid).mask(&boundary).unwrap();

        assert!(masked.data()[[0, 1]].is_nan());
        assert!(masked.data()[[3, 3]].is_nan());
        // Legitimate zero stays zero.
        assert_eq!(masked.data()[[0, 0]], 0.0);
        assert!(samples(&masked).iter().all(|s| s.value > 0.0 && s.value != -1.0));
    }

    #[test]
    fn hole_cells_are_excluded() {
        let grid = RasterGrid::new(
            Array2::from_elem((5, 5), 1.0),
            GeoTransform::from_origin(0.0, 5.0, 1.0, 1.0),
            None,
            4326,
        ).unwrap();
        let outer = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 5.0, y: 5.0 }).to_polygon();
        let hole = Rect::new(Coord { x: 1.9, y: 1.9 }, Coord { x: 3.1, y: 3.1 }).to_polygon();
        let boundary = Boundary::geographic(vec![MultiPolygon(vec![Polygon::new(
            outer.exterior().clone(),
            vec![LineString(hole.exterior().0.iter().rev().copied().collect())],
        )])]);

        let masked = RegionRasterClipper::new(&grid).mask(&boundary).unwrap();
        // Only the centre cell lies wholly inside the hole; its ring neighbours touch the hole edge.
        assert!(masked.data()[[2, 2]].is_nan());
        assert_eq!(samples(&masked).len(), 24);
    }

    fn ones(size: usize) -> RasterGrid {
        RasterGrid::new(
            Array2::from_elem((size, size), 1.0),
            GeoTransform::from_origin(0.0, size as f64, 1.0, 1.0),
            None,
            4326,
        ).unwrap()
    }

    #[test]
    fn boundary_past_west_edge_keeps_interior_cells() {
        let grid = ones(4);
        // Starts two cells west of the raster; the window is clamped to column 0.
        let boundary = Boundary::from_rect(Coord { x: -2.0, y: 0.0 }, Coord { x: 2.5, y: 4.0 });
        let samples = RegionRasterClipper::new(&grid).clip(&boundary).unwrap();

        assert_eq!(samples.len(), 12);
        let lons = samples.iter().map(|s| s.lon).collect::<Vec<_>>();
        assert_eq!(lons, [0.0, 1.0, 2.0].repeat(4));
    }

    #[test]
    fn boundary_past_north_and_west_edges_keeps_interior_cells() {
        let grid = ones(4);
        // Overhangs the top and left of the raster; rows 0..=2 and columns 0..=2 remain.
        let boundary = Boundary::from_rect(Coord { x: -2.0, y: 1.5 }, Coord { x: 2.5, y: 6.0 });
        let masked = RegionRasterClipper::new(&grid).mask(&boundary).unwrap();

        assert_eq!((masked.height(), masked.width()), (3, 3));
        assert_eq!(masked.transform().apply(0.0, 0.0), Coord { x: 0.0, y: 4.0 });
        assert!(masked.data().iter().all(|&value| value == 1.0));
        assert_eq!(samples(&masked).len(), 9);
    }

    #[test]
    fn ring_wider_than_raster_keeps_every_cell() {
        let grid = ones(4);
        let boundary = Boundary::from_rect(Coord { x: -10.0, y: -10.0 }, Coord { x: 10.0, y: 10.0 });
        assert_eq!(RegionRasterClipper::new(&grid).clip(&boundary).unwrap().len(), 16);
    }

    #[test]
    fn geotiff_source_decodes_only_the_boundary_window() {
        use std::{fs::File, io::BufWriter};

        use crate::raster::GeoTiffRaster;
        use crate::raster::geotiff::write_geotiff_strips;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ones.tif");
        write_geotiff_strips(&ones(8), BufWriter::new(File::create(&path).unwrap()), Some(1)).unwrap();
        let raster = GeoTiffRaster::open(&path).unwrap();

        // Rows 2..5 and columns 2..5 of an 8x8 raster stored one row per strip.
        let boundary = Boundary::from_rect(Coord { x: 2.2, y: 3.2 }, Coord { x: 4.8, y: 5.8 });
        let samples = RegionRasterClipper::new(&raster).clip(&boundary).unwrap();

        assert_eq!(samples.len(), 9);
        assert_eq!(raster.chunks_read(), 3);
    }

    #[test]
    fn boundary_outside_raster() {
        let grid = reference_grid();
        let far_away = Boundary::from_rect(Coord { x: 10.0, y: 10.0 }, Coord { x: 11.0, y: 11.0 });
        let clipper = RegionRasterClipper::new(&grid);

        assert!(matches!(clipper.mask(&far_away), Err(Error::NoOverlap)));
        assert!(clipper.clip(&far_away).unwrap().is_empty());
    }

    #[test]
    fn invalid_and_empty_boundaries_are_errors() {
        let grid = reference_grid();
        let clipper = RegionRasterClipper::new(&grid);

        assert!(matches!(clipper.clip(&Boundary::geographic(vec![])), Err(Error::EmptyGeometry)));

        let bow_tie = polygon![
            (x: 116.0, y: 40.0), (x: 116.04, y: 39.96), (x: 116.04, y: 40.0), (x: 116.0, y: 39.96), (x: 116.0, y: 40.0),
        ];
        assert!(matches!(clipper.clip(&Boundary::from_polygon(bow_tie)), Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn boundary_in_other_crs_is_reprojected() {
        let grid = reference_grid();
        let mercator = full_extent().to_epsg(3857).unwrap();
        let samples = RegionRasterClipper::new(&grid).clip(&mercator).unwrap();

        assert_eq!(samples.len(), 8);
        assert_eq!(samples.iter().map(|s| s.value).sum::<f64>(), 45.0);
    }
}
