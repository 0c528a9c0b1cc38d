use geo::{BoundingRect, Centroid, Coord, MultiPolygon, Point, Polygon, Rect, Validation};

use crate::error::{Error, Result};
use crate::geom::{Reprojector, WGS84};

/// Administrative boundary: one or more MultiPolygons in a single EPSG-coded CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    shapes: Vec<MultiPolygon<f64>>,
    epsg: u32,
}

impl Boundary {
    /// Construct a boundary from MultiPolygons in the given CRS.
    pub fn new(shapes: Vec<MultiPolygon<f64>>, epsg: u32) -> Self {
        Self { shapes, epsg }
    }

    /// Construct a boundary in WGS84 lon/lat.
    pub fn geographic(shapes: Vec<MultiPolygon<f64>>) -> Self {
        Self::new(shapes, WGS84)
    }

    /// Construct a single-polygon boundary in WGS84 lon/lat.
    pub fn from_polygon(polygon: Polygon<f64>) -> Self {
        Self::geographic(vec![MultiPolygon(vec![polygon])])
    }

    /// Axis-aligned rectangle boundary in WGS84 lon/lat.
    pub fn from_rect(min: Coord<f64>, max: Coord<f64>) -> Self {
        Self::from_polygon(Rect::new(min, max).to_polygon())
    }

    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    /// Iterate over every constituent polygon of every shape.
    #[inline]
    pub fn polygons(&self) -> impl Iterator<Item = &Polygon<f64>> {
        self.shapes.iter().flat_map(|shape| shape.0.iter())
    }

    /// True when there is no polygon with a non-empty exterior ring.
    pub fn is_empty(&self) -> bool {
        self.polygons().all(|polygon| polygon.exterior().0.is_empty())
    }

    /// Bounding rectangle of all shapes.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes.iter()
            .filter_map(|shape| shape.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
    }

    /// Area-weighted centroid of all polygons taken together.
    pub fn centroid(&self) -> Option<Point<f64>> {
        MultiPolygon(self.polygons().cloned().collect()).centroid()
    }

    /// Check the boundary is non-empty and topologically valid.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() { return Err(Error::EmptyGeometry) }

        for shape in &self.shapes {
            if let Some(problem) = shape.validation_errors().into_iter().next() {
                return Err(Error::InvalidGeometry(problem.to_string()));
            }
        }
        Ok(())
    }

    /// Reproject into the CRS identified by `epsg`. No-op (clone) when already there.
    pub fn to_epsg(&self, epsg: u32) -> Result<Boundary> {
        if epsg == self.epsg { return Ok(self.clone()) }

        let reprojector = Reprojector::from_epsg(self.epsg, epsg)?;
        Ok(Boundary {
            shapes: self.shapes.iter()
                .map(|shape| reprojector.multi_polygon(shape))
                .collect::<Result<_>>()?,
            epsg,
        })
    }
}
