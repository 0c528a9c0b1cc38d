use geo::{Coord, Intersects, Line, Rect};
use rstar::{RTree, RTreeObject, AABB};

use crate::geom::Boundary;

/// A single ring segment stored in the R-tree.
#[derive(Debug, Clone)]
struct Edge {
    line: Line<f64>,
}

impl RTreeObject for Edge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.line.start.into(), self.line.end.into())
    }
}

/// Spatial index over every ring edge (exteriors and holes) of a boundary.
///
/// Answers the two questions the all-touched mask needs: does any edge cross
/// a cell rectangle, and where does a horizontal scanline cross the rings.
#[derive(Debug)]
pub struct EdgeIndex {
    rtree: RTree<Edge>,
}

impl EdgeIndex {
    pub fn new(boundary: &Boundary) -> Self {
        let edges = boundary.polygons()
            .flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
            .flat_map(|ring| ring.lines())
            .filter(|line| line.start != line.end)
            .map(|line| Edge { line })
            .collect();

        Self { rtree: RTree::bulk_load(edges) }
    }

    #[inline] pub fn len(&self) -> usize { self.rtree.size() }

    #[inline] pub fn is_empty(&self) -> bool { self.rtree.size() == 0 }

    /// True when some boundary edge intersects (or touches) the rectangle.
    pub fn touches(&self, rect: &Rect<f64>) -> bool {
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        self.rtree.locate_in_envelope_intersecting(&envelope)
            .any(|edge| edge.line.intersects(rect))
    }

    /// Sorted x positions where the horizontal line `y` crosses a ring within `[x_min, x_max]`.
    /// Uses the half-open rule so a vertex lying on the scanline is counted once.
    pub fn crossings(&self, y: f64, x_min: f64, x_max: f64) -> Vec<f64> {
        let envelope = AABB::from_corners([x_min, y], [x_max, y]);
        let mut xs = self.rtree.locate_in_envelope_intersecting(&envelope)
            .filter_map(|edge| crossing(edge.line.start, edge.line.end, y))
            .collect::<Vec<_>>();
        xs.sort_by(f64::total_cmp);
        xs
    }
}

#[inline]
fn crossing(a: Coord<f64>, b: Coord<f64>, y: f64) -> Option<f64> {
    ((a.y <= y) != (b.y <= y)).then(|| a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x))
}

/// Even-odd test: a point is inside when an odd number of crossings lie to its left.
///
/// `crossings` must come from [`EdgeIndex::crossings`] for the point's `y` over a
/// range starting at or left of the boundary's minimum x. A raster window clamped
/// to the raster extent can start inside a ring, so its left edge is not enough.
#[inline]
pub fn inside_by_parity(x: f64, crossings: &[f64]) -> bool {
    crossings.partition_point(|&cx| cx < x) % 2 == 1
}
