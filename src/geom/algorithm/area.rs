use geo::Area;
use tracing::debug;

use crate::error::{Error, Result};
use crate::geom::{Boundary, Reprojector, WGS84, proj4_for_epsg, utm_proj4_for};

const M2_PER_KM2: f64 = 1_000_000.0;

/// Planar area in km², computed in the WGS84 UTM zone of the boundary's centroid.
pub fn area_km2(boundary: &Boundary) -> Result<f64> {
    boundary.validate()?;

    // Zone selection needs lon/lat, whatever CRS the boundary arrived in.
    let geographic = boundary.to_epsg(WGS84)?;
    let center = geographic.centroid().ok_or(Error::EmptyGeometry)?;
    let utm = utm_proj4_for(center.0);
    debug!(target: "geom::area", "centroid ({:.4}, {:.4}) -> {utm}", center.x(), center.y());

    area_in(&geographic, &utm)
}

/// Planar area in km² after reprojecting into the given PROJ.4 CRS (must be metric).
pub fn area_km2_in(boundary: &Boundary, proj4: &str) -> Result<f64> {
    boundary.validate()?;
    area_in(boundary, proj4)
}

fn area_in(boundary: &Boundary, proj4: &str) -> Result<f64> {
    let reprojector = Reprojector::new(proj4_for_epsg(boundary.epsg())?, proj4)?;

    // unsigned_area on a MultiPolygon subtracts holes and sums the parts.
    let area_m2 = boundary.shapes().iter()
        .map(|shape| reprojector.multi_polygon(shape).map(|projected| projected.unsigned_area()))
        .sum::<Result<f64>>()?;

    Ok(area_m2 / M2_PER_KM2)
}
