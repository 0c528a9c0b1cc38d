use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::error::{Error, Result};

/// EPSG code of WGS84 lon/lat.
pub const WGS84: u32 = 4326;

/// Look up the PROJ.4 definition for an EPSG code.
pub fn proj4_for_epsg(epsg: u32) -> Result<&'static str> {
    match epsg {
        4326 => Ok("+proj=longlat +datum=WGS84 +no_defs +type=crs"),
        4269 => Ok("+proj=longlat +datum=NAD83 +no_defs +type=crs"),
        _ => u16::try_from(epsg).ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4)
            .ok_or_else(|| Error::Projection(format!("EPSG:{epsg} is not in the crs-definitions database"))),
    }
}

#[inline]
fn is_geographic(proj_string: &str) -> bool {
    proj_string.contains("+proj=longlat") || proj_string.contains("+proj=latlong")
}

/// UTM zone (1..=60) containing a longitude.
#[inline]
pub fn utm_zone(lon: f64) -> u32 {
    (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u32
}

/// PROJ.4 string for a WGS84 UTM zone.
/// - north: EPSG 326zz, south: EPSG 327zz
pub fn utm_proj4(zone: u32, north: bool) -> String {
    let south = if north { "" } else { " +south" };
    format!("+proj=utm +zone={zone}{south} +datum=WGS84 +units=m +no_defs +type=crs")
}

/// PROJ.4 string for the WGS84 UTM zone containing a lon/lat point.
#[inline]
pub fn utm_proj4_for(center: Coord<f64>) -> String {
    utm_proj4(utm_zone(center.x), center.y >= 0.0)
}

/// Coordinate transformation between two CRSs.
/// Geographic coordinates are taken and returned in degrees.
pub struct Reprojector {
    from: Proj4,
    to: Proj4,
    from_geographic: bool,
    to_geographic: bool,
}

impl Reprojector {
    /// Build a transformation between two PROJ.4 definitions.
    pub fn new(from: &str, to: &str) -> Result<Self> {
        let build = |proj_string: &str| Proj4::from_proj_string(proj_string)
            .map_err(|e| Error::Projection(format!("failed to build PROJ.4 '{proj_string}': {e:?}")));

        Ok(Self {
            from: build(from)?,
            to: build(to)?,
            from_geographic: is_geographic(from),
            to_geographic: is_geographic(to),
        })
    }

    /// Build a transformation between two EPSG codes.
    pub fn from_epsg(from: u32, to: u32) -> Result<Self> {
        Self::new(proj4_for_epsg(from)?, proj4_for_epsg(to)?)
    }

    /// Transform a single coordinate.
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        // proj4rs works in radians for geographic CRSs.
        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from, &self.to, &mut point)
            .map_err(|e| Error::Projection(format!("transform of ({}, {}) failed: {e:?}", coord.x, coord.y)))?;

        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    /// Transform every coordinate of a MultiPolygon.
    pub fn multi_polygon(&self, shape: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>> {
        shape.try_map_coords(|coord| self.coord(coord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utm_zone_boundaries() {
        assert_eq!(utm_zone(-180.0), 1);
        assert_eq!(utm_zone(116.4), 50);
        assert_eq!(utm_zone(117.0), 50);
        assert_eq!(utm_zone(120.0), 51);
        assert_eq!(utm_zone(180.0), 60);
    }

    #[test]
    fn southern_hemisphere_uses_south_flag() {
        assert!(utm_proj4_for(Coord { x: 151.2, y: -33.9 }).contains("+zone=56 +south"));
        assert!(!utm_proj4_for(Coord { x: 116.4, y: 39.9 }).contains("+south"));
    }

    #[test]
    fn central_meridian_maps_to_false_easting() {
        // Zone 50 central meridian is 117E.
        let reprojector = Reprojector::new(proj4_for_epsg(WGS84).unwrap(), &utm_proj4(50, true)).unwrap();
        let projected = reprojector.coord(Coord { x: 117.0, y: 0.0 }).unwrap();
        assert!((projected.x - 500_000.0).abs() < 1e-3);
        assert!(projected.y.abs() < 1e-3);
    }

    #[test]
    fn round_trip_through_web_mercator() {
        let forward = Reprojector::from_epsg(WGS84, 3857).unwrap();
        let inverse = Reprojector::from_epsg(3857, WGS84).unwrap();

        let start = Coord { x: 116.391, y: 39.907 };
        let back = inverse.coord(forward.coord(start).unwrap()).unwrap();
        assert!((back.x - start.x).abs() < 1e-7);
        assert!((back.y - start.y).abs() < 1e-7);
    }

    #[test]
    fn unknown_epsg_is_a_projection_error() {
        assert!(matches!(proj4_for_epsg(999_999), Err(Error::Projection(_))));
    }
}
