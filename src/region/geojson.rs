use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;

use crate::geom::{Boundary, WGS84};

/// Read a GeoJSON file (FeatureCollection, Feature, or bare geometry) into a WGS84 boundary.
pub fn read_geojson_file(path: &Path) -> Result<Boundary> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("[region::geojson] Failed to read GeoJSON file: {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("[region::geojson] Failed to parse GeoJSON from {:?}", path))?;
    parse_boundary(&value)
}

/// Collect every Polygon / MultiPolygon geometry in a GeoJSON value into a WGS84 boundary.
/// Other geometry types, and features with null geometry, are ignored.
pub fn parse_boundary(value: &Value) -> Result<Boundary> {
    let mut shapes = Vec::new();
    collect_shapes(value, &mut shapes)?;

    if shapes.is_empty() {
        bail!("[region::geojson] No Polygon or MultiPolygon geometry found");
    }
    Ok(Boundary::new(shapes, WGS84))
}

fn collect_shapes(value: &Value, shapes: &mut Vec<MultiPolygon<f64>>) -> Result<()> {
    match value["type"].as_str() {
        Some("FeatureCollection") => {
            let features = value["features"].as_array()
                .ok_or_else(|| anyhow!("[region::geojson] FeatureCollection without a features array"))?;
            for feature in features {
                collect_shapes(feature, shapes)?;
            }
        }
        Some("Feature") => {
            if !value["geometry"].is_null() {
                collect_shapes(&value["geometry"], shapes)?;
            }
        }
        Some("GeometryCollection") => {
            for geometry in value["geometries"].as_array().into_iter().flatten() {
                collect_shapes(geometry, shapes)?;
            }
        }
        Some("Polygon") => {
            shapes.push(MultiPolygon(vec![parse_polygon(coordinates(value)?)?]));
        }
        Some("MultiPolygon") => {
            let polygons = coordinates(value)?.iter()
                .map(|polygon| polygon.as_array()
                    .ok_or_else(|| anyhow!("[region::geojson] MultiPolygon member must be an array"))
                    .and_then(|rings| parse_polygon(rings)))
                .collect::<Result<Vec<_>>>()?;
            shapes.push(MultiPolygon(polygons));
        }
        _ => {}
    }
    Ok(())
}

fn coordinates(geometry: &Value) -> Result<&Vec<Value>> {
    geometry["coordinates"].as_array()
        .ok_or_else(|| anyhow!("[region::geojson] Geometry without a coordinates array"))
}

/// GeoJSON polygon coordinates: `[exterior, hole, hole, ...]`.
fn parse_polygon(rings: &[Value]) -> Result<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| {
        ring.as_array()
            .ok_or_else(|| anyhow!("[region::geojson] Polygon ring must be an array"))
            .and_then(|coords| parse_ring(coords))
    });

    let exterior = rings.next()
        .ok_or_else(|| anyhow!("[region::geojson] Polygon without an exterior ring"))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(coords: &[Value]) -> Result<LineString<f64>> {
    let mut points = coords.iter()
        .map(|position| {
            let x = position[0].as_f64();
            let y = position[1].as_f64();
            match (x, y) {
                (Some(x), Some(y)) => Ok(Coord { x, y }),
                _ => Err(anyhow!("[region::geojson] Invalid position {position}")),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
        if first != last { points.push(first) }
    }
    Ok(LineString(points))
}
