use std::path::Path;
use std::sync::{Arc, Mutex};

use geo::Coord;
use ndarray::array;
use popgrid::{
    AdcodeTable, RegionId, RegionStatsAggregator, Settings,
    geom::{Boundary, area_km2},
    raster::{DirRasterStore, GeoTransform, RasterGrid, RasterSource, RasterStore, read_geotiff, write_geotiff},
    region::{FileBoundaryProvider, child_regions},
    stats::{Degeneracy, DistrictWarning, round2, write_summary_csv},
};
use serde_json::{Value, json};

const WEST: f64 = 118.7;
const NORTH: f64 = 32.1;
const RES: f64 = 0.01;

fn rect(west: f64, south: f64, east: f64, north: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[[west, south], [east, south], [east, north], [west, north], [west, south]]]
    })
}

fn feature(adcode: u32, name: &str, geometry: Value) -> Value {
    json!({ "type": "Feature", "properties": { "adcode": adcode, "name": name }, "geometry": geometry })
}

fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
}

/// A 4x4 raster for 2020 and boundaries for a city (320100) split into
/// a western (320102) and eastern (320106) half, plus one district outside coverage.
fn fixture(dir: &Path) {
    let grid = RasterGrid::new(
        array![
            [0.0, 5.0, 10.0, 0.0],
            [3.0, 0.0, 0.0, 8.0],
            [0.0, 6.0, 7.0, 0.0],
            [2.0, 0.0, 0.0, 4.0],
        ],
        GeoTransform::from_origin(WEST, NORTH, RES, RES),
        Some(-99999.0),
        4326,
    ).unwrap();

    let rasters = dir.join("rasters");
    std::fs::create_dir_all(&rasters).unwrap();
    write_geotiff(&grid, &DirRasterStore::new(&rasters).path_for(2020)).unwrap();

    let boundaries = dir.join("boundaries");
    std::fs::create_dir_all(&boundaries).unwrap();

    let south = NORTH - 4.0 * RES;
    let mid = WEST + 2.0 * RES;
    let east = WEST + 4.0 * RES;
    let west_half = rect(WEST, south, mid, NORTH);
    let east_half = rect(mid, south, east, NORTH);
    let far_away = rect(100.0, 20.0, 100.1, 20.1);

    write_json(&boundaries.join("320100.json"), &json!({
        "type": "FeatureCollection",
        "features": [feature(320100, "南京市", rect(WEST, south, east, NORTH))],
    }));
    write_json(&boundaries.join("320100_full.json"), &json!({
        "type": "FeatureCollection",
        "features": [
            feature(320102, "玄武区", west_half.clone()),
            feature(320106, "鼓楼区", east_half.clone()),
            feature(320199, "远郊区", far_away.clone()),
        ],
    }));
    for (adcode, geometry) in [(320102, west_half), (320106, east_half), (320199, far_away)] {
        write_json(&boundaries.join(format!("{adcode}.json")), &json!({
            "type": "FeatureCollection",
            "features": [feature(adcode, "", geometry)],
        }));
    }

    std::fs::write(
        dir.join("adcodes.csv"),
        "中文名,adcode\n南京市,320100\n玄武区,320102\n鼓楼区,320106\n鼓楼区,350102\n远郊区,320199\n",
    ).unwrap();
}

fn settings(dir: &Path) -> Settings {
    Settings {
        raster_dir: dir.join("rasters"),
        boundary_dir: Some(dir.join("boundaries")),
        workers: 2,
        ..Settings::default()
    }
}

#[test]
fn region_stats_from_directory_stores() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let aggregator = settings(dir.path()).aggregator().unwrap();
    let stats = aggregator.compute_region_stats(RegionId(320100), 2020).unwrap();

    assert_eq!(stats.samples.len(), 8);
    assert_eq!(stats.total_population, 45);
    assert_eq!(stats.max_sample_value, Some(10.0));
    assert_eq!(stats.min_sample_value, Some(2.0));
    assert_eq!(stats.degenerate, None);

    let boundary = Boundary::from_rect(Coord { x: WEST, y: NORTH - 4.0 * RES }, Coord { x: WEST + 4.0 * RES, y: NORTH });
    let area = area_km2(&boundary).unwrap();
    assert_eq!(stats.area_km2, round2(area));
    assert_eq!(stats.population_density, Some(round2(45.0 / area)));

    // Same inputs, same samples in the same order.
    let again = aggregator.compute_region_stats(RegionId(320100), 2020).unwrap();
    assert_eq!(again.samples, stats.samples);
}

#[test]
fn raster_round_trips_through_store() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let store = settings(dir.path()).raster_store();
    let raster = store.open(2020).unwrap();
    assert_eq!((raster.height(), raster.width()), (4, 4));
    assert_eq!(raster.nodata(), Some(-99999.0));
    assert_eq!(raster.transform(), &GeoTransform::from_origin(WEST, NORTH, RES, RES));

    let direct = read_geotiff(&store.path_for(2020)).unwrap();
    assert_eq!(raster.read_window(0..4, 0..4).unwrap().data(), direct.data());
    assert_eq!(raster.read_window(2..4, 1..3).unwrap().data(), &array![[6.0, 7.0], [0.0, 0.0]]);
    assert!(store.open(2021).is_err());
}

#[test]
fn city_table_from_child_regions() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let settings = settings(dir.path());
    let boundaries = Arc::new(FileBoundaryProvider::new(dir.path().join("boundaries")));
    let districts = child_regions(boundaries.as_ref(), RegionId(320100)).unwrap()
        .into_iter()
        .map(|(_, name)| name)
        .collect::<Vec<_>>();
    assert_eq!(districts, vec!["玄武区", "鼓楼区", "远郊区"]);

    let table = AdcodeTable::read_csv(&dir.path().join("adcodes.csv")).unwrap();
    let aggregator = RegionStatsAggregator::new(Arc::new(settings.raster_store()), boundaries).with_workers(2);

    let reports = Mutex::new(Vec::new());
    let progress = |done: usize, total: usize, _name: &str, warning: Option<&DistrictWarning>| {
        reports.lock().unwrap().push((done, total, warning.is_some()));
    };
    let summary = aggregator
        .compute_city_stats("江苏省", RegionId(320100), &districts, &table, 2020, &progress)
        .unwrap();

    // 鼓楼区 is ambiguous nationally but unique under 3201.
    let rows = summary.rows.iter()
        .map(|row| (row.district_name.as_str(), row.region, row.total_population))
        .collect::<Vec<_>>();
    assert_eq!(rows, vec![
        ("玄武区", RegionId(320102), 16),
        ("鼓楼区", RegionId(320106), 29),
        ("远郊区", RegionId(320199), 0),
    ]);
    assert!(summary.warnings.is_empty());
    assert_eq!(summary.rows[2].population_density, None);
    assert_eq!(summary.total_population(), 45);
    assert_eq!(reports.into_inner().unwrap(), vec![(1, 3, false), (2, 3, false), (3, 3, false)]);

    let csv = dir.path().join("summary.csv");
    write_summary_csv(&summary.rows, &csv).unwrap();
    let text = std::fs::read_to_string(&csv).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(text.starts_with("district_name,adcode,total_population,population_density,area_km2,low_confidence"));
}

#[test]
fn outside_coverage_district_is_degenerate() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let stats = settings(dir.path()).aggregator().unwrap()
        .compute_region_stats(RegionId(320199), 2020)
        .unwrap();
    assert_eq!(stats.degenerate, Some(Degeneracy::OutsideCoverage));
    assert!(stats.samples.is_empty());
}
