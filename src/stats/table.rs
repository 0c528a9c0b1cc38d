//! Tabular export of samples and district summaries.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerWriter, prelude::{CsvWriter, NamedFrom}, series::Series};

use crate::raster::PopulationSample;
use crate::stats::DistrictSummaryRow;

/// Point dataset with columns `lon`, `lat`, `population`.
pub fn samples_frame(samples: &[PopulationSample]) -> Result<DataFrame> {
    let lon = samples.iter().map(|s| s.lon).collect::<Vec<_>>();
    let lat = samples.iter().map(|s| s.lat).collect::<Vec<_>>();
    let population = samples.iter().map(|s| s.value).collect::<Vec<_>>();

    DataFrame::new(vec![
        Series::new("lon".into(), lon).into(),
        Series::new("lat".into(), lat).into(),
        Series::new("population".into(), population).into(),
    ]).context("[stats::table] Failed to build samples frame")
}

/// District table, one row per summarized district.
pub fn summary_frame(rows: &[DistrictSummaryRow]) -> Result<DataFrame> {
    let names = rows.iter().map(|row| row.district_name.clone()).collect::<Vec<_>>();
    let regions = rows.iter().map(|row| row.region.code()).collect::<Vec<_>>();
    let totals = rows.iter().map(|row| row.total_population).collect::<Vec<_>>();
    let densities = rows.iter().map(|row| row.population_density).collect::<Vec<_>>();
    let areas = rows.iter().map(|row| row.area_km2).collect::<Vec<_>>();
    let flags = rows.iter().map(|row| row.low_confidence).collect::<Vec<_>>();

    DataFrame::new(vec![
        Series::new("district_name".into(), names).into(),
        Series::new("adcode".into(), regions).into(),
        Series::new("total_population".into(), totals).into(),
        Series::new("population_density".into(), densities).into(),
        Series::new("area_km2".into(), areas).into(),
        Series::new("low_confidence".into(), flags).into(),
    ]).context("[stats::table] Failed to build summary frame")
}

pub fn write_samples_csv(samples: &[PopulationSample], path: &Path) -> Result<()> {
    write_csv(&mut samples_frame(samples)?, path)
}

pub fn write_summary_csv(rows: &[DistrictSummaryRow], path: &Path) -> Result<()> {
    write_csv(&mut summary_frame(rows)?, path)
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[stats::table] Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("[stats::table] Failed to write CSV to {:?}", path))
}
