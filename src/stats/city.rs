use std::sync::{Mutex, PoisonError};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::raster::RasterSource;
use crate::region::{AdcodeTable, Lookup, RegionId, Resolution, disambiguate, fetch_boundary, parent_prefix};
use crate::stats::{RegionStatsAggregator, stats_for_boundary};

/// One district's line in a city summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictSummaryRow {
    pub district_name: String,
    pub region: RegionId,
    pub total_population: u64,
    pub population_density: Option<f64>,
    pub area_km2: f64,
    /// The district name matched several codes under the parent city; the first was used.
    pub low_confidence: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Name absent from the adcode table; district skipped.
    UnknownName,
    /// No candidate code falls under the parent city; district skipped.
    Unresolved,
    /// Several candidate codes fall under the parent city; row kept with low confidence.
    LowConfidence,
    /// Boundary or statistics failed; district skipped.
    Failed,
}

/// A non-fatal problem with one district of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictWarning {
    pub district_name: String,
    pub kind: WarningKind,
    pub error: String,
}

impl DistrictWarning {
    fn new(district_name: &str, kind: WarningKind, error: &Error) -> Self {
        Self { district_name: district_name.to_string(), kind, error: error.to_string() }
    }

    /// True when the district produced no row.
    #[inline] pub fn skipped(&self) -> bool { self.kind != WarningKind::LowConfidence }
}

/// Per-district table for a city, in the order the districts were requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitySummary {
    pub rows: Vec<DistrictSummaryRow>,
    pub warnings: Vec<DistrictWarning>,
}

impl CitySummary {
    #[inline] pub fn total_population(&self) -> u64 { self.rows.iter().map(|row| row.total_population).sum() }
}

/// Receives `(done, total, district, warning)` as each district of a batch completes.
/// `warning` is the district's own problem, if any, so failures surface while the
/// batch is still running. Calls are serialized and `done` increases by one each time.
pub trait ProgressSink: Sync {
    fn report(&self, done: usize, total: usize, district: &str, warning: Option<&DistrictWarning>);
}

impl<F: Fn(usize, usize, &str, Option<&DistrictWarning>) + Sync> ProgressSink for F {
    fn report(&self, done: usize, total: usize, district: &str, warning: Option<&DistrictWarning>) {
        self(done, total, district, warning)
    }
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _done: usize, _total: usize, _district: &str, _warning: Option<&DistrictWarning>) {}
}

/// What one district contributed to the summary.
#[derive(Debug, Default)]
struct DistrictOutcome {
    row: Option<DistrictSummaryRow>,
    warning: Option<DistrictWarning>,
}

impl RegionStatsAggregator {
    /// Summary table for the named districts of `city` (a city in `province`).
    ///
    /// The raster for `year` is opened once; a missing raster fails the whole batch.
    /// Every per-district problem is recorded as a warning and never aborts the batch.
    pub fn compute_city_stats(
        &self,
        province: &str,
        city: RegionId,
        district_names: &[String],
        table: &AdcodeTable,
        year: u16,
        progress: &dyn ProgressSink,
    ) -> Result<CitySummary> {
        let raster = self.rasters().open(year)?;
        let prefix = parent_prefix(province, city);
        let total = district_names.len();
        info!(target: "stats::city", "city {city} ({year}): {total} districts, prefix {prefix}");

        let pool = rayon::ThreadPoolBuilder::new().num_threads(self.workers()).build()?;
        let done = Mutex::new(0usize);

        let outcomes = pool.install(|| {
            district_names.par_iter()
                .map(|name| {
                    let outcome = self.district_outcome(name, &prefix, table, raster.as_ref(), year);
                    if let Some(warning) = &outcome.warning {
                        warn!(target: "stats::city", "{}: {}", warning.district_name, warning.error);
                    }

                    let mut done = done.lock().unwrap_or_else(PoisonError::into_inner);
                    *done += 1;
                    progress.report(*done, total, name, outcome.warning.as_ref());
                    outcome
                })
                .collect::<Vec<_>>()
        });

        let mut summary = CitySummary::default();
        for outcome in outcomes {
            summary.warnings.extend(outcome.warning);
            summary.rows.extend(outcome.row);
        }

        info!(target: "stats::city", "city {city} ({year}): {} rows, {} warnings", summary.rows.len(), summary.warnings.len());
        Ok(summary)
    }

    fn district_outcome(
        &self,
        name: &str,
        prefix: &str,
        table: &AdcodeTable,
        raster: &dyn RasterSource,
        year: u16,
    ) -> DistrictOutcome {
        let (region, warning) = match resolve_district(name, prefix, table) {
            Ok(resolved) => resolved,
            Err(warning) => return DistrictOutcome { row: None, warning: Some(warning) },
        };

        let stats = fetch_boundary(self.boundaries(), region)
            .and_then(|boundary| stats_for_boundary(raster, &boundary, region, year));

        match stats {
            Ok(stats) => DistrictOutcome {
                row: Some(DistrictSummaryRow {
                    district_name: name.to_string(),
                    region,
                    total_population: stats.total_population,
                    population_density: stats.population_density,
                    area_km2: stats.area_km2,
                    low_confidence: warning.is_some(),
                }),
                warning,
            },
            Err(e) => DistrictOutcome {
                row: None,
                warning: Some(DistrictWarning::new(name, WarningKind::Failed, &e)),
            },
        }
    }
}

/// Resolve a district name to one code under the parent prefix.
/// `Ok` carries a low-confidence warning when several codes matched and the first was taken.
fn resolve_district(
    name: &str,
    prefix: &str,
    table: &AdcodeTable,
) -> std::result::Result<(RegionId, Option<DistrictWarning>), DistrictWarning> {
    let candidates = match table.lookup(name) {
        Lookup::Unique(id) => return Ok((id, None)),
        Lookup::Missing => {
            let error = Error::UnknownRegionName(name.to_string());
            return Err(DistrictWarning::new(name, WarningKind::UnknownName, &error));
        }
        Lookup::Ambiguous(candidates) => candidates,
    };

    match disambiguate(&candidates, prefix) {
        Resolution::Unique(id) => Ok((id, None)),
        Resolution::Ambiguous(matches) => {
            let error = Error::AmbiguousRegionName { name: name.to_string(), candidates: matches.clone() };
            match matches.first() {
                Some(&first) => Ok((first, Some(DistrictWarning::new(name, WarningKind::LowConfidence, &error)))),
                None => Err(DistrictWarning::new(name, WarningKind::Unresolved, &error)),
            }
        }
    }
}
