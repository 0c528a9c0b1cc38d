use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::geom::{Boundary, area_km2};
use crate::raster::{PopulationSample, RasterSource, RasterStore, RegionRasterClipper, samples};
use crate::region::{BoundaryProvider, RegionId, fetch_boundary};

/// Why a stats record carries no density or extrema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
    /// The boundary overlaps the raster, but no cell holds a positive population.
    NoSamples,
    /// The boundary lies entirely outside the raster extent.
    OutsideCoverage,
    /// The boundary has zero projected area.
    ZeroArea,
}

/// Population summary of one region for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPopulationStats {
    pub region: RegionId,
    pub year: u16,
    pub samples: Vec<PopulationSample>,
    /// Sum of sample values rounded to the nearest integer.
    pub total_population: u64,
    pub area_km2: f64,
    /// People per km², two decimals.
    pub population_density: Option<f64>,
    pub max_sample_value: Option<f64>,
    pub min_sample_value: Option<f64>,
    pub degenerate: Option<Degeneracy>,
}

/// Round half-to-even to two decimals.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Computes population statistics by combining a raster store with a boundary provider.
pub struct RegionStatsAggregator {
    rasters: Arc<dyn RasterStore>,
    boundaries: Arc<dyn BoundaryProvider>,
    workers: usize,
}

impl RegionStatsAggregator {
    pub fn new(rasters: Arc<dyn RasterStore>, boundaries: Arc<dyn BoundaryProvider>) -> Self {
        Self { rasters, boundaries, workers: 0 }
    }

    /// Worker threads for city batches; 0 uses one per core.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[inline] pub fn workers(&self) -> usize { self.workers }

    #[inline] pub(crate) fn rasters(&self) -> &dyn RasterStore { self.rasters.as_ref() }

    #[inline] pub(crate) fn boundaries(&self) -> &dyn BoundaryProvider { self.boundaries.as_ref() }

    /// Statistics for one region and year.
    pub fn compute_region_stats(&self, region: RegionId, year: u16) -> Result<RegionPopulationStats> {
        let raster = self.rasters.open(year)?;
        let boundary = fetch_boundary(self.boundaries(), region)?;

        let stats = stats_for_boundary(raster.as_ref(), &boundary, region, year)?;
        info!(target: "stats::region", "region {region} ({year}): population {}, area {} km²", stats.total_population, stats.area_km2);
        Ok(stats)
    }
}

/// Statistics for an already resolved raster and boundary.
pub fn stats_for_boundary(
    raster: &dyn RasterSource,
    boundary: &Boundary,
    region: RegionId,
    year: u16,
) -> Result<RegionPopulationStats> {
    let (samples, outside) = match RegionRasterClipper::new(raster).mask(boundary) {
        Ok(masked) => (samples(&masked), false),
        Err(Error::NoOverlap) => (Vec::new(), true),
        Err(e) => return Err(e),
    };
    let area = area_km2(boundary)?;
    debug!(target: "stats::region", "region {region}: {} samples, {area:.3} km²", samples.len());

    let sum = samples.iter().map(|s| s.value).sum::<f64>();
    let total_population = sum.round_ties_even().max(0.0) as u64;

    let max = samples.iter().map(|s| s.value).reduce(f64::max);
    let min = samples.iter().map(|s| s.value).reduce(f64::min);

    let degenerate = if outside {
        Some(Degeneracy::OutsideCoverage)
    } else if samples.is_empty() {
        Some(Degeneracy::NoSamples)
    } else if area <= 0.0 {
        Some(Degeneracy::ZeroArea)
    } else {
        None
    };
    let population_density = degenerate.is_none().then(|| round2(total_population as f64 / area));

    Ok(RegionPopulationStats {
        region,
        year,
        samples,
        total_population,
        area_km2: round2(area),
        population_density,
        max_sample_value: max.map(round2),
        min_sample_value: min.map(round2),
        degenerate,
    })
}
