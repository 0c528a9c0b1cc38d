use std::sync::Arc;

use anyhow::{Result, bail};
use popgrid::{
    AdcodeTable, RegionId, RegionStatsAggregator,
    region::child_regions,
    stats::{DistrictWarning, write_summary_csv},
};
use tracing::info;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::CityArgs) -> Result<()> {
    let settings = cli.settings()?;
    let table = AdcodeTable::read_csv(&args.adcodes)?;
    let boundaries = settings.boundary_provider()?;
    let city = RegionId(args.city);

    let districts = if args.districts.is_empty() {
        child_regions(boundaries.as_ref(), city)?.into_iter().map(|(_, name)| name).collect::<Vec<_>>()
    } else {
        args.districts.clone()
    };
    if districts.is_empty() { bail!("[city] No districts found for city {city}") }

    let aggregator = RegionStatsAggregator::new(Arc::new(settings.raster_store()), boundaries)
        .with_workers(settings.workers);

    let progress = |done: usize, total: usize, name: &str, warning: Option<&DistrictWarning>| match warning {
        Some(warning) if warning.skipped() => info!(target: "city", "[{done}/{total}] {name} skipped ({:?})", warning.kind),
        Some(warning) => info!(target: "city", "[{done}/{total}] {name} ({:?})", warning.kind),
        None => info!(target: "city", "[{done}/{total}] {name}"),
    };
    let summary = aggregator.compute_city_stats(&args.province, city, &districts, &table, args.year, &progress)?;

    match &args.output {
        Some(path) => {
            write_summary_csv(&summary.rows, path)?;
            info!(target: "city", "wrote {} rows to {}", summary.rows.len(), path.display());
            Ok(())
        }
        None => super::emit_json(&serde_json::to_value(&summary)?, None),
    }
}
