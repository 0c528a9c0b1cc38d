use anyhow::{Context, Result};
use popgrid::{
    RegionId, RegionRasterClipper,
    raster::{GeoTiffRaster, write_geotiff},
    region::read_geojson_file,
    stats::{stats_for_boundary, write_samples_csv},
};
use serde_json::json;
use tracing::info;

pub fn run(_cli: &crate::cli::Cli, args: &crate::cli::ClipArgs) -> Result<()> {
    let boundary = read_geojson_file(&args.boundary)?;
    let raster = GeoTiffRaster::open(&args.raster)
        .with_context(|| format!("[clip] Failed to open raster {}", args.raster.display()))?;

    if let Some(path) = &args.output {
        let masked = RegionRasterClipper::new(&raster).mask(&boundary)?;
        write_geotiff(&masked, path)?;
        info!(target: "clip", "wrote {}x{} masked raster to {}", masked.width(), masked.height(), path.display());
    }

    // Local inputs carry no adcode or year.
    let stats = stats_for_boundary(&raster, &boundary, RegionId(0), 0)?;

    if let Some(path) = &args.samples {
        write_samples_csv(&stats.samples, path)?;
        info!(target: "clip", "wrote {} samples to {}", stats.samples.len(), path.display());
    }

    super::emit_json(&json!({
        "sample_count": stats.samples.len(),
        "total_population": stats.total_population,
        "area_km2": stats.area_km2,
        "population_density": stats.population_density,
        "max_sample_value": stats.max_sample_value,
        "min_sample_value": stats.min_sample_value,
        "degenerate": stats.degenerate,
    }), None)
}
