use anyhow::Result;
use popgrid::{RegionId, stats::write_samples_csv};
use tracing::info;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::RegionArgs) -> Result<()> {
    let settings = cli.settings()?;
    let aggregator = settings.aggregator()?;

    let stats = aggregator.compute_region_stats(RegionId(args.adcode), args.year)?;

    if let Some(path) = &args.samples {
        write_samples_csv(&stats.samples, path)?;
        info!(target: "region", "wrote {} samples to {}", stats.samples.len(), path.display());
    }

    // The point list goes to --samples; keep the summary small.
    let mut summary = serde_json::to_value(&stats)?;
    if let Some(fields) = summary.as_object_mut() {
        fields.remove("samples");
        fields.insert("sample_count".into(), stats.samples.len().into());
    }

    super::emit_json(&summary, args.json.as_deref())
}
