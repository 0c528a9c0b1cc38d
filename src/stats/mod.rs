//! Region and city population statistics.

mod city;
mod region;
mod table;

pub use city::{CitySummary, DistrictSummaryRow, DistrictWarning, NoProgress, ProgressSink, WarningKind};
pub use region::{Degeneracy, RegionPopulationStats, RegionStatsAggregator, round2, stats_for_boundary};
pub use table::{samples_frame, summary_frame, write_samples_csv, write_summary_csv};
