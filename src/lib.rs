#![doc = "popgrid public API"]
pub mod config;
pub mod error;
pub mod geom;
pub mod raster;
pub mod region;
pub mod stats;

#[doc(inline)]
pub use config::Settings;

#[doc(inline)]
pub use error::{Error, Result};

#[doc(inline)]
pub use geom::{Boundary, area_km2};

#[doc(inline)]
pub use raster::{PopulationSample, RasterGrid, RasterSource, RasterStore, RegionRasterClipper};

#[doc(inline)]
pub use region::{AdcodeTable, BoundaryProvider, RegionId};

#[doc(inline)]
pub use stats::{CitySummary, DistrictSummaryRow, RegionPopulationStats, RegionStatsAggregator};
