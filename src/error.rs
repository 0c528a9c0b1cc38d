use std::path::PathBuf;

use crate::region::RegionId;

/// Errors produced by the clipping and aggregation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The boundary has no polygons, or only empty ones.
    #[error("boundary geometry is empty")]
    EmptyGeometry,

    /// The boundary is self-intersecting or otherwise malformed.
    #[error("boundary geometry is invalid: {0}")]
    InvalidGeometry(String),

    /// The boundary lies entirely outside the raster extent.
    #[error("boundary does not overlap the raster extent")]
    NoOverlap,

    /// No raster asset exists for the requested year.
    #[error("no population raster for year {year} (looked for {})", path.display())]
    RasterNotFound { year: u16, path: PathBuf },

    /// The boundary for a region could not be fetched or parsed.
    #[error("failed to resolve boundary for region {region}: {reason}")]
    BoundaryResolution { region: RegionId, reason: String },

    /// Name disambiguation produced zero or several candidates.
    #[error("region name '{name}' is ambiguous (candidates: {candidates:?})")]
    AmbiguousRegionName { name: String, candidates: Vec<RegionId> },

    /// The region name is absent from the adcode table.
    #[error("region name '{0}' not found in adcode table")]
    UnknownRegionName(String),

    /// A CRS definition could not be built or a coordinate failed to transform.
    #[error("projection error: {0}")]
    Projection(String),

    /// The raster is malformed or uses an unsupported layout.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
