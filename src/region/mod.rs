//! Administrative regions: adcode identifiers, name lookup, and boundary providers.

mod adcode;
mod geojson;
mod provider;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use adcode::{AdcodeTable, Lookup, MUNICIPALITIES, Resolution, disambiguate, parent_prefix, prefix_len};
pub use geojson::{parse_boundary, read_geojson_file};
pub use provider::{
    BoundaryProvider, FileBoundaryProvider, MemoryBoundaryProvider, child_regions, fetch_boundary,
};
#[cfg(feature = "download")]
pub use provider::{DATAV_URL_TEMPLATE, DataVBoundaryProvider};

/// Six-digit administrative division code (e.g. `110105` for 朝阳区, Beijing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

impl RegionId {
    #[inline] pub fn code(&self) -> u32 { self.0 }

    /// Leading `len` digits of the decimal code.
    pub fn prefix(&self, len: usize) -> String {
        self.0.to_string().chars().take(len).collect()
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RegionId {
    fn from(code: u32) -> Self { Self(code) }
}

impl std::str::FromStr for RegionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
