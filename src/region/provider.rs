use std::path::{Path, PathBuf};

use ahash::AHashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::geom::Boundary;
use crate::region::{RegionId, parse_boundary};

/// Source of GeoJSON boundary collections keyed by adcode.
pub trait BoundaryProvider: Send + Sync {
    /// Fetch the FeatureCollection for `region`. With `include_children` the
    /// collection holds the region's first-level subdivisions instead.
    fn fetch(&self, region: RegionId, include_children: bool) -> Result<Value>;
}

/// Fetch and parse the boundary of `region` (without subdivisions).
pub fn fetch_boundary(provider: &dyn BoundaryProvider, region: RegionId) -> Result<Boundary> {
    let collection = provider.fetch(region, false)?;
    parse_boundary(&collection)
        .map_err(|e| Error::BoundaryResolution { region, reason: format!("{e:#}") })
}

/// First-level subdivisions of `parent` as `(adcode, name)` pairs, in collection order.
/// Features without a numeric adcode (e.g. DataV's `100000_JD` outline) are skipped.
pub fn child_regions(provider: &dyn BoundaryProvider, parent: RegionId) -> Result<Vec<(RegionId, String)>> {
    let collection = provider.fetch(parent, true)?;
    let features = collection["features"].as_array()
        .ok_or_else(|| Error::BoundaryResolution { region: parent, reason: "no features array in collection".into() })?;

    let children = features.iter()
        .filter_map(|feature| {
            let props = &feature["properties"];
            let code = props["adcode"].as_u64()
                .or_else(|| props["adcode"].as_str().and_then(|s| s.trim().parse().ok()))?;
            let id = RegionId(u32::try_from(code).ok()?);
            let name = props["name"].as_str()?.to_string();
            (id != parent).then_some((id, name))
        })
        .collect::<Vec<_>>();

    debug!(target: "region::provider", "region {parent} has {} subdivisions", children.len());
    Ok(children)
}

/// `{adcode}.json`, or `{adcode}_full.json` with subdivisions.
#[inline]
fn collection_name(region: RegionId, include_children: bool) -> String {
    format!("{region}{}.json", if include_children { "_full" } else { "" })
}

/// Boundary collections previously saved to a directory, named as on DataV.
#[derive(Debug, Clone)]
pub struct FileBoundaryProvider {
    dir: PathBuf,
}

impl FileBoundaryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[inline] pub fn dir(&self) -> &Path { &self.dir }

    pub fn path_for(&self, region: RegionId, include_children: bool) -> PathBuf {
        self.dir.join(collection_name(region, include_children))
    }
}

impl BoundaryProvider for FileBoundaryProvider {
    fn fetch(&self, region: RegionId, include_children: bool) -> Result<Value> {
        let path = self.path_for(region, include_children);
        let bytes = std::fs::read(&path)
            .map_err(|e| Error::BoundaryResolution { region, reason: format!("{}: {e}", path.display()) })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::BoundaryResolution { region, reason: format!("{}: {e}", path.display()) })
    }
}

/// Boundary collections held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBoundaryProvider {
    collections: AHashMap<(RegionId, bool), Value>,
}

impl MemoryBoundaryProvider {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, region: RegionId, include_children: bool, collection: Value) -> Self {
        self.insert(region, include_children, collection);
        self
    }

    pub fn insert(&mut self, region: RegionId, include_children: bool, collection: Value) {
        self.collections.insert((region, include_children), collection);
    }
}

impl BoundaryProvider for MemoryBoundaryProvider {
    fn fetch(&self, region: RegionId, include_children: bool) -> Result<Value> {
        self.collections.get(&(region, include_children)).cloned()
            .ok_or_else(|| Error::BoundaryResolution { region, reason: "no boundary collection registered".into() })
    }
}

#[cfg(feature = "download")]
pub use datav::{DATAV_URL_TEMPLATE, DataVBoundaryProvider};

#[cfg(feature = "download")]
mod datav {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use serde_json::Value;
    use tracing::debug;

    use super::BoundaryProvider;
    use crate::error::{Error, Result};
    use crate::region::RegionId;

    /// Aliyun DataV boundary service; `{suffix}` is `_full` when subdivisions are requested.
    pub const DATAV_URL_TEMPLATE: &str = "https://geo.datav.aliyun.com/areas_v3/bound/{adcode}{suffix}.json";

    /// Boundaries fetched over HTTP from a DataV-compatible service.
    #[derive(Debug, Clone)]
    pub struct DataVBoundaryProvider {
        client: Client,
        url_template: String,
    }

    impl DataVBoundaryProvider {
        pub fn new(timeout: Duration) -> Result<Self> {
            let client = Client::builder()
                .user_agent(concat!("popgrid/", env!("CARGO_PKG_VERSION")))
                .timeout(timeout)
                .build()
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            Ok(Self { client, url_template: DATAV_URL_TEMPLATE.to_string() })
        }

        pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
            self.url_template = template.into();
            self
        }

        pub fn url_for(&self, region: RegionId, include_children: bool) -> String {
            self.url_template
                .replace("{adcode}", &region.to_string())
                .replace("{suffix}", if include_children { "_full" } else { "" })
        }
    }

    impl BoundaryProvider for DataVBoundaryProvider {
        fn fetch(&self, region: RegionId, include_children: bool) -> Result<Value> {
            let url = self.url_for(region, include_children);
            debug!(target: "region::provider", "GET {url}");

            let text = self.client.get(&url).send()
                .and_then(|resp| resp.error_for_status())
                .and_then(|resp| resp.text())
                .map_err(|e| Error::BoundaryResolution { region, reason: format!("GET {url}: {e}") })?;

            serde_json::from_str(&text)
                .map_err(|e| Error::BoundaryResolution { region, reason: format!("GET {url}: invalid JSON: {e}") })
        }
    }

}
