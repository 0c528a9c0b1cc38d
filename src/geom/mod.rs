mod algorithm;
mod boundary;
mod edges;

pub use algorithm::area::{area_km2, area_km2_in};
pub use algorithm::proj::{Reprojector, WGS84, proj4_for_epsg, utm_proj4, utm_proj4_for, utm_zone};
pub use boundary::Boundary;
pub(crate) use edges::{EdgeIndex, inside_by_parity};
