pub(super) mod area;
pub(super) mod proj;
