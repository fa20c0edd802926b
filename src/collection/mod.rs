//! Collections keyed by several values at once, built on top of Composer and Hasher.

mod strong_map;
mod weak_map;

pub use strong_map::StrongCompositeMap;
pub use weak_map::WeakCompositeMap;
