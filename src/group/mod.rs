//! Fan-out groups and the single-flight cache.
//!
//! ## Contents
//! - [`Group`] submits tasks and collects results by submission index
//! - [`GroupResult`] snapshot of collected results plus wait flags
//! - [`CacheGroup`] per-key single-flight execution cache

mod cache;
#[allow(clippy::module_inception)]
mod group;
mod result;

pub use cache::CacheGroup;
pub use group::Group;
pub use result::GroupResult;
