//! Resource binding cache: maps CPU sources to the GPU assets built from
//! them.
//!
//! [`BindingCache::bind`] materializes an asset the first time a source is
//! asked for and hands out the same shared asset afterwards.
//! [`BindingCache::refresh`] re-uploads only what changed since the last
//! upload, so any number of edits between frames cost one transfer.
//!
//! # Invariants
//! - One entry per (source id, asset kind), kept for the source's lifetime.
//! - A refresh of an unchanged source issues no driver calls.
//! - Entries are removed only by `evict` or `purge_stale`.

mod bindable;
mod cache;

pub use bindable::{Bindable, BoundAsset};
pub use cache::{BindingCache, CacheConfig, CacheStats};

pub fn crate_info() -> &'static str {
    "tessera-binding v0.1.0"
}
