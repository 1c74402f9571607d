//! Shared data types
//!
//! `Asset` is the full record harvested from the listing; `IndexedAsset` is
//! the lean projection the search index is built from.

mod asset;

pub use asset::{Asset, IndexedAsset};
