//! Asset storage interfaces

pub mod asset_store;

pub use asset_store::{AssetStore, FileAssetStore, MemoryAssetStore};
