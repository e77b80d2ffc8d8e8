//! TerraStack: A Fast, Modular Land-Cover Time-Series Post-Processor
//!
//! This library stabilizes stacks of per-year classified land-cover rasters:
//! temporal gap filling along each pixel's series, frequency-based
//! stabilization of persistently mapped classes, and spatial denoising of
//! isolated or edge-transition pixels, sequenced by a pipeline that
//! validates configuration up front and exports provenance-tagged results
//! through a storage abstraction.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    ClassBand, ClassCube, ClassValue, CoordinateSystem, GeoTransform, GridGeometry,
    ProcessingStep, RasterStack, StackError, StackMetadata, StackResult, DEFAULT_NO_DATA,
};

pub use io::{AssetStore, FileAssetStore, MemoryAssetStore};

pub use core::{
    Connectivity, FillOrder, FrequencyFilter, FrequencyFilterParams, GapFillParams,
    GapFillProcessor, PipelineConfig, PostProcessingPipeline, SpatialFilter, SpatialFilterParams,
    StableClassRule, StageConfig, DEFAULT_NAME_PATTERN,
};
