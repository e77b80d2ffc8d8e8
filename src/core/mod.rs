//! Core post-classification processing modules

pub mod raster_ops;
pub mod gap_fill;
pub mod frequency_filter;
pub mod spatial_filter;
pub mod pipeline;

// Re-export main types
pub use raster_ops::Connectivity;
pub use gap_fill::{FillOrder, GapFillParams, GapFillProcessor};
pub use frequency_filter::{FrequencyFilter, FrequencyFilterParams, StableClassRule};
pub use spatial_filter::{SpatialFilter, SpatialFilterParams};
pub use pipeline::{
    PipelineConfig, PostProcessingPipeline, StageConfig, DEFAULT_NAME_PATTERN,
};
