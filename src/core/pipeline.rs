use crate::core::frequency_filter::{FrequencyFilter, FrequencyFilterParams};
use crate::core::gap_fill::{GapFillParams, GapFillProcessor};
use crate::core::spatial_filter::{SpatialFilter, SpatialFilterParams};
use crate::io::AssetStore;
use crate::types::{ProcessingStep, RasterStack, StackError, StackMetadata, StackResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Placeholder pattern for asset names, matching the export naming
/// convention of the classification jobs
pub const DEFAULT_NAME_PATTERN: &str = "{territory}_{region_id}_{version}";

/// Configuration of one pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageConfig {
    GapFill(GapFillParams),
    FrequencyFilter(FrequencyFilterParams),
    SpatialFilter(SpatialFilterParams),
}

impl StageConfig {
    /// Step marker written into the output's provenance
    pub fn step(&self) -> ProcessingStep {
        match self {
            StageConfig::GapFill(_) => ProcessingStep::GapFill,
            StageConfig::FrequencyFilter(_) => ProcessingStep::FrequencyFilter,
            StageConfig::SpatialFilter(_) => ProcessingStep::SpatialFilter,
        }
    }

    fn validate(&self) -> StackResult<()> {
        match self {
            StageConfig::GapFill(_) => Ok(()),
            StageConfig::FrequencyFilter(params) => params.validate(),
            StageConfig::SpatialFilter(params) => params.validate(),
        }
    }
}

/// Post-processing pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Territory the run covers (e.g., "SURINAME")
    pub territory: String,
    /// Region identifier within the territory
    pub region_id: String,
    /// Collection identifier of the mapping effort
    pub collection_id: f64,
    /// Version of the input asset to read
    pub input_version: String,
    /// Version written into the output asset name and provenance
    pub output_version: String,
    /// Year labels the input stack must declare, in chronological order
    pub years: Vec<i32>,
    /// Asset name pattern with `{territory}`, `{region_id}` and
    /// `{version}` placeholders
    pub name_pattern: String,
    /// Stages to run, in order
    pub stages: Vec<StageConfig>,
}

/// Orchestrates the post-classification stages over a configured territory
///
/// All validation happens at construction; pixel processing only starts
/// from a fully checked configuration. Stage failures propagate unchanged,
/// with no retries and no partial exports.
pub struct PostProcessingPipeline {
    config: PipelineConfig,
}

impl PostProcessingPipeline {
    /// Create a pipeline, validating the full configuration
    pub fn new(config: PipelineConfig) -> StackResult<Self> {
        if config.years.is_empty() {
            return Err(StackError::Configuration(
                "Year list must not be empty".to_string(),
            ));
        }
        if !config.years.windows(2).all(|w| w[0] < w[1]) {
            return Err(StackError::Configuration(format!(
                "Year list must be strictly increasing, got {:?}",
                config.years
            )));
        }
        if config.stages.is_empty() {
            return Err(StackError::Configuration(
                "Pipeline must configure at least one stage".to_string(),
            ));
        }
        for stage in &config.stages {
            stage.validate()?;
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Resolve the asset name pattern for a given version
    pub fn asset_name(&self, version: &str) -> String {
        self.config
            .name_pattern
            .replace("{territory}", &self.config.territory)
            .replace("{region_id}", &self.config.region_id)
            .replace("{version}", version)
    }

    /// Run all configured stages: read the input asset, process, attach
    /// provenance and export the result
    pub fn run(&self, store: &mut dyn AssetStore) -> StackResult<RasterStack> {
        let input_name = self.asset_name(&self.config.input_version);
        log::info!(
            "Starting post-processing for {} region {} from asset '{}'",
            self.config.territory,
            self.config.region_id,
            input_name
        );

        let stack = store.read_stack(&input_name)?;
        self.validate_stack(&stack)?;
        log::debug!(
            "Input stack: {} years, {:.1}% valid pixel-years",
            stack.num_years(),
            100.0 * stack.valid_fraction()
        );

        let mut current = stack;
        let mut last_step = None;
        for (index, stage) in self.config.stages.iter().enumerate() {
            let step = stage.step();
            log::info!(
                "Running stage '{}' ({}/{})",
                step,
                index + 1,
                self.config.stages.len()
            );
            current = self.run_stage(stage, &current)?;
            last_step = Some(step);
        }

        let step = last_step.ok_or_else(|| {
            StackError::Configuration("Pipeline must configure at least one stage".to_string())
        })?;
        let tagged = current.with_metadata(self.metadata_for(step, &self.config.output_version))?;

        let output_name = self.asset_name(&self.config.output_version);
        store.write_stack(&output_name, &tagged)?;
        log::info!("Exported '{}' tagged as step '{}'", output_name, step);
        Ok(tagged)
    }

    /// Run a single configured stage as an independent job against a
    /// previously exported intermediate asset
    pub fn run_job(
        &self,
        store: &mut dyn AssetStore,
        stage_index: usize,
        input_version: &str,
        output_version: &str,
    ) -> StackResult<RasterStack> {
        let stage = self.config.stages.get(stage_index).ok_or_else(|| {
            StackError::Configuration(format!(
                "No stage at index {} ({} configured)",
                stage_index,
                self.config.stages.len()
            ))
        })?;

        let input_name = self.asset_name(input_version);
        log::info!(
            "Running stage '{}' as a job: '{}' -> version '{}'",
            stage.step(),
            input_name,
            output_version
        );

        let stack = store.read_stack(&input_name)?;
        self.validate_stack(&stack)?;

        let processed = self.run_stage(stage, &stack)?;
        let tagged = processed.with_metadata(self.metadata_for(stage.step(), output_version))?;

        let output_name = self.asset_name(output_version);
        store.write_stack(&output_name, &tagged)?;
        log::info!("Exported '{}' tagged as step '{}'", output_name, stage.step());
        Ok(tagged)
    }

    /// Apply one stage to an in-memory stack without tagging or export
    pub fn run_stage(&self, stage: &StageConfig, stack: &RasterStack) -> StackResult<RasterStack> {
        match stage {
            StageConfig::GapFill(params) => GapFillProcessor::new(params.clone()).apply(stack),
            StageConfig::FrequencyFilter(params) => {
                FrequencyFilter::new(params.clone())?.apply(stack)
            }
            StageConfig::SpatialFilter(params) => SpatialFilter::new(params.clone())?.apply(stack),
        }
    }

    /// Check the stack's declared year range against the configuration
    fn validate_stack(&self, stack: &RasterStack) -> StackResult<()> {
        if stack.years() != self.config.years.as_slice() {
            return Err(StackError::ShapeMismatch(format!(
                "Stack years {:?} do not match configured years {:?}",
                stack.years(),
                self.config.years
            )));
        }
        Ok(())
    }

    fn metadata_for(&self, step: ProcessingStep, version: &str) -> StackMetadata {
        StackMetadata {
            territory: self.config.territory.clone(),
            region_id: self.config.region_id.clone(),
            version: version.to_string(),
            collection_id: self.config.collection_id,
            step,
            processed_at: Utc::now(),
        }
    }
}
