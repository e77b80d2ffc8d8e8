use chrono::{DateTime, Utc};
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Discrete land-cover class code stored in a band
pub type ClassValue = u8;

/// 2D grid of class codes for a single year (row x col)
pub type ClassBand = Array2<ClassValue>;

/// 3D stack of class codes for the full series (year x row x col)
pub type ClassCube = Array3<ClassValue>;

/// Default no-data sentinel for classification stacks
pub const DEFAULT_NO_DATA: ClassValue = 0;

/// Coordinate system enumeration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Geographic coordinates (latitude, longitude)
    Geographic,
    /// Projected coordinates (e.g., UTM)
    Projected { epsg: u32 },
}

/// Geospatial transformation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

/// Grid geometry shared by every band of a stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub rows: usize,
    pub cols: usize,
    pub coordinate_system: CoordinateSystem,
    pub geo_transform: Option<GeoTransform>,
}

impl GridGeometry {
    /// Create a grid geometry with no georeferencing attached
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            coordinate_system: CoordinateSystem::Geographic,
            geo_transform: None,
        }
    }

    /// Total number of pixels per band
    pub fn num_pixels(&self) -> usize {
        self.rows * self.cols
    }
}

/// Post-classification processing step identifiers
///
/// Serialized values match the `step` property written by the export jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStep {
    #[serde(rename = "gapfill")]
    GapFill,
    #[serde(rename = "frequency_filter")]
    FrequencyFilter,
    #[serde(rename = "spatial_filter")]
    SpatialFilter,
}

impl std::fmt::Display for ProcessingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStep::GapFill => write!(f, "gapfill"),
            ProcessingStep::FrequencyFilter => write!(f, "frequency_filter"),
            ProcessingStep::SpatialFilter => write!(f, "spatial_filter"),
        }
    }
}

/// Provenance metadata attached to an exported stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackMetadata {
    /// Territory the stack covers (e.g., "SURINAME")
    pub territory: String,
    /// Region identifier within the territory
    pub region_id: String,
    /// Semantic version string of the output
    pub version: String,
    /// Collection identifier of the mapping effort
    pub collection_id: f64,
    /// Processing step that produced the stack
    pub step: ProcessingStep,
    /// Time the output was produced
    pub processed_at: DateTime<Utc>,
}

/// Multi-year stack of classified bands sharing one grid geometry
///
/// Bands are indexed by year in chronological order. Band order is
/// significant: reversing it changes the temporal fill direction.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterStack {
    years: Vec<i32>,
    geometry: GridGeometry,
    no_data: ClassValue,
    data: ClassCube,
    metadata: Option<StackMetadata>,
}

impl RasterStack {
    /// Create a stack from a prebuilt cube (year x row x col)
    pub fn new(
        years: Vec<i32>,
        geometry: GridGeometry,
        no_data: ClassValue,
        data: ClassCube,
    ) -> StackResult<Self> {
        if years.is_empty() {
            return Err(StackError::ShapeMismatch(
                "Stack must declare at least one year".to_string(),
            ));
        }
        if !years.windows(2).all(|w| w[0] < w[1]) {
            return Err(StackError::ShapeMismatch(format!(
                "Year labels must be strictly increasing, got {:?}",
                years
            )));
        }
        let expected = (years.len(), geometry.rows, geometry.cols);
        if data.dim() != expected {
            return Err(StackError::ShapeMismatch(format!(
                "Cube shape {:?} does not match declared {} years on a {}x{} grid",
                data.dim(),
                years.len(),
                geometry.rows,
                geometry.cols
            )));
        }
        Ok(Self {
            years,
            geometry,
            no_data,
            data,
            metadata: None,
        })
    }

    /// Create a stack from one band per year
    pub fn from_bands(
        years: Vec<i32>,
        geometry: GridGeometry,
        no_data: ClassValue,
        bands: Vec<ClassBand>,
    ) -> StackResult<Self> {
        if bands.len() != years.len() {
            return Err(StackError::ShapeMismatch(format!(
                "{} bands supplied for {} declared years",
                bands.len(),
                years.len()
            )));
        }
        let mut data = ClassCube::from_elem((years.len(), geometry.rows, geometry.cols), no_data);
        for (idx, band) in bands.iter().enumerate() {
            if band.dim() != (geometry.rows, geometry.cols) {
                return Err(StackError::ShapeMismatch(format!(
                    "Band {} has shape {:?}, expected {}x{}",
                    idx,
                    band.dim(),
                    geometry.rows,
                    geometry.cols
                )));
            }
            data.slice_mut(s![idx, .., ..]).assign(band);
        }
        Self::new(years, geometry, no_data, data)
    }

    /// Create an all-no-data stack
    pub fn filled_no_data(years: Vec<i32>, geometry: GridGeometry, no_data: ClassValue) -> StackResult<Self> {
        let data = ClassCube::from_elem((years.len(), geometry.rows, geometry.cols), no_data);
        Self::new(years, geometry, no_data, data)
    }

    /// Build a new stack sharing this stack's years, geometry and sentinel
    ///
    /// Metadata is not carried over: provenance identity belongs to exactly
    /// one processing output.
    pub fn like_with_data(&self, data: ClassCube) -> StackResult<Self> {
        Self::new(self.years.clone(), self.geometry.clone(), self.no_data, data)
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn no_data(&self) -> ClassValue {
        self.no_data
    }

    pub fn num_years(&self) -> usize {
        self.years.len()
    }

    /// Full data cube (year x row x col)
    pub fn data(&self) -> &ClassCube {
        &self.data
    }

    /// Index of a year label within the stack
    pub fn year_index(&self, year: i32) -> Option<usize> {
        self.years.iter().position(|&y| y == year)
    }

    /// Band view by position
    pub fn band(&self, index: usize) -> ArrayView2<'_, ClassValue> {
        self.data.slice(s![index, .., ..])
    }

    /// Band view by year label
    pub fn band_for_year(&self, year: i32) -> Option<ArrayView2<'_, ClassValue>> {
        self.year_index(year).map(|idx| self.band(idx))
    }

    /// One pixel's time series in chronological order
    pub fn series(&self, row: usize, col: usize) -> ArrayView1<'_, ClassValue> {
        self.data.slice(s![.., row, col])
    }

    pub fn metadata(&self) -> Option<&StackMetadata> {
        self.metadata.as_ref()
    }

    /// Attach provenance metadata
    ///
    /// Metadata identity is immutable once set for a given output; attaching
    /// twice is an error.
    pub fn with_metadata(mut self, metadata: StackMetadata) -> StackResult<Self> {
        if let Some(existing) = &self.metadata {
            return Err(StackError::Metadata(format!(
                "Stack already tagged as step '{}' version '{}'",
                existing.step, existing.version
            )));
        }
        self.metadata = Some(metadata);
        Ok(self)
    }

    /// Restore metadata read back from storage
    pub(crate) fn with_metadata_opt(mut self, metadata: Option<StackMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Fraction of pixel-years holding a valid class value
    pub fn valid_fraction(&self) -> f64 {
        let total = self.data.len();
        if total == 0 {
            return 0.0;
        }
        let valid = self.data.iter().filter(|&&v| v != self.no_data).count();
        valid as f64 / total as f64
    }
}

/// Error types for stack processing
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Missing reference band: {0}")]
    MissingReference(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for stack operations
pub type StackResult<T> = Result<T, StackError>;
