use crate::types::{
    ClassCube, ClassValue, GridGeometry, RasterStack, StackError, StackMetadata, StackResult,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

/// Raster storage/retrieval collaborator
///
/// Stacks are addressed by asset identifier. Implementations carry the
/// stack's provenance metadata along with the pixel data.
pub trait AssetStore {
    /// Read a stack by identifier
    fn read_stack(&self, asset_id: &str) -> StackResult<RasterStack>;

    /// Write a stack under an identifier, overwriting any previous asset
    fn write_stack(&mut self, asset_id: &str, stack: &RasterStack) -> StackResult<()>;

    /// Whether an asset exists
    fn exists(&self, asset_id: &str) -> bool;
}

/// In-memory asset store for tests and single-process runs
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    assets: HashMap<String, RasterStack>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetStore for MemoryAssetStore {
    fn read_stack(&self, asset_id: &str) -> StackResult<RasterStack> {
        self.assets
            .get(asset_id)
            .cloned()
            .ok_or_else(|| StackError::AssetNotFound(asset_id.to_string()))
    }

    fn write_stack(&mut self, asset_id: &str, stack: &RasterStack) -> StackResult<()> {
        self.assets.insert(asset_id.to_string(), stack.clone());
        Ok(())
    }

    fn exists(&self, asset_id: &str) -> bool {
        self.assets.contains_key(asset_id)
    }
}

/// Serialized form of a stack: shape plus a flat band vector in
/// (year, row, col) order
#[derive(Debug, Serialize, Deserialize)]
struct StackRecord {
    years: Vec<i32>,
    geometry: GridGeometry,
    no_data: ClassValue,
    data: Vec<ClassValue>,
    metadata: Option<StackMetadata>,
}

impl StackRecord {
    fn from_stack(stack: &RasterStack) -> Self {
        Self {
            years: stack.years().to_vec(),
            geometry: stack.geometry().clone(),
            no_data: stack.no_data(),
            data: stack.data().iter().copied().collect(),
            metadata: stack.metadata().cloned(),
        }
    }

    fn into_stack(self) -> StackResult<RasterStack> {
        let shape = (self.years.len(), self.geometry.rows, self.geometry.cols);
        let cube = ClassCube::from_shape_vec(shape, self.data).map_err(|e| {
            StackError::ShapeMismatch(format!("Stored band vector does not fit {:?}: {}", shape, e))
        })?;
        let stack = RasterStack::new(self.years, self.geometry, self.no_data, cube)?;
        Ok(stack.with_metadata_opt(self.metadata))
    }
}

/// File-backed asset store: one JSON document per asset under a root
/// directory
///
/// Asset identifiers may contain `/` separators, which map to
/// subdirectories the way hosted asset paths do.
#[derive(Debug)]
pub struct FileAssetStore {
    root: PathBuf,
}

impl FileAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn asset_path(&self, asset_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", asset_id))
    }
}

impl AssetStore for FileAssetStore {
    fn read_stack(&self, asset_id: &str) -> StackResult<RasterStack> {
        let path = self.asset_path(asset_id);
        if !path.is_file() {
            return Err(StackError::AssetNotFound(asset_id.to_string()));
        }
        let reader = BufReader::new(File::open(path)?);
        let record: StackRecord = serde_json::from_reader(reader)?;
        record.into_stack()
    }

    fn write_stack(&mut self, asset_id: &str, stack: &RasterStack) -> StackResult<()> {
        let path = self.asset_path(asset_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(writer, &StackRecord::from_stack(stack))?;
        log::debug!("Wrote asset '{}' to {}", asset_id, path.display());
        Ok(())
    }

    fn exists(&self, asset_id: &str) -> bool {
        self.asset_path(asset_id).is_file()
    }
}
