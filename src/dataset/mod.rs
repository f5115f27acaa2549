//! Dataset objects and the loader pipeline that builds them.

mod info;
pub mod loader;

use std::{fmt, path::PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    io::{FileManager, IndexingError, LazyStripedArray, Selection, StripeError},
    wcs::{Wcs, WcsError},
};

pub use loader::{load_dataset, load_datasets};

/// Errors raised while resolving paths and metadata trees into datasets.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("{0} does not exist")]
    MissingPath(PathBuf),

    #[error("no dataset metadata files found in directory {0}")]
    NoMetadataFiles(PathBuf),

    #[error("{path}: {reason}")]
    MalformedTree { path: PathBuf, reason: String },

    #[error("found {0} datasets where exactly one was expected")]
    MultipleDatasets(usize),

    #[error("a tiled dataset needs at least one tile")]
    EmptyTiles,

    #[error("tiled dataset rows have differing lengths")]
    RaggedTiles,

    #[error(transparent)]
    Stripe(#[from] StripeError),

    #[error(transparent)]
    Wcs(#[from] WcsError),

    #[error("failed to parse metadata tree: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One calibrated Level-1 dataset: a file manager over its frame files plus
/// the read-only WCS, inventory record and history carried from the metadata
/// tree.
#[derive(Debug, Clone)]
pub struct Dataset {
    files: FileManager,
    wcs: Wcs,
    inventory: Map<String, Value>,
    history: Value,
}

impl Dataset {
    pub fn new(
        files: FileManager,
        wcs: Wcs,
        inventory: Map<String, Value>,
        history: Value,
    ) -> Dataset {
        Dataset {
            files,
            wcs,
            inventory,
            history,
        }
    }

    /// The facade managing this dataset's frame files.
    pub fn files(&self) -> &FileManager {
        &self.files
    }

    pub fn wcs(&self) -> &Wcs {
        &self.wcs
    }

    pub fn inventory(&self) -> &Map<String, Value> {
        &self.inventory
    }

    /// The history/extension record of the metadata file, carried opaquely.
    pub fn history(&self) -> &Value {
        &self.history
    }

    /// The lazy array holding this dataset's numeric data.
    pub fn data(&self) -> LazyStripedArray {
        self.files.generate_array()
    }

    /// Slice the dataset over its stripe axes.
    ///
    /// Unlike slicing [`Dataset::files`] directly, the derived dataset's file
    /// manager receives a *copy* of the current base path value in an
    /// independent cell: later base path changes on either side do not
    /// propagate to the other. Frame axes are sliced on the materialised
    /// array instead.
    pub fn index(&self, key: impl Into<Selection>) -> Result<Dataset, IndexingError> {
        Ok(Dataset {
            files: self.files.detach(key)?,
            wcs: self.wcs.clone(),
            inventory: self.inventory.clone(),
            history: self.history.clone(),
        })
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", info::dataset_info_str(self, None))
    }
}

/// A rectangular mosaic of datasets observed as one logical pointing.
#[derive(Debug, Clone)]
pub struct TiledDataset {
    tiles: Vec<Vec<Dataset>>,
    inventory: Map<String, Value>,
}

impl TiledDataset {
    pub fn new(
        tiles: Vec<Vec<Dataset>>,
        inventory: Map<String, Value>,
    ) -> Result<TiledDataset, DatasetError> {
        let Some(first) = tiles.first() else {
            return Err(DatasetError::EmptyTiles);
        };
        if first.is_empty() {
            return Err(DatasetError::EmptyTiles);
        }
        if tiles.iter().any(|row| row.len() != first.len()) {
            return Err(DatasetError::RaggedTiles);
        }
        Ok(TiledDataset { tiles, inventory })
    }

    /// (rows, columns) of the tile grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.tiles.len(), self.tiles[0].len())
    }

    pub fn tile(&self, row: usize, column: usize) -> Option<&Dataset> {
        self.tiles.get(row).and_then(|r| r.get(column))
    }

    /// All tiles in row-major order.
    pub fn flat(&self) -> impl Iterator<Item = &Dataset> {
        self.tiles.iter().flatten()
    }

    pub fn inventory(&self) -> &Map<String, Value> {
        &self.inventory
    }
}

impl fmt::Display for TiledDataset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            info::dataset_info_str(&self.tiles[0][0], Some(self.shape()))
        )
    }
}

/// What a metadata file resolves to: a single dataset or a tiled mosaic.
#[derive(Debug, Clone)]
pub enum LoadedDataset {
    Single(Dataset),
    Tiled(TiledDataset),
}

impl LoadedDataset {
    pub fn as_single(&self) -> Option<&Dataset> {
        match self {
            LoadedDataset::Single(ds) => Some(ds),
            LoadedDataset::Tiled(_) => None,
        }
    }

    pub fn as_tiled(&self) -> Option<&TiledDataset> {
        match self {
            LoadedDataset::Single(_) => None,
            LoadedDataset::Tiled(td) => Some(td),
        }
    }

    /// Every contained dataset, one for a single, all tiles for a mosaic.
    pub fn datasets(&self) -> Box<dyn Iterator<Item = &Dataset> + '_> {
        match self {
            LoadedDataset::Single(ds) => Box::new(std::iter::once(ds)),
            LoadedDataset::Tiled(td) => Box::new(td.flat()),
        }
    }
}
