//! Load DKIST Level-1 solar datasets and lazily materialise their striped
//! FITS frame arrays.
//!
//! A Level-1 dataset is delivered as one metadata file plus thousands of
//! single-frame FITS files. [`load_dataset`] parses the metadata into a
//! [`Dataset`] whose [`FileManager`] presents all frames as one logical
//! N-dimensional array; nothing is read from disk until a
//! [`LazyStripedArray`] handle is computed.

pub mod dataset;
pub mod io;
pub mod net;
pub mod wcs;

pub use dataset::{load_dataset, load_datasets, Dataset, DatasetError, LoadedDataset, TiledDataset};
pub use io::{
    FileManager, FrameReference, IndexingError, LazyStripedArray, LoadError, Sel, Selection,
    StripeError, StripedExternalArray, StripedExternalArrayView,
};
pub use wcs::Wcs;
