//! File references, the striped external array and its lazy materialisation.

mod fits;
pub mod lazy;
pub mod striped;

pub use fits::LoadError;
pub use lazy::LazyStripedArray;
pub use striped::{
    BasePathCell, FileManager, FrameReference, IndexingError, Sel, Selection, StripeError,
    StripedExternalArray, StripedExternalArrayView, StripedSource,
};
