//! Deferred materialisation of striped arrays.
//!
//! A [`LazyStripedArray`] records *which* frames to read and *where from*
//! (the shared base path cell), never the pixel values themselves. Each
//! stripe cell maps to exactly one chunk of the frame shape, and every chunk
//! resolves `basepath / uri` at the moment it is read.

use log::debug;
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{
    fits,
    fits::LoadError,
    striped::{read_cell, BasePathCell, FrameReference, IndexingError, Selection, StripeSelection},
    StripedExternalArray,
};

/// A lazily-evaluated handle over the frames selected from a striped array.
///
/// Nothing is read until [`compute`](LazyStripedArray::compute) is called,
/// and the handle caches nothing: every compute resolves the base path cell
/// afresh. Setting the base path between two computes therefore changes what
/// the second one reads, while arrays already returned by earlier computes
/// are never retroactively modified. Slicing the handle narrows the selection
/// without copying any chunk state, so a slice observes base path changes
/// exactly like the handle it came from.
#[derive(Debug, Clone)]
pub struct LazyStripedArray {
    source: Arc<StripedExternalArray>,
    selection: StripeSelection,
    basepath: BasePathCell,
}

impl LazyStripedArray {
    pub(crate) fn new(
        source: Arc<StripedExternalArray>,
        selection: StripeSelection,
        basepath: BasePathCell,
    ) -> LazyStripedArray {
        LazyStripedArray {
            source,
            selection,
            basepath,
        }
    }

    /// Shape of the selected stripe, frame axes excluded.
    pub fn stripe_shape(&self) -> Vec<usize> {
        self.selection.shape()
    }

    pub fn frame_shape(&self) -> &[usize] {
        self.source.frame_shape()
    }

    /// The full logical shape: stripe axes outermost, frame axes innermost.
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = self.selection.shape();
        shape.extend_from_slice(self.source.frame_shape());
        shape
    }

    /// Number of frames a compute would read.
    pub fn num_frames(&self) -> usize {
        self.selection.shape().iter().product()
    }

    /// Base path the next compute would resolve URIs against.
    pub fn basepath(&self) -> Option<PathBuf> {
        read_cell(&self.basepath)
    }

    /// Narrow the handle over the stripe axes. Frame axes are sliced on the
    /// materialised array instead.
    pub fn slice(&self, key: impl Into<Selection>) -> Result<LazyStripedArray, IndexingError> {
        let selection = self.selection.compose(&key.into())?;
        Ok(LazyStripedArray {
            source: Arc::clone(&self.source),
            selection,
            basepath: Arc::clone(&self.basepath),
        })
    }

    /// Read every selected frame (in parallel) and assemble the logical
    /// array.
    ///
    /// With no base path set, chunks come back filled with NaN instead of
    /// failing, so shape and metadata work can proceed without file access.
    /// With a base path set, a missing or unreadable file is an error for
    /// that chunk; sibling chunks still compute, and the first failure is
    /// returned.
    pub fn compute(&self) -> Result<ArrayD<f64>, LoadError> {
        let basepath = read_cell(&self.basepath);
        let frame_len: usize = self.source.frame_shape().iter().product();
        let references: Vec<&FrameReference> = self
            .source
            .reference_grid()
            .slice(self.selection.slice_elems().as_slice())
            .into_iter()
            .collect();

        let chunks: Vec<Vec<f64>> = references
            .par_iter()
            .map(|reference| self.load_frame(basepath.as_deref(), reference, frame_len))
            .collect::<Result<_, LoadError>>()?;

        let mut flat = Vec::with_capacity(chunks.len() * frame_len);
        for chunk in chunks {
            flat.extend(chunk);
        }
        let shape = self.shape();
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), flat)
            .expect("chunk count and frame length always match the output shape"))
    }

    fn load_frame(
        &self,
        basepath: Option<&Path>,
        reference: &FrameReference,
        frame_len: usize,
    ) -> Result<Vec<f64>, LoadError> {
        let Some(base) = basepath else {
            debug!("No base path set; filling {} with NaN", reference.uri);
            return Ok(vec![f64::NAN; frame_len]);
        };

        let path = base.join(&reference.uri);
        let target = self.source.target();
        let mut fits_fptr = fits::open(&path)?;
        let hdu = fits::open_hdu(&mut fits_fptr, target)?;
        let found = fits::image_dimensions(&hdu, &reference.uri, target)?;
        if found != reference.frame_shape {
            return Err(LoadError::FrameShapeMismatch {
                uri: reference.uri.clone(),
                expected: reference.frame_shape.clone(),
                found,
            });
        }

        let mut buffer = vec![0.0; frame_len];
        fits::read_image_into_buffer(&mut fits_fptr, &path, &mut buffer)?;
        Ok(buffer)
    }
}
