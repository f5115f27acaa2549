//! The striped external array: a logical N-dimensional array whose elements
//! live in many individual frame files.
//!
//! A [`StripedExternalArray`] owns a grid of [`FrameReference`]s (the
//! "stripe"); each grid cell names one file holding a fixed-shape frame. The
//! logical array has shape `stripe_shape ++ frame_shape` with the stripe axes
//! outermost. Indexing never copies the grid: it produces a
//! [`StripedExternalArrayView`] that composes subscripts against the root.
//! [`FileManager`] is the user-facing facade tying a striped array to a
//! mutable, shareable base path.

use std::{
    fmt,
    ops::{Range, RangeFrom, RangeFull, RangeTo},
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use ndarray::{ArrayD, ArrayViewD, SliceInfoElem};
use thiserror::Error;

use super::lazy::LazyStripedArray;

/// Errors raised when assembling a striped array from frame references.
#[derive(Debug, Error)]
pub enum StripeError {
    #[error("a striped array needs at least one frame reference")]
    Empty,

    #[error("frame {uri} has shape {found:?} but the stripe was built with {expected:?}")]
    NonUniformFrameShape {
        uri: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("frame {uri} declares shape {shape:?}; every axis length must be positive")]
    InvalidFrameShape { uri: String, shape: Vec<usize> },
}

/// Errors raised by indexing a striped array, a view or a file manager.
///
/// These are synchronous; a bad key fails at the indexing call, not later.
#[derive(Debug, Error)]
pub enum IndexingError {
    #[error("index {index} is out of range for axis {axis} with length {len}")]
    OutOfRange {
        axis: usize,
        index: usize,
        len: usize,
    },

    #[error("span {start}..{end} does not fit axis {axis} with length {len}")]
    SpanOutOfRange {
        axis: usize,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("span start {start} is greater than its end {end} on axis {axis}")]
    InvertedSpan {
        axis: usize,
        start: usize,
        end: usize,
    },

    #[error("key names {got} axes but only {available} stripe axes are available")]
    TooManyAxes { got: usize, available: usize },
}

/// A single-axis subscript over the stripe axes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sel {
    /// Pin the axis to one position, removing it from the result shape.
    At(usize),
    /// Keep a contiguous run of positions. A `None` end means to the end of
    /// the axis.
    Span { start: usize, end: Option<usize> },
    /// Keep the whole axis.
    All,
}

impl From<usize> for Sel {
    fn from(index: usize) -> Sel {
        Sel::At(index)
    }
}

impl From<Range<usize>> for Sel {
    fn from(r: Range<usize>) -> Sel {
        Sel::Span {
            start: r.start,
            end: Some(r.end),
        }
    }
}

impl From<RangeFrom<usize>> for Sel {
    fn from(r: RangeFrom<usize>) -> Sel {
        Sel::Span {
            start: r.start,
            end: None,
        }
    }
}

impl From<RangeTo<usize>> for Sel {
    fn from(r: RangeTo<usize>) -> Sel {
        Sel::Span {
            start: 0,
            end: Some(r.end),
        }
    }
}

impl From<RangeFull> for Sel {
    fn from(_: RangeFull) -> Sel {
        Sel::All
    }
}

/// A multi-axis subscript. Axes it does not name are kept whole.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection(Vec<Sel>);

impl Selection {
    pub fn new(sels: Vec<Sel>) -> Selection {
        Selection(sels)
    }

    fn sels(&self) -> &[Sel] {
        &self.0
    }
}

impl From<Sel> for Selection {
    fn from(sel: Sel) -> Selection {
        Selection(vec![sel])
    }
}

impl From<Vec<Sel>> for Selection {
    fn from(sels: Vec<Sel>) -> Selection {
        Selection(sels)
    }
}

impl From<usize> for Selection {
    fn from(index: usize) -> Selection {
        Selection(vec![index.into()])
    }
}

impl From<Range<usize>> for Selection {
    fn from(r: Range<usize>) -> Selection {
        Selection(vec![r.into()])
    }
}

impl From<RangeFrom<usize>> for Selection {
    fn from(r: RangeFrom<usize>) -> Selection {
        Selection(vec![r.into()])
    }
}

impl From<RangeTo<usize>> for Selection {
    fn from(r: RangeTo<usize>) -> Selection {
        Selection(vec![r.into()])
    }
}

impl From<RangeFull> for Selection {
    fn from(r: RangeFull) -> Selection {
        Selection(vec![r.into()])
    }
}

impl<A: Into<Sel>, B: Into<Sel>> From<(A, B)> for Selection {
    fn from((a, b): (A, B)) -> Selection {
        Selection(vec![a.into(), b.into()])
    }
}

impl<A: Into<Sel>, B: Into<Sel>, C: Into<Sel>> From<(A, B, C)> for Selection {
    fn from((a, b, c): (A, B, C)) -> Selection {
        Selection(vec![a.into(), b.into(), c.into()])
    }
}

/// What happened to one root stripe axis under a composed subscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisCut {
    /// The axis was pinned to a single position and removed.
    At(usize),
    /// The axis survives, restricted to `start..end`.
    Span { start: usize, end: usize },
}

/// A fully resolved subscript over every axis of the root stripe grid.
///
/// Chained views compose into one of these instead of materialising
/// intermediate grids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StripeSelection {
    cuts: Vec<AxisCut>,
}

impl StripeSelection {
    pub(crate) fn full(shape: &[usize]) -> StripeSelection {
        StripeSelection {
            cuts: shape
                .iter()
                .map(|&len| AxisCut::Span { start: 0, end: len })
                .collect(),
        }
    }

    /// Lengths of the surviving axes.
    pub(crate) fn shape(&self) -> Vec<usize> {
        self.cuts
            .iter()
            .filter_map(|cut| match cut {
                AxisCut::At(_) => None,
                AxisCut::Span { start, end } => Some(end - start),
            })
            .collect()
    }

    /// Apply `key` to the surviving axes, producing a new selection over the
    /// root axes. The key is validated against the current lengths before
    /// anything else happens.
    pub(crate) fn compose(&self, key: &Selection) -> Result<StripeSelection, IndexingError> {
        let sels = key.sels();
        let mut cuts = Vec::with_capacity(self.cuts.len());
        // The caller-visible axis number, i.e. the position within the
        // current (already restricted) shape.
        let mut axis = 0;
        for cut in &self.cuts {
            let (start, end) = match *cut {
                AxisCut::At(i) => {
                    cuts.push(AxisCut::At(i));
                    continue;
                }
                AxisCut::Span { start, end } => (start, end),
            };
            let len = end - start;
            let sel = sels.get(axis);
            axis += 1;
            match sel {
                None | Some(Sel::All) => cuts.push(AxisCut::Span { start, end }),
                Some(&Sel::At(index)) => {
                    if index >= len {
                        return Err(IndexingError::OutOfRange {
                            axis: axis - 1,
                            index,
                            len,
                        });
                    }
                    cuts.push(AxisCut::At(start + index));
                }
                Some(&Sel::Span {
                    start: sub_start,
                    end: sub_end,
                }) => {
                    let sub_end = sub_end.unwrap_or(len);
                    if sub_start > sub_end {
                        return Err(IndexingError::InvertedSpan {
                            axis: axis - 1,
                            start: sub_start,
                            end: sub_end,
                        });
                    }
                    if sub_end > len {
                        return Err(IndexingError::SpanOutOfRange {
                            axis: axis - 1,
                            start: sub_start,
                            end: sub_end,
                            len,
                        });
                    }
                    cuts.push(AxisCut::Span {
                        start: start + sub_start,
                        end: start + sub_end,
                    });
                }
            }
        }
        if sels.len() > axis {
            return Err(IndexingError::TooManyAxes {
                got: sels.len(),
                available: axis,
            });
        }
        Ok(StripeSelection { cuts })
    }

    /// Translate into `ndarray` slice elements for application to the root
    /// grid.
    pub(crate) fn slice_elems(&self) -> Vec<SliceInfoElem> {
        self.cuts
            .iter()
            .map(|cut| match *cut {
                AxisCut::At(i) => SliceInfoElem::Index(i as isize),
                AxisCut::Span { start, end } => SliceInfoElem::Slice {
                    start: start as isize,
                    end: Some(end as isize),
                    step: 1,
                },
            })
            .collect()
    }
}

/// Shared mutable holder for the directory used to resolve frame URIs.
///
/// Slicing a [`FileManager`] directly hands the same cell to the child, so a
/// set on either side is seen by both. Dataset-level slicing instead copies
/// the current value into a fresh cell, after which the two sides no longer
/// affect each other. Concurrent mutation while a compute is in flight is a
/// caller responsibility; no ordering is guaranteed and no locking beyond the
/// cell itself is performed.
pub type BasePathCell = Arc<RwLock<Option<PathBuf>>>;

pub(crate) fn new_cell(value: Option<PathBuf>) -> BasePathCell {
    Arc::new(RwLock::new(value))
}

pub(crate) fn read_cell(cell: &BasePathCell) -> Option<PathBuf> {
    cell.read().unwrap_or_else(PoisonError::into_inner).clone()
}

pub(crate) fn write_cell(cell: &BasePathCell, value: Option<PathBuf>) {
    *cell.write().unwrap_or_else(PoisonError::into_inner) = value;
}

/// One external frame file: a relative URI plus the shape of the array stored
/// in that file. Created when the dataset metadata tree is parsed; immutable
/// thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReference {
    /// File identifier, relative to the owning array's base path.
    pub uri: String,
    /// Shape of the array stored in this one file. Identical across every
    /// reference belonging to the same striped array.
    pub frame_shape: Vec<usize>,
}

impl FrameReference {
    pub fn new(uri: impl Into<String>, frame_shape: Vec<usize>) -> FrameReference {
        FrameReference {
            uri: uri.into(),
            frame_shape,
        }
    }
}

/// A grid of frame references presented as one logical lazily-loaded array.
#[derive(Debug)]
pub struct StripedExternalArray {
    /// The stripe grid. Never mutated after construction; indexing produces
    /// views that re-slice it through a composed selection.
    loader_array: ArrayD<FrameReference>,
    /// Duplicated from the references for fast access.
    frame_shape: Vec<usize>,
    /// HDU index holding the frame image in every referenced file.
    target: usize,
    /// Declared element type of the frames, carried for rendering. Frames
    /// always materialise as `f64`.
    dtype: String,
    basepath: BasePathCell,
}

impl StripedExternalArray {
    /// Build a striped array from a grid of references.
    ///
    /// Fails fast if the grid is empty, or if any reference disagrees on the
    /// frame shape.
    pub fn new(
        loader_array: ArrayD<FrameReference>,
        target: usize,
        dtype: impl Into<String>,
        basepath: Option<PathBuf>,
    ) -> Result<StripedExternalArray, StripeError> {
        let first = loader_array.iter().next().ok_or(StripeError::Empty)?;
        let frame_shape = first.frame_shape.clone();
        if frame_shape.is_empty() || frame_shape.contains(&0) {
            return Err(StripeError::InvalidFrameShape {
                uri: first.uri.clone(),
                shape: frame_shape,
            });
        }
        for reference in &loader_array {
            if reference.frame_shape != frame_shape {
                return Err(StripeError::NonUniformFrameShape {
                    uri: reference.uri.clone(),
                    expected: frame_shape,
                    found: reference.frame_shape.clone(),
                });
            }
        }
        Ok(StripedExternalArray {
            loader_array,
            frame_shape,
            target,
            dtype: dtype.into(),
            basepath: new_cell(basepath),
        })
    }

    /// Build from a grid of URIs and one shared frame shape, the form the
    /// dataset metadata tree stores.
    pub fn from_parts(
        fileuris: ArrayD<String>,
        target: usize,
        dtype: impl Into<String>,
        frame_shape: Vec<usize>,
        basepath: Option<PathBuf>,
    ) -> Result<StripedExternalArray, StripeError> {
        let loader_array =
            fileuris.map(|uri| FrameReference::new(uri.clone(), frame_shape.clone()));
        StripedExternalArray::new(loader_array, target, dtype, basepath)
    }

    /// The stripe shape: zero or more dimensions, frame axes excluded.
    pub fn shape(&self) -> &[usize] {
        self.loader_array.shape()
    }

    pub fn frame_shape(&self) -> &[usize] {
        &self.frame_shape
    }

    /// Stripe shape concatenated with the frame shape, stripe axes outermost.
    pub fn output_shape(&self) -> Vec<usize> {
        let mut shape = self.loader_array.shape().to_vec();
        shape.extend_from_slice(&self.frame_shape);
        shape
    }

    /// Size of the leading stripe axis; 1 for a scalar (0-d) stripe.
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// HDU index the frames live in.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Declared element type of the frames.
    pub fn dtype(&self) -> &str {
        &self.dtype
    }

    /// The URIs of every reference, as a grid of the stripe shape.
    pub fn fileuri_array(&self) -> ArrayD<String> {
        self.loader_array.map(|reference| reference.uri.clone())
    }

    /// The URIs of every reference, flattened in grid order.
    pub fn filenames(&self) -> Vec<String> {
        self.loader_array
            .iter()
            .map(|reference| reference.uri.clone())
            .collect()
    }

    pub fn basepath(&self) -> Option<PathBuf> {
        read_cell(&self.basepath)
    }

    pub fn set_basepath(&self, basepath: Option<PathBuf>) {
        write_cell(&self.basepath, basepath);
    }

    pub(crate) fn basepath_cell(&self) -> &BasePathCell {
        &self.basepath
    }

    pub(crate) fn reference_grid(&self) -> &ArrayD<FrameReference> {
        &self.loader_array
    }

    /// Restrict to `key` over the stripe axes, returning a view that shares
    /// this array's grid and base path cell.
    pub fn index(
        self: &Arc<StripedExternalArray>,
        key: impl Into<Selection>,
    ) -> Result<StripedExternalArrayView, IndexingError> {
        let selection = StripeSelection::full(self.shape()).compose(&key.into())?;
        Ok(StripedExternalArrayView {
            root: Arc::clone(self),
            selection,
            basepath: Arc::clone(&self.basepath),
        })
    }

    /// Produce the lazy materialisation handle for the whole stripe.
    pub fn generate_array(self: &Arc<StripedExternalArray>) -> LazyStripedArray {
        LazyStripedArray::new(
            Arc::clone(self),
            StripeSelection::full(self.shape()),
            Arc::clone(&self.basepath),
        )
    }
}

impl fmt::Display for StripedExternalArray {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "StripedExternalArray(len={}, shape={:?}, frame_shape={:?}, dtype={})",
            self.len(),
            self.shape(),
            self.frame_shape,
            self.dtype,
        )
    }
}

/// A read-only, index-restricted projection of a [`StripedExternalArray`].
///
/// A view never owns a grid; all reads resolve the composed selection against
/// the root. Indexing a view composes subscripts, so arbitrarily chained
/// views stay one `Arc` plus one selection.
#[derive(Debug, Clone)]
pub struct StripedExternalArrayView {
    root: Arc<StripedExternalArray>,
    selection: StripeSelection,
    /// Usually the root's cell. Dataset-level slicing substitutes a detached
    /// copy, after which this view no longer tracks the root's base path.
    basepath: BasePathCell,
}

impl StripedExternalArrayView {
    fn grid(&self) -> ArrayViewD<'_, FrameReference> {
        self.root
            .reference_grid()
            .slice(self.selection.slice_elems().as_slice())
    }

    pub fn shape(&self) -> Vec<usize> {
        self.selection.shape()
    }

    pub fn frame_shape(&self) -> &[usize] {
        self.root.frame_shape()
    }

    pub fn output_shape(&self) -> Vec<usize> {
        let mut shape = self.selection.shape();
        shape.extend_from_slice(self.root.frame_shape());
        shape
    }

    /// Size of the leading surviving stripe axis; 1 once every axis has been
    /// pinned.
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fileuri_array(&self) -> ArrayD<String> {
        self.grid().map(|reference| reference.uri.clone())
    }

    pub fn filenames(&self) -> Vec<String> {
        self.grid()
            .iter()
            .map(|reference| reference.uri.clone())
            .collect()
    }

    /// Compose `key` with this view's selection. The root grid is shared, not
    /// copied.
    pub fn index(
        &self,
        key: impl Into<Selection>,
    ) -> Result<StripedExternalArrayView, IndexingError> {
        let selection = self.selection.compose(&key.into())?;
        Ok(StripedExternalArrayView {
            root: Arc::clone(&self.root),
            selection,
            basepath: Arc::clone(&self.basepath),
        })
    }

    pub fn basepath(&self) -> Option<PathBuf> {
        read_cell(&self.basepath)
    }

    pub fn set_basepath(&self, basepath: Option<PathBuf>) {
        write_cell(&self.basepath, basepath);
    }

    /// The root array this view delegates to.
    pub fn root(&self) -> &Arc<StripedExternalArray> {
        &self.root
    }

    /// Produce the lazy materialisation handle for the selected frames.
    pub fn generate_array(&self) -> LazyStripedArray {
        LazyStripedArray::new(
            Arc::clone(&self.root),
            self.selection.clone(),
            Arc::clone(&self.basepath),
        )
    }

    /// Clone this view with its own base path cell holding a copy of the
    /// current value.
    pub(crate) fn detach_basepath(&self) -> StripedExternalArrayView {
        StripedExternalArrayView {
            root: Arc::clone(&self.root),
            selection: self.selection.clone(),
            basepath: new_cell(read_cell(&self.basepath)),
        }
    }
}

impl fmt::Display for StripedExternalArrayView {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "StripedExternalArrayView(len={}, shape={:?}) of {}",
            self.len(),
            self.shape(),
            self.root,
        )
    }
}

/// Either the root striped array or an index-restricted view of one.
#[derive(Debug, Clone)]
pub enum StripedSource {
    Root(Arc<StripedExternalArray>),
    View(StripedExternalArrayView),
}

/// The user-facing facade over a striped external array.
///
/// A dataset owns exactly one of these. It proxies shape and base path
/// management to the wrapped array and hands out sliced children.
///
/// Base path aliasing is deliberate and asymmetric:
/// * [`FileManager::index`] (slicing the facade directly) shares the base
///   path cell with the child, so setting it on either side updates both.
/// * [`FileManager::detach`] (used when the owning *dataset* is sliced)
///   copies the current value into an independent cell; afterwards the two
///   managers no longer affect each other.
#[derive(Debug, Clone)]
pub struct FileManager {
    array: StripedSource,
}

impl FileManager {
    pub fn new(array: StripedExternalArray) -> FileManager {
        FileManager {
            array: StripedSource::Root(Arc::new(array)),
        }
    }

    /// The wrapped array, for callers that need to know whether they hold the
    /// root or a view.
    pub fn striped_external_array(&self) -> &StripedSource {
        &self.array
    }

    /// Size of the leading stripe axis.
    pub fn len(&self) -> usize {
        match &self.array {
            StripedSource::Root(root) => root.len(),
            StripedSource::View(view) => view.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stripe shape.
    pub fn shape(&self) -> Vec<usize> {
        match &self.array {
            StripedSource::Root(root) => root.shape().to_vec(),
            StripedSource::View(view) => view.shape(),
        }
    }

    pub fn frame_shape(&self) -> &[usize] {
        match &self.array {
            StripedSource::Root(root) => root.frame_shape(),
            StripedSource::View(view) => view.frame_shape(),
        }
    }

    /// Stripe shape concatenated with the frame shape.
    pub fn output_shape(&self) -> Vec<usize> {
        match &self.array {
            StripedSource::Root(root) => root.output_shape(),
            StripedSource::View(view) => view.output_shape(),
        }
    }

    /// Flattened URIs in grid order.
    pub fn filenames(&self) -> Vec<String> {
        match &self.array {
            StripedSource::Root(root) => root.filenames(),
            StripedSource::View(view) => view.filenames(),
        }
    }

    pub fn fileuri_array(&self) -> ArrayD<String> {
        match &self.array {
            StripedSource::Root(root) => root.fileuri_array(),
            StripedSource::View(view) => view.fileuri_array(),
        }
    }

    pub fn basepath(&self) -> Option<PathBuf> {
        match &self.array {
            StripedSource::Root(root) => root.basepath(),
            StripedSource::View(view) => view.basepath(),
        }
    }

    pub fn set_basepath(&self, basepath: Option<PathBuf>) {
        match &self.array {
            StripedSource::Root(root) => root.set_basepath(basepath),
            StripedSource::View(view) => view.set_basepath(basepath),
        }
    }

    /// Slice the facade directly. The child wraps a view over the same grid
    /// and **shares** this manager's base path cell.
    pub fn index(&self, key: impl Into<Selection>) -> Result<FileManager, IndexingError> {
        let view = match &self.array {
            StripedSource::Root(root) => root.index(key)?,
            StripedSource::View(view) => view.index(key)?,
        };
        Ok(FileManager {
            array: StripedSource::View(view),
        })
    }

    /// Slice on behalf of an owning container. The child wraps a view over
    /// the same grid but receives a **copy** of the current base path value
    /// in an independent cell.
    pub fn detach(&self, key: impl Into<Selection>) -> Result<FileManager, IndexingError> {
        let view = match &self.array {
            StripedSource::Root(root) => root.index(key)?,
            StripedSource::View(view) => view.index(key)?,
        };
        Ok(FileManager {
            array: StripedSource::View(view.detach_basepath()),
        })
    }

    /// Produce the lazy materialisation handle for the wrapped frames.
    pub fn generate_array(&self) -> LazyStripedArray {
        match &self.array {
            StripedSource::Root(root) => root.generate_array(),
            StripedSource::View(view) => view.generate_array(),
        }
    }
}

impl fmt::Display for FileManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "FileManager containing {} files, stripe shape {:?}, each frame of shape {:?}",
            self.len(),
            self.shape(),
            self.frame_shape(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ndarray::{ArrayD, IxDyn};

    use super::*;

    fn uris(shape: &[usize]) -> ArrayD<String> {
        let n: usize = shape.iter().product();
        let flat = (0..n).map(|i| format!("frame_{i:03}.fits")).collect();
        ArrayD::from_shape_vec(IxDyn(shape), flat).unwrap()
    }

    fn sea(shape: &[usize]) -> Arc<StripedExternalArray> {
        Arc::new(
            StripedExternalArray::from_parts(uris(shape), 0, "float64", vec![2, 3], None).unwrap(),
        )
    }

    fn manager(shape: &[usize]) -> FileManager {
        FileManager::new(
            StripedExternalArray::from_parts(uris(shape), 0, "float64", vec![2, 3], None).unwrap(),
        )
    }

    #[test]
    fn output_shape_and_len() {
        let fm = manager(&[4, 5]);
        assert_eq!(fm.shape(), vec![4, 5]);
        assert_eq!(fm.output_shape(), vec![4, 5, 2, 3]);
        assert_eq!(fm.len(), 4);
    }

    #[test]
    fn scalar_stripe() {
        let fm = manager(&[]);
        assert_eq!(fm.shape(), Vec::<usize>::new());
        assert_eq!(fm.output_shape(), vec![2, 3]);
        assert_eq!(fm.len(), 1);
        assert_eq!(fm.filenames(), vec!["frame_000.fits".to_string()]);
    }

    #[test]
    fn non_uniform_frame_shape_fails() {
        let refs = ArrayD::from_shape_vec(
            IxDyn(&[2]),
            vec![
                FrameReference::new("a.fits", vec![2, 3]),
                FrameReference::new("b.fits", vec![3, 2]),
            ],
        )
        .unwrap();
        let err = StripedExternalArray::new(refs, 0, "float64", None).unwrap_err();
        assert!(matches!(
            err,
            StripeError::NonUniformFrameShape { ref uri, .. } if uri == "b.fits"
        ));
    }

    #[test]
    fn zero_length_frame_axis_fails() {
        let refs = ArrayD::from_shape_vec(
            IxDyn(&[1]),
            vec![FrameReference::new("a.fits", vec![2, 0])],
        )
        .unwrap();
        let err = StripedExternalArray::new(refs, 0, "float64", None).unwrap_err();
        assert!(matches!(err, StripeError::InvalidFrameShape { .. }));
    }

    #[test]
    fn empty_grid_fails() {
        let refs = ArrayD::from_shape_vec(IxDyn(&[0]), Vec::<FrameReference>::new()).unwrap();
        let err = StripedExternalArray::new(refs, 0, "float64", None).unwrap_err();
        assert!(matches!(err, StripeError::Empty));
    }

    #[test]
    fn index_errors_are_synchronous() {
        let fm = manager(&[4]);
        assert!(matches!(
            fm.index(9).unwrap_err(),
            IndexingError::OutOfRange { axis: 0, index: 9, len: 4 }
        ));
        assert!(matches!(
            fm.index(1..9).unwrap_err(),
            IndexingError::SpanOutOfRange { .. }
        ));
        assert!(matches!(
            fm.index(Selection::new(vec![Sel::At(3), Sel::At(0)]))
                .unwrap_err(),
            IndexingError::TooManyAxes { got: 2, available: 1 }
        ));
        assert!(matches!(
            fm.index(3..1).unwrap_err(),
            IndexingError::InvertedSpan { .. }
        ));
    }

    #[test]
    fn sliced_shapes() {
        let fm = manager(&[10, 4]);
        let sliced = fm.index(5..8).unwrap();
        assert_eq!(sliced.shape(), vec![3, 4]);
        assert_eq!(sliced.output_shape(), vec![3, 4, 2, 3]);
        assert_eq!(sliced.len(), 3);

        let pinned = fm.index((2, 1..3)).unwrap();
        assert_eq!(pinned.shape(), vec![2]);
        assert_eq!(pinned.output_shape(), vec![2, 2, 3]);
    }

    #[test]
    fn chained_views_share_the_root_grid() {
        let fm = manager(&[6, 4]);
        let outer = fm.index(2..5).unwrap();
        let inner = outer.index(0).unwrap();

        let root = match fm.striped_external_array() {
            StripedSource::Root(root) => Arc::clone(root),
            StripedSource::View(_) => unreachable!("fresh manager wraps the root"),
        };
        for sliced in [&outer, &inner] {
            match sliced.striped_external_array() {
                StripedSource::View(view) => assert!(Arc::ptr_eq(view.root(), &root)),
                StripedSource::Root(_) => panic!("sliced manager must wrap a view"),
            }
        }
        assert_eq!(inner.shape(), vec![4]);
        assert_eq!(inner.filenames(), fm.index((2, ..)).unwrap().filenames());
    }

    #[test]
    fn direct_slice_shares_basepath_both_ways() {
        let fm = manager(&[10]);
        let sliced = fm.index(5..8).unwrap();

        fm.set_basepath(Some(PathBuf::from("/data/a")));
        assert_eq!(sliced.basepath(), Some(PathBuf::from("/data/a")));

        sliced.set_basepath(Some(PathBuf::from("/data/b")));
        assert_eq!(fm.basepath(), Some(PathBuf::from("/data/b")));
    }

    #[test]
    fn detached_slice_copies_basepath_value() {
        let fm = manager(&[10]);
        fm.set_basepath(Some(PathBuf::from("/data/a")));

        let detached = fm.detach(5..7).unwrap();
        assert_eq!(detached.basepath(), Some(PathBuf::from("/data/a")));

        fm.set_basepath(Some(PathBuf::from("/data/b")));
        assert_eq!(detached.basepath(), Some(PathBuf::from("/data/a")));

        detached.set_basepath(Some(PathBuf::from("/data/c")));
        assert_eq!(fm.basepath(), Some(PathBuf::from("/data/b")));
    }

    #[test]
    fn slice_of_a_detached_manager_shares_its_cell() {
        let fm = manager(&[10]);
        let detached = fm.detach(..).unwrap();
        let child = detached.index(2..4).unwrap();

        child.set_basepath(Some(PathBuf::from("/data/x")));
        assert_eq!(detached.basepath(), Some(PathBuf::from("/data/x")));
        assert_eq!(fm.basepath(), None);
    }

    #[test]
    fn filenames_follow_grid_order() {
        let fm = manager(&[3, 2]);
        let flattened: Vec<String> = fm.fileuri_array().iter().cloned().collect();
        assert_eq!(fm.filenames(), flattened);
        assert_eq!(fm.filenames().len(), fm.len() * 2);
        assert_eq!(fm.filenames()[2], "frame_002.fits");
    }

    #[test]
    fn reprs_contain_len_and_shape() {
        let fm = manager(&[7, 2]);
        let repr = fm.to_string();
        assert!(repr.contains(&fm.len().to_string()));
        assert!(repr.contains(&format!("{:?}", fm.shape())));

        let root = sea(&[7, 2]);
        let repr = root.to_string();
        assert!(repr.contains("len=7"));
        assert!(repr.contains("[7, 2]"));

        let view = root.index(4..6).unwrap();
        let view_repr = view.to_string();
        assert!(view_repr.contains("len=2"));
        assert!(view_repr.contains(&root.to_string()));
    }

    #[test]
    fn selection_composes_spans_and_pins() {
        let full = StripeSelection::full(&[10, 6]);
        let sliced = full.compose(&Selection::from(2..8)).unwrap();
        assert_eq!(sliced.shape(), vec![6, 6]);

        let pinned = sliced.compose(&Selection::from((1, 2..5))).unwrap();
        assert_eq!(pinned.shape(), vec![3]);

        // The pin resolved against the root axes: 2 + 1 = 3.
        assert_eq!(pinned.cuts[0], AxisCut::At(3));
        assert_eq!(pinned.cuts[1], AxisCut::Span { start: 2, end: 5 });
    }
}
