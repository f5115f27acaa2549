//! Thin wrappers around `fitsio` for reading frame files.

use std::path::{Path, PathBuf};

use fitsio::{
    errors::check_status as fits_check_status,
    hdu::{FitsHdu, HduInfo},
    FitsFile,
};
use log::debug;
use thiserror::Error;

/// Errors raised while resolving and reading a single frame file.
///
/// These surface at compute time, when a chunk is actually read, never at
/// graph construction time.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("frame file {0} does not exist")]
    MissingFile(PathBuf),

    #[error("HDU {hdu} of {uri} does not contain an image")]
    NotAnImage { uri: String, hdu: usize },

    #[error("frame in {uri} has shape {found:?}, expected {expected:?}")]
    FrameShapeMismatch {
        uri: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error(transparent)]
    Fits(#[from] fitsio::errors::Error),
}

/// Open a frame file, distinguishing "not there" from other cfitsio errors.
pub(crate) fn open(path: &Path) -> Result<FitsFile, LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingFile(path.to_path_buf()));
    }
    Ok(FitsFile::open(path)?)
}

/// Move to and return the HDU with the given index.
pub(crate) fn open_hdu(fits_fptr: &mut FitsFile, index: usize) -> Result<FitsHdu, LoadError> {
    Ok(fits_fptr.hdu(index)?)
}

/// Get the image dimensions of an already-opened HDU.
pub(crate) fn image_dimensions(
    hdu: &FitsHdu,
    uri: &str,
    target: usize,
) -> Result<Vec<usize>, LoadError> {
    match &hdu.info {
        HduInfo::ImageInfo { shape, .. } => Ok(shape.clone()),
        _ => Err(LoadError::NotAnImage {
            uri: uri.to_string(),
            hdu: target,
        }),
    }
}

/// Read the whole image of the current HDU into `buffer` as `f64`, letting
/// cfitsio convert and scale whatever the on-disk pixel type is.
pub(crate) fn read_image_into_buffer(
    fits_fptr: &mut FitsFile,
    path: &Path,
    buffer: &mut [f64],
) -> Result<(), LoadError> {
    debug!("Reading {} pixels from {}", buffer.len(), path.display());

    let mut status = 0;
    unsafe {
        // ffgpvd = fits_read_img_dbl
        fitsio_sys::ffgpvd(
            fits_fptr.as_raw(), /* I - FITS file pointer                       */
            1,                  /* I - group to read (1 = 1st group)           */
            1,                  /* I - first vector element to read (1 = 1st)  */
            buffer
                .len()
                .try_into()
                .expect("not larger than i64::MAX"), /* I - number of values to read                */
            0.0,                  /* I - value for undefined pixels              */
            buffer.as_mut_ptr(),  /* O - array of values that are returned       */
            &mut 0,               /* O - set to 1 if any values are null; else 0 */
            &mut status,          /* IO - error status                           */
        );
    }
    fits_check_status(status)?;
    Ok(())
}
