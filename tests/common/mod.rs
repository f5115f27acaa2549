//! Fixture builders: a directory of frame files plus the metadata file that
//! references them.

use std::{fs, path::Path};

use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use serde_json::{json, Value};
use tempfile::TempDir;

pub const FRAME_SHAPE: [usize; 2] = [2, 3];

/// Write one frame file holding `value` in every pixel.
pub fn write_frame(dir: &Path, name: &str, value: f64) {
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &FRAME_SHAPE,
    };
    let mut fits_fptr = FitsFile::create(dir.join(name))
        .with_custom_primary(&description)
        .open()
        .unwrap();
    let hdu = fits_fptr.primary_hdu().unwrap();
    let data = vec![value; FRAME_SHAPE.iter().product()];
    hdu.write_image(&mut fits_fptr, &data).unwrap();
}

pub fn wcs_node() -> Value {
    json!({
        "pixel_n_dim": 3,
        "world_n_dim": 3,
        "pixel_axis_names": ["spatial along slit", "dispersion axis", "raster scan step number"],
        "world_axis_names": ["helioprojective latitude", "wavelength", "time"],
        "world_axis_physical_types": ["custom:pos.helioprojective.lat", "em.wl", "time"],
        "world_axis_units": ["arcsec", "nm", "s"],
        "axis_correlation_matrix": [
            [true, false, true],
            [false, true, false],
            [true, false, false]
        ]
    })
}

pub fn dataset_node(fileuris: Value, dataset_id: &str) -> Value {
    json!({
        "fileuris": fileuris,
        "target": 0,
        "datatype": "float64",
        "shape": FRAME_SHAPE,
        "wcs": wcs_node(),
        "inventory": { "datasetId": dataset_id, "instrument": "VISP" }
    })
}

/// A directory holding `n` frame files (frame i filled with the value i) and
/// one metadata file referencing them all along a single stripe axis.
pub fn single_dataset_dir(n: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    let uris: Vec<String> = (0..n).map(|i| format!("frame_{i:03}.fits")).collect();
    for (i, name) in uris.iter().enumerate() {
        write_frame(dir.path(), name, i as f64);
    }
    let tree = json!({
        "dataset": dataset_node(json!(uris), "AAAAAAA"),
        "history": { "entries": [] }
    });
    fs::write(
        dir.path().join("VISP_L1_20220602T120000_AAAAAAA_metadata.asdf"),
        serde_json::to_string(&tree).unwrap(),
    )
    .unwrap();
    dir
}
