//! Resolving metadata files and directories into [`Dataset`]s.
//!
//! A metadata file is consumed as an opaque parsed tree; this module knows
//! only the keys it needs (`fileuris`, `target`, `datatype`, `shape`, `wcs`,
//! `inventory`, `history`) and carries the rest through untouched.

use std::{
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use lazy_static::lazy_static;
use log::{debug, warn};
use ndarray::{ArrayD, IxDyn};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use vec1::Vec1;

use crate::{
    dataset::{Dataset, DatasetError, LoadedDataset, TiledDataset},
    io::{FileManager, StripedExternalArray},
    wcs::Wcs,
};

lazy_static! {
    /// Level-1 metadata file names, e.g.
    /// `VISP_L1_20220602T120000_AAAAA_metadata.asdf`. Repackaged files carry
    /// a `_user_tools` or `_metadata` suffix; older ones carry none.
    static ref ASDF_FILENAME_PATTERN: Regex = Regex::new(
        r"^(?P<instrument>[A-Z-]+)_L1_(?P<timestamp>\d{8}T\d{6})_(?P<datasetid>[A-Z]{5,})(?P<suffix>_user_tools|_metadata)?\.asdf$"
    ).unwrap();
}

/// How strongly a suffix is preferred when one dataset id appears under
/// several names. Higher wins.
fn suffix_rank(suffix: Option<&str>) -> u8 {
    match suffix {
        Some("_metadata") => 2,
        Some("_user_tools") => 1,
        _ => 0,
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTree {
    dataset: DatasetValue,
    #[serde(default)]
    history: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DatasetValue {
    Single(DatasetNode),
    Tiled(TiledNode),
}

#[derive(Debug, Deserialize)]
struct DatasetNode {
    /// Arbitrarily nested lists of URI strings; the nesting defines the
    /// stripe shape.
    fileuris: Value,
    /// HDU index holding the frame image in every referenced file.
    target: usize,
    datatype: String,
    /// Shape of the array within each individual file.
    shape: Vec<usize>,
    wcs: Wcs,
    #[serde(default)]
    inventory: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TiledNode {
    /// Row-major grid of tiles.
    tiles: Vec<Vec<DatasetNode>>,
    #[serde(default)]
    inventory: Map<String, Value>,
}

/// Load the datasets described by `path`, a metadata file or a directory
/// containing metadata files.
///
/// When `path` is a directory, every `*.asdf` file is considered. Files named
/// like Level-1 products are grouped by dataset id and only the most recent
/// repackaging suffix is loaded (`_metadata` over `_user_tools` over none),
/// with a warning naming what was skipped. Files with other names load as-is.
pub fn load_datasets(path: impl AsRef<Path>) -> Result<Vec1<LoadedDataset>, DatasetError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DatasetError::MissingPath(path.to_path_buf()));
    }

    let files = if path.is_dir() {
        let files = select_metadata_files(path)?;
        if files.is_empty() {
            return Err(DatasetError::NoMetadataFiles(path.to_path_buf()));
        }
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut loaded = Vec::with_capacity(files.len());
    for file in &files {
        loaded.push(load_metadata_file(file)?);
    }
    Vec1::try_from_vec(loaded).map_err(|_| DatasetError::NoMetadataFiles(path.to_path_buf()))
}

/// Like [`load_datasets`], but insists that `path` resolves to exactly one
/// dataset.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<LoadedDataset, DatasetError> {
    let mut loaded = load_datasets(path)?.into_vec();
    if loaded.len() > 1 {
        return Err(DatasetError::MultipleDatasets(loaded.len()));
    }
    Ok(loaded.swap_remove(0))
}

/// Pick which `*.asdf` files in `dir` to load, one per dataset id.
fn select_metadata_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let mut candidates: Vec<(String, u8, PathBuf)> = vec![];
    let mut user_files: Vec<PathBuf> = vec![];

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("asdf") {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match ASDF_FILENAME_PATTERN.captures(name) {
            Some(caps) => {
                let datasetid = caps["datasetid"].to_string();
                let rank = suffix_rank(caps.name("suffix").map(|m| m.as_str()));
                candidates.push((datasetid, rank, path));
            }
            None => user_files.push(path),
        }
    }

    let mut selected = vec![];
    let mut ignored = vec![];
    candidates.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    for (_, group) in &candidates.iter().group_by(|(datasetid, ..)| datasetid) {
        let mut group = group.map(|(_, _, path)| path);
        // Sorted best-first within each dataset id.
        selected.push(group.next().cloned().unwrap_or_default());
        ignored.extend(group);
    }
    if !ignored.is_empty() {
        warn!(
            "Ignoring superseded metadata files: {}",
            ignored
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy())
                .join(", ")
        );
    }

    selected.extend(user_files);
    selected.sort();
    Ok(selected)
}

/// Parse one metadata file and set the base path of every resulting file
/// manager to the file's parent directory.
fn load_metadata_file(path: &Path) -> Result<LoadedDataset, DatasetError> {
    debug!("Loading dataset metadata from {}", path.display());
    let tree: MetadataTree = serde_json::from_str(&fs::read_to_string(path)?)?;
    let basepath = path.parent().map(Path::to_path_buf);

    match tree.dataset {
        DatasetValue::Single(node) => {
            let ds = build_dataset(node, tree.history, path)?;
            ds.files().set_basepath(basepath);
            Ok(LoadedDataset::Single(ds))
        }
        DatasetValue::Tiled(node) => {
            let mut tiles = Vec::with_capacity(node.tiles.len());
            for row in node.tiles {
                let mut out = Vec::with_capacity(row.len());
                for tile in row {
                    let ds = build_dataset(tile, tree.history.clone(), path)?;
                    ds.files().set_basepath(basepath.clone());
                    out.push(ds);
                }
                tiles.push(out);
            }
            Ok(LoadedDataset::Tiled(TiledDataset::new(
                tiles,
                node.inventory,
            )?))
        }
    }
}

fn build_dataset(
    node: DatasetNode,
    history: Value,
    path: &Path,
) -> Result<Dataset, DatasetError> {
    let fileuris = parse_fileuris(&node.fileuris).map_err(|reason| {
        DatasetError::MalformedTree {
            path: path.to_path_buf(),
            reason,
        }
    })?;
    node.wcs.validate()?;
    let array = StripedExternalArray::from_parts(
        fileuris,
        node.target,
        node.datatype,
        node.shape,
        None,
    )?;
    Ok(Dataset::new(
        FileManager::new(array),
        node.wcs,
        node.inventory,
        history,
    ))
}

/// Turn the nested `fileuris` lists into a URI grid. The nesting depth
/// defines the stripe dimensionality; a bare string is a scalar (0-d) stripe.
fn parse_fileuris(value: &Value) -> Result<ArrayD<String>, String> {
    let mut shape = vec![];
    let mut cursor = value;
    loop {
        match cursor {
            Value::String(_) => break,
            Value::Array(items) => {
                let first = items.first().ok_or("fileuris contains an empty list")?;
                shape.push(items.len());
                cursor = first;
            }
            other => return Err(format!("fileuris contains a non-string value: {other}")),
        }
    }

    let mut flat = Vec::with_capacity(shape.iter().product());
    collect_uris(value, &shape, 0, &mut flat)?;
    ArrayD::from_shape_vec(IxDyn(&shape), flat)
        .map_err(|_| "fileuris nesting is ragged".to_string())
}

fn collect_uris(
    value: &Value,
    shape: &[usize],
    depth: usize,
    out: &mut Vec<String>,
) -> Result<(), String> {
    match value {
        Value::String(uri) if depth == shape.len() => {
            out.push(uri.clone());
            Ok(())
        }
        Value::Array(items) if depth < shape.len() && items.len() == shape[depth] => {
            for item in items {
                collect_uris(item, shape, depth + 1, out)?;
            }
            Ok(())
        }
        Value::String(_) | Value::Array(_) => Err("fileuris nesting is ragged".to_string()),
        other => Err(format!("fileuris contains a non-string value: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn filename_pattern_matches_level1_products() {
        let caps = ASDF_FILENAME_PATTERN
            .captures("VISP_L1_20220602T120000_AAAAAAA_metadata.asdf")
            .unwrap();
        assert_eq!(&caps["instrument"], "VISP");
        assert_eq!(&caps["datasetid"], "AAAAAAA");
        assert_eq!(caps.name("suffix").unwrap().as_str(), "_metadata");

        let caps = ASDF_FILENAME_PATTERN
            .captures("VBI-RED_L1_20220602T120000_BBBBB.asdf")
            .unwrap();
        assert_eq!(&caps["instrument"], "VBI-RED");
        assert!(caps.name("suffix").is_none());

        assert!(ASDF_FILENAME_PATTERN
            .captures("random_file.asdf")
            .is_none());
        assert!(ASDF_FILENAME_PATTERN
            .captures("VISP_L2_20220602T120000_AAAAA.asdf")
            .is_none());
    }

    #[test]
    fn metadata_suffix_outranks_the_others() {
        assert!(suffix_rank(Some("_metadata")) > suffix_rank(Some("_user_tools")));
        assert!(suffix_rank(Some("_user_tools")) > suffix_rank(None));
    }

    #[test]
    fn fileuris_nesting_defines_the_stripe_shape() {
        let uris = parse_fileuris(&json!([["a.fits", "b.fits"], ["c.fits", "d.fits"]])).unwrap();
        assert_eq!(uris.shape(), &[2, 2]);
        assert_eq!(uris[[1, 0]], "c.fits");

        let flat = parse_fileuris(&json!(["a.fits", "b.fits", "c.fits"])).unwrap();
        assert_eq!(flat.shape(), &[3]);
    }

    #[test]
    fn scalar_fileuri_is_a_zero_dim_stripe() {
        let uris = parse_fileuris(&json!("only.fits")).unwrap();
        assert_eq!(uris.shape(), &[] as &[usize]);
        assert_eq!(uris.len(), 1);
    }

    #[test]
    fn ragged_fileuris_are_rejected() {
        assert!(parse_fileuris(&json!([["a.fits"], ["b.fits", "c.fits"]])).is_err());
        assert!(parse_fileuris(&json!(["a.fits", ["b.fits"]])).is_err());
        assert!(parse_fileuris(&json!([])).is_err());
        assert!(parse_fileuris(&json!(42)).is_err());
    }
}
