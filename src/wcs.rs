//! The world-coordinate-system capability contract.
//!
//! Datasets carry a WCS purely as information: dimension counts, axis names,
//! physical types, units, bounds and the pixel/world correlation matrix. It
//! is consumed read-only for rendering; coordinate transformation maths lives
//! outside this crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A field of the metadata tree's WCS node disagrees with its dimension
/// counts.
#[derive(Debug, Error)]
#[error("WCS field {field} has {found} entries, expected {expected}")]
pub struct WcsError {
    pub field: &'static str,
    pub expected: usize,
    pub found: usize,
}

/// Read-only WCS description as stored in the dataset metadata tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wcs {
    /// Number of pixel (array) dimensions.
    pub pixel_n_dim: usize,
    /// Number of world dimensions.
    pub world_n_dim: usize,
    /// Names of the pixel axes, world-axis-order convention (may be empty).
    #[serde(default)]
    pub pixel_axis_names: Vec<String>,
    /// Names of the world axes (may be empty).
    #[serde(default)]
    pub world_axis_names: Vec<String>,
    /// IVOA UCD physical types, one per world axis.
    #[serde(default)]
    pub world_axis_physical_types: Vec<String>,
    /// Units, one per world axis.
    #[serde(default)]
    pub world_axis_units: Vec<String>,
    /// Lengths of the pixel axes, if known.
    #[serde(default)]
    pub pixel_shape: Option<Vec<usize>>,
    /// Inclusive pixel bounds per pixel axis, if known.
    #[serde(default)]
    pub pixel_bounds: Option<Vec<(i64, i64)>>,
    /// `world_n_dim` rows by `pixel_n_dim` columns; true where a world axis
    /// depends on a pixel axis.
    pub axis_correlation_matrix: Vec<Vec<bool>>,
}

impl Wcs {
    /// Check that every per-axis list matches the declared dimension counts.
    /// Name lists are allowed to be empty (rendering falls back to "None").
    pub fn validate(&self) -> Result<(), WcsError> {
        for (field, list) in [
            ("world_axis_names", &self.world_axis_names),
            ("world_axis_physical_types", &self.world_axis_physical_types),
            ("world_axis_units", &self.world_axis_units),
        ] {
            if !list.is_empty() && list.len() != self.world_n_dim {
                return Err(WcsError {
                    field,
                    expected: self.world_n_dim,
                    found: list.len(),
                });
            }
        }
        if !self.pixel_axis_names.is_empty() && self.pixel_axis_names.len() != self.pixel_n_dim {
            return Err(WcsError {
                field: "pixel_axis_names",
                expected: self.pixel_n_dim,
                found: self.pixel_axis_names.len(),
            });
        }
        if let Some(shape) = &self.pixel_shape {
            if shape.len() != self.pixel_n_dim {
                return Err(WcsError {
                    field: "pixel_shape",
                    expected: self.pixel_n_dim,
                    found: shape.len(),
                });
            }
        }
        if let Some(bounds) = &self.pixel_bounds {
            if bounds.len() != self.pixel_n_dim {
                return Err(WcsError {
                    field: "pixel_bounds",
                    expected: self.pixel_n_dim,
                    found: bounds.len(),
                });
            }
        }
        if self.axis_correlation_matrix.len() != self.world_n_dim {
            return Err(WcsError {
                field: "axis_correlation_matrix",
                expected: self.world_n_dim,
                found: self.axis_correlation_matrix.len(),
            });
        }
        for row in &self.axis_correlation_matrix {
            if row.len() != self.pixel_n_dim {
                return Err(WcsError {
                    field: "axis_correlation_matrix",
                    expected: self.pixel_n_dim,
                    found: row.len(),
                });
            }
        }
        Ok(())
    }

    pub fn pixel_axis_name(&self, axis: usize) -> &str {
        self.pixel_axis_names
            .get(axis)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or("None")
    }

    pub fn world_axis_name(&self, axis: usize) -> &str {
        self.world_axis_names
            .get(axis)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or("None")
    }

    pub fn world_axis_physical_type(&self, axis: usize) -> &str {
        self.world_axis_physical_types
            .get(axis)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or("None")
    }

    pub fn world_axis_unit(&self, axis: usize) -> &str {
        self.world_axis_units
            .get(axis)
            .map(String::as_str)
            .filter(|u| !u.is_empty())
            .unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn simple_wcs() -> Wcs {
        Wcs {
            pixel_n_dim: 3,
            world_n_dim: 3,
            pixel_axis_names: vec![
                "spatial along slit".into(),
                "dispersion axis".into(),
                "raster scan step number".into(),
            ],
            world_axis_names: vec![
                "helioprojective latitude".into(),
                "wavelength".into(),
                "time".into(),
            ],
            world_axis_physical_types: vec![
                "custom:pos.helioprojective.lat".into(),
                "em.wl".into(),
                "time".into(),
            ],
            world_axis_units: vec!["arcsec".into(), "nm".into(), "s".into()],
            pixel_shape: Some(vec![4, 2, 3]),
            pixel_bounds: None,
            axis_correlation_matrix: vec![
                vec![true, false, true],
                vec![false, true, false],
                vec![true, false, false],
            ],
        }
    }

    #[test]
    fn valid_wcs_passes() {
        assert!(simple_wcs().validate().is_ok());
    }

    #[test]
    fn mismatched_matrix_fails() {
        let mut wcs = simple_wcs();
        wcs.axis_correlation_matrix.pop();
        let err = wcs.validate().unwrap_err();
        assert_eq!(err.field, "axis_correlation_matrix");
    }

    #[test]
    fn mismatched_units_fail() {
        let mut wcs = simple_wcs();
        wcs.world_axis_units.push("deg".into());
        assert!(wcs.validate().is_err());
    }

    #[test]
    fn empty_name_lists_are_allowed() {
        let mut wcs = simple_wcs();
        wcs.pixel_axis_names.clear();
        wcs.world_axis_names.clear();
        assert!(wcs.validate().is_ok());
        assert_eq!(wcs.pixel_axis_name(0), "None");
    }
}
