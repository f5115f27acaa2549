//! Typed search attributes.
//!
//! Each attribute validates its payload at construction and knows the query
//! field it searches on plus the encoded value, so a query string can be
//! assembled from any mix of them without further checks. Issuing the search
//! itself is a client concern.

use std::fmt;

use thiserror::Error;

/// An attribute payload that cannot be searched on.
#[derive(Debug, Error, PartialEq)]
pub enum AttrError {
    #[error("{attr} must not be empty")]
    Empty { attr: &'static str },

    #[error("{attr} must be at least 1, got {got}")]
    NotPositive { attr: &'static str, got: usize },

    #[error("{attr} bounds must be finite numbers")]
    NotFinite { attr: &'static str },

    #[error("{attr} minimum {min} is greater than its maximum {max}")]
    InvertedRange {
        attr: &'static str,
        min: f64,
        max: f64,
    },
}

/// A validated search term: one query field plus its encoded value.
pub trait SearchAttr {
    /// The catalogue field this attribute searches on.
    fn field(&self) -> &'static str;

    /// The value as it appears in the query string.
    fn encode(&self) -> String;
}

/// An inclusive numeric range, encoded as `"min,max"`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ValueRange {
    min: f64,
    max: f64,
}

impl ValueRange {
    fn new(attr: &'static str, min: f64, max: f64) -> Result<ValueRange, AttrError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(AttrError::NotFinite { attr });
        }
        if min > max {
            return Err(AttrError::InvertedRange { attr, min, max });
        }
        Ok(ValueRange { min, max })
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.min, self.max)
    }
}

fn non_empty(attr: &'static str, value: String) -> Result<String, AttrError> {
    if value.trim().is_empty() {
        return Err(AttrError::Empty { attr });
    }
    Ok(value)
}

macro_rules! id_attr {
    ($(#[$doc:meta])* $name:ident, $field:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<$name, AttrError> {
                Ok($name(non_empty(stringify!($name), value.into())?))
            }
        }

        impl SearchAttr for $name {
            fn field(&self) -> &'static str {
                $field
            }

            fn encode(&self) -> String {
                self.0.clone()
            }
        }
    };
}

id_attr!(
    /// A unique dataset identifier.
    DatasetId,
    "datasetIds"
);
id_attr!(
    /// A product identifier.
    Product,
    "productIds"
);
id_attr!(
    /// A proposal identifier.
    Proposal,
    "primaryProposalIds"
);
id_attr!(
    /// An experiment identifier.
    Experiment,
    "primaryExperimentIds"
);

macro_rules! range_attr {
    ($(#[$doc:meta])* $name:ident, $field:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name(ValueRange);

        impl $name {
            pub fn new(min: f64, max: f64) -> Result<$name, AttrError> {
                Ok($name(ValueRange::new(stringify!($name), min, max)?))
            }
        }

        impl SearchAttr for $name {
            fn field(&self) -> &'static str {
                $field
            }

            fn encode(&self) -> String {
                self.0.to_string()
            }
        }
    };
}

range_attr!(
    /// Exposure time of the frames, in seconds.
    ExposureTime,
    "exposureTimeRange"
);
range_attr!(
    /// Fried parameter during the observation, in metres.
    FriedParameter,
    "qualityAverageFriedParameterRange"
);
range_attr!(
    /// Spectral sampling of the dataset, in nanometres.
    SpectralSampling,
    "averageDatasetSpectralSamplingRange"
);
range_attr!(
    /// Spatial sampling of the dataset, in arcseconds.
    SpatialSampling,
    "averageDatasetSpatialSamplingRange"
);
range_attr!(
    /// Temporal sampling of the dataset, in seconds.
    TemporalSampling,
    "averageDatasetTemporalSamplingRange"
);

/// Which page of results to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page(usize);

impl Page {
    pub fn new(page: usize) -> Result<Page, AttrError> {
        if page < 1 {
            return Err(AttrError::NotPositive {
                attr: "Page",
                got: page,
            });
        }
        Ok(Page(page))
    }
}

impl SearchAttr for Page {
    fn field(&self) -> &'static str {
        "page"
    }

    fn encode(&self) -> String {
        self.0.to_string()
    }
}

/// Number of results per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(usize);

impl PageSize {
    pub fn new(size: usize) -> Result<PageSize, AttrError> {
        if size < 1 {
            return Err(AttrError::NotPositive {
                attr: "PageSize",
                got: size,
            });
        }
        Ok(PageSize(size))
    }
}

impl SearchAttr for PageSize {
    fn field(&self) -> &'static str {
        "pageSize"
    }

    fn encode(&self) -> String {
        self.0.to_string()
    }
}

/// Whether to search embargoed datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Embargoed(pub bool);

impl SearchAttr for Embargoed {
    fn field(&self) -> &'static str {
        "isEmbargoed"
    }

    fn encode(&self) -> String {
        self.0.to_string()
    }
}

/// How a bounding box should relate to a dataset's sky footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    /// Datasets whose footprint lies entirely inside the box.
    Containing,
    /// Datasets whose footprint entirely contains the box.
    Contained,
    /// Datasets whose footprint overlaps the box at all.
    Intersecting,
}

/// A rectangle on the sky, in helioprojective coordinates (arcseconds),
/// encoded as `"(x1,y1),(x2,y2)"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub bottom_left: (f64, f64),
    pub top_right: (f64, f64),
    pub search: SearchType,
}

impl BoundingBox {
    pub fn new(
        bottom_left: (f64, f64),
        top_right: (f64, f64),
        search: SearchType,
    ) -> Result<BoundingBox, AttrError> {
        for value in [bottom_left.0, bottom_left.1, top_right.0, top_right.1] {
            if !value.is_finite() {
                return Err(AttrError::NotFinite {
                    attr: "BoundingBox",
                });
            }
        }
        Ok(BoundingBox {
            bottom_left,
            top_right,
            search,
        })
    }
}

impl SearchAttr for BoundingBox {
    fn field(&self) -> &'static str {
        match self.search {
            SearchType::Containing => "rectangleContainingBoundingBox",
            SearchType::Contained => "rectangleContainedByBoundingBox",
            SearchType::Intersecting => "rectangleIntersectingBoundingBox",
        }
    }

    fn encode(&self) -> String {
        format!(
            "({},{}),({},{})",
            self.bottom_left.0, self.bottom_left.1, self.top_right.0, self.top_right.1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_attrs_reject_empty_values() {
        assert!(DatasetId::new("BLKGA").is_ok());
        assert_eq!(
            DatasetId::new("  ").unwrap_err(),
            AttrError::Empty { attr: "DatasetId" }
        );
        assert!(Proposal::new("pid_1_123").is_ok());
    }

    #[test]
    fn id_attrs_encode_verbatim() {
        let attr = DatasetId::new("BLKGA").unwrap();
        assert_eq!(attr.field(), "datasetIds");
        assert_eq!(attr.encode(), "BLKGA");
    }

    #[test]
    fn range_attrs_validate_their_bounds() {
        let attr = ExposureTime::new(0.5, 2.0).unwrap();
        assert_eq!(attr.field(), "exposureTimeRange");
        assert_eq!(attr.encode(), "0.5,2");

        assert!(matches!(
            ExposureTime::new(2.0, 0.5).unwrap_err(),
            AttrError::InvertedRange { .. }
        ));
        assert!(matches!(
            FriedParameter::new(f64::NAN, 1.0).unwrap_err(),
            AttrError::NotFinite { .. }
        ));
        // A degenerate range is a point search, which is fine.
        assert!(SpectralSampling::new(1.0, 1.0).is_ok());
    }

    #[test]
    fn paging_must_be_positive() {
        assert_eq!(Page::new(3).unwrap().encode(), "3");
        assert!(Page::new(0).is_err());
        assert!(PageSize::new(0).is_err());
        assert_eq!(PageSize::new(100).unwrap().field(), "pageSize");
    }

    #[test]
    fn embargoed_encodes_as_bool() {
        assert_eq!(Embargoed(true).encode(), "true");
        assert_eq!(Embargoed(false).field(), "isEmbargoed");
    }

    #[test]
    fn bounding_box_picks_its_field_from_the_search_type() {
        let bb = BoundingBox::new((-100.0, -50.0), (100.0, 50.0), SearchType::Intersecting)
            .unwrap();
        assert_eq!(bb.field(), "rectangleIntersectingBoundingBox");
        assert_eq!(bb.encode(), "(-100,-50),(100,50)");

        let bb = BoundingBox::new((0.0, 0.0), (1.0, 1.0), SearchType::Containing).unwrap();
        assert_eq!(bb.field(), "rectangleContainingBoundingBox");
        let bb = BoundingBox::new((0.0, 0.0), (1.0, 1.0), SearchType::Contained).unwrap();
        assert_eq!(bb.field(), "rectangleContainedByBoundingBox");

        assert!(BoundingBox::new((f64::INFINITY, 0.0), (1.0, 1.0), SearchType::Contained).is_err());
    }
}
