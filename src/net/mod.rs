//! Declarative search attributes for the dataset catalogue.

pub mod attrs;

pub use attrs::{
    AttrError, BoundingBox, DatasetId, Embargoed, Experiment, ExposureTime, FriedParameter, Page,
    PageSize, Product, Proposal, SearchAttr, SearchType, SpatialSampling, SpectralSampling,
    TemporalSampling,
};
