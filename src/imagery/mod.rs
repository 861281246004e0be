//! Imagery domain model.
//!
//! This module handles:
//! - Regions, date windows and collection queries
//! - The band transformation pipeline definition
//! - Local raster evaluation and median compositing

pub mod pipeline;
pub mod raster;
pub mod types;

pub use pipeline::{BandExpr, BandOp, BandSelector, Pipeline, TransformStep};
pub use raster::{median_composite, Raster};
pub use types::{
    CollectionQuery, DateWindow, Region, SceneMetadata, Visualization, LANDSAT8_SR_COLLECTION,
};
