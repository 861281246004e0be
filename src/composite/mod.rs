//! Composite layer module.
//!
//! This module handles:
//! - Layer request parsing and defaults
//! - The count, transform, reduce, tile pipeline

pub mod builder;
pub mod request;

pub use builder::CompositeBuilder;
pub use request::{LayerInfo, LayerParams, LayerRequest, LayerResponse};
