//! BloomWatch canola bloom layer service.
//!
//! Serves a small HTTP API that builds a cloud-masked Landsat 8 median
//! composite over a farm region through Google Earth Engine and returns a
//! map tile URL template for it.
//!
//! # Flow
//!
//! ```text
//! POST /get-canola-layer
//!   -> count scenes in region, search window, CLOUD_COVER < 50
//!   -> 0 scenes: 404
//!   -> scale + cloud mask + NDVI/YI on bloom window scenes
//!   -> median composite, true color visualization
//!   -> tile URL
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`imagery`]: Regions, date windows, band math and compositing
//! - [`engine`]: Earth Engine REST client, auth and test double
//! - [`composite`]: Layer request handling
//! - [`api`]: HTTP routes and handlers
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod composite;
pub mod config;
pub mod engine;
pub mod error;
pub mod imagery;
pub mod metrics;
pub mod utils;

pub use config::Config;
pub use error::{LayerError, Result};
