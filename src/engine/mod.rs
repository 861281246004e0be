//! Remote imagery engine module.
//!
//! This module handles:
//! - The backend trait the composite builder talks to
//! - Service-account authentication
//! - Encoding pipelines into Earth Engine expression graphs
//! - The Earth Engine REST client
//! - Mock backend for testing

pub mod auth;
pub mod backend;
pub mod client;
pub mod graph;
pub mod mock;

pub use auth::{ServiceAccountKey, TokenProvider};
pub use backend::{CompositeRequest, ImageryBackend, NotInitialized};
pub use client::EarthEngineClient;
pub use graph::Expression;
pub use mock::{MockConfig, MockEngineClient};
