//! Seam between the composite builder and a remote imagery service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::imagery::{CollectionQuery, DateWindow, Pipeline, Visualization};

/// Median composite of a transformed collection over the bloom window.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRequest {
    /// Source collection and its filters.
    pub query: CollectionQuery,
    /// Per-image transformation chain.
    pub pipeline: Arc<Pipeline>,
    /// Only images acquired in this window enter the median.
    pub bloom_window: DateWindow,
}

/// Remote imagery service able to count collections and serve composite tiles.
///
/// Each method is a single round trip; implementations must not retry.
#[async_trait]
pub trait ImageryBackend: Send + Sync + std::fmt::Debug {
    /// Number of images matching `query`.
    async fn collection_size(&self, query: &CollectionQuery) -> Result<u64, EngineError>;

    /// Tile URL template (`{z}/{x}/{y}`) for the rendered composite.
    async fn tile_url(
        &self,
        composite: &CompositeRequest,
        vis: &Visualization,
    ) -> Result<String, EngineError>;
}

/// Backend used when startup authentication failed. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotInitialized;

#[async_trait]
impl ImageryBackend for NotInitialized {
    async fn collection_size(&self, _query: &CollectionQuery) -> Result<u64, EngineError> {
        Err(EngineError::NotInitialized)
    }

    async fn tile_url(
        &self,
        _composite: &CompositeRequest,
        _vis: &Visualization,
    ) -> Result<String, EngineError> {
        Err(EngineError::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::Region;

    #[tokio::test]
    async fn not_initialized_backend_always_fails() {
        let query = CollectionQuery::landsat8(
            Region::DEFAULT,
            DateWindow::parse("2019-01-01", "2019-12-31").unwrap(),
            50.0,
        );
        let result = NotInitialized.collection_size(&query).await;
        assert!(matches!(result, Err(EngineError::NotInitialized)));
    }
}
