//! Mock imagery backend for unit testing.
//!
//! This module provides a backend that can be used in tests without making real
//! network requests. Every call is counted so tests can assert which remote calls
//! a code path attempted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::EngineError;
use crate::imagery::{CollectionQuery, SceneMetadata, Visualization};

use super::backend::{CompositeRequest, ImageryBackend};

/// Tile URL returned by default.
pub const MOCK_TILE_URL: &str =
    "https://earthengine.googleapis.com/v1/projects/mock/maps/mock-map/tiles/{z}/{x}/{y}";

/// Configuration for mock backend behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Fixed collection size. When `None`, the size is counted from the scenes.
    pub collection_size: Option<u64>,
    /// Whether to fail collection size requests.
    pub fail_collection_size: bool,
    /// Whether to fail tile requests.
    pub fail_tile_url: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

/// Mock imagery backend for testing.
#[derive(Debug, Clone)]
pub struct MockEngineClient {
    /// Mock configuration.
    config: MockConfig,
    /// Scenes the archive contains.
    scenes: Arc<Mutex<Vec<SceneMetadata>>>,
    /// Last composite requested.
    last_composite: Arc<Mutex<Option<CompositeRequest>>>,
    size_calls: Arc<AtomicUsize>,
    tile_calls: Arc<AtomicUsize>,
}

impl MockEngineClient {
    /// Create a mock backend with an empty archive.
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create a mock backend with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            scenes: Arc::new(Mutex::new(Vec::new())),
            last_composite: Arc::new(Mutex::new(None)),
            size_calls: Arc::new(AtomicUsize::new(0)),
            tile_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mock backend that reports a fixed collection size.
    pub fn with_collection_size(size: u64) -> Self {
        Self::with_config(MockConfig {
            collection_size: Some(size),
            ..Default::default()
        })
    }

    /// Add a scene to the archive.
    pub fn add_scene(&self, scene: SceneMetadata) {
        self.scenes.lock().unwrap().push(scene);
    }

    /// Number of `collection_size` calls so far.
    pub fn size_calls(&self) -> usize {
        self.size_calls.load(Ordering::SeqCst)
    }

    /// Number of `tile_url` calls so far.
    pub fn tile_calls(&self) -> usize {
        self.tile_calls.load(Ordering::SeqCst)
    }

    /// Total remote calls so far.
    pub fn total_calls(&self) -> usize {
        self.size_calls() + self.tile_calls()
    }

    /// The most recent composite passed to `tile_url`.
    pub fn last_composite(&self) -> Option<CompositeRequest> {
        self.last_composite.lock().unwrap().clone()
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

impl Default for MockEngineClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageryBackend for MockEngineClient {
    async fn collection_size(&self, query: &CollectionQuery) -> Result<u64, EngineError> {
        self.size_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.config.fail_collection_size {
            return Err(EngineError::Api {
                status: 500,
                message: "Mock collection size failure".to_string(),
            });
        }

        if let Some(size) = self.config.collection_size {
            return Ok(size);
        }

        let scenes = self.scenes.lock().unwrap();
        Ok(scenes.iter().filter(|s| query.matches(s)).count() as u64)
    }

    async fn tile_url(
        &self,
        composite: &CompositeRequest,
        _vis: &Visualization,
    ) -> Result<String, EngineError> {
        self.tile_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        *self.last_composite.lock().unwrap() = Some(composite.clone());

        if self.config.fail_tile_url {
            return Err(EngineError::Api {
                status: 400,
                message: "Image.select: Pattern 'SR_B5' did not match any bands.".to_string(),
            });
        }

        Ok(MOCK_TILE_URL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::{DateWindow, Region};
    use time::macros::date;

    fn query() -> CollectionQuery {
        CollectionQuery::landsat8(
            Region::DEFAULT,
            DateWindow::parse("2019-01-01", "2019-12-31").unwrap(),
            50.0,
        )
    }

    fn scene(id: &str, cloud_cover: f64) -> SceneMetadata {
        SceneMetadata {
            id: id.to_string(),
            acquired: date!(2019 - 07 - 20),
            cloud_cover,
            footprint: Region::DEFAULT,
        }
    }

    #[tokio::test]
    async fn counts_matching_scenes() {
        let client = MockEngineClient::new();
        client.add_scene(scene("clear", 12.0));
        client.add_scene(scene("borderline", 50.0));
        client.add_scene(scene("cloudy", 80.0));

        let size = client.collection_size(&query()).await.unwrap();
        assert_eq!(size, 1);
        assert_eq!(client.size_calls(), 1);
        assert_eq!(client.tile_calls(), 0);
    }

    #[tokio::test]
    async fn fixed_size_overrides_scenes() {
        let client = MockEngineClient::with_collection_size(7);
        assert_eq!(client.collection_size(&query()).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn failure_modes() {
        let config = MockConfig {
            fail_collection_size: true,
            ..Default::default()
        };
        let client = MockEngineClient::with_config(config);

        let result = client.collection_size(&query()).await;
        assert!(matches!(result, Err(EngineError::Api { status: 500, .. })));
        assert_eq!(client.total_calls(), 1);
    }

    #[test]
    fn clones_share_counters() {
        let client = MockEngineClient::new();
        let other = client.clone();
        other.size_calls.fetch_add(2, Ordering::SeqCst);
        assert_eq!(client.size_calls(), 2);
    }
}
