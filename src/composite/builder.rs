//! Builds a bloom composite layer through an imagery backend.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{info, instrument};

use crate::engine::{CompositeRequest, ImageryBackend};
use crate::error::{LayerError, Result};
use crate::imagery::{CollectionQuery, Pipeline, Visualization};
use crate::metrics;

use super::request::{LayerInfo, LayerParams, LayerResponse};

/// Scale factors, cloud mask, spectral indices. Shared by every request.
static BLOOM_PIPELINE: Lazy<Arc<Pipeline>> = Lazy::new(|| Arc::new(Pipeline::bloom_detection()));

/// Linear count, transform, reduce, tile pipeline over one backend.
#[derive(Debug, Clone)]
pub struct CompositeBuilder {
    backend: Arc<dyn ImageryBackend>,
    cloud_cover_ceiling: f64,
}

impl CompositeBuilder {
    /// Create a builder.
    pub fn new(backend: Arc<dyn ImageryBackend>, cloud_cover_ceiling: f64) -> Self {
        Self {
            backend,
            cloud_cover_ceiling,
        }
    }

    /// Count matching images, then request tiles for their bloom-window median.
    ///
    /// Returns [`LayerError::NoImagesFound`] without requesting tiles when the
    /// search matches nothing. Remote calls are attempted once each.
    #[instrument(skip(self, params), fields(city = %params.city))]
    pub async fn build(&self, params: &LayerParams) -> Result<LayerResponse> {
        info!(
            period = %params.period,
            bloom = %params.bloom_period,
            "Processing layer request"
        );

        let query = CollectionQuery::landsat8(
            params.region,
            params.search_window,
            self.cloud_cover_ceiling,
        );

        let count = self.backend.collection_size(&query).await?;
        metrics::record_images_found(count);
        info!(count, "Images found");

        if count == 0 {
            return Err(LayerError::NoImagesFound { count });
        }

        let composite = CompositeRequest {
            query,
            pipeline: Arc::clone(&BLOOM_PIPELINE),
            bloom_window: params.bloom_window,
        };

        let tile_url = self
            .backend
            .tile_url(&composite, &Visualization::true_color())
            .await?;
        info!(tile_url = %tile_url, "Layer generated");

        Ok(LayerResponse {
            status: "success".to_string(),
            tile_url,
            city: params.city.clone(),
            image_count: count,
            info: LayerInfo {
                period: params.period.clone(),
                bloom_period: params.bloom_period.clone(),
                images_used: count,
            },
        })
    }
}
