//! Earth Engine REST API client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::error::EngineError;
use crate::imagery::{CollectionQuery, Visualization};
use crate::metrics;

use super::auth::{ServiceAccountKey, TokenProvider};
use super::backend::{CompositeRequest, ImageryBackend};
use super::graph::{self, Expression, VISUALIZED_BANDS};

/// Earth Engine REST client authenticated as a service account.
#[derive(Debug)]
pub struct EarthEngineClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// API base URL without trailing slash.
    api_url: String,
    /// Cloud project the calls are billed to.
    project: String,
    /// Access token source.
    tokens: TokenProvider,
}

/// `value:compute` request body.
#[derive(Debug, Serialize)]
struct ComputeRequest<'a> {
    expression: &'a Expression,
}

/// `value:compute` response body.
#[derive(Debug, Deserialize)]
struct ComputeResponse {
    result: Value,
}

/// `maps` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MapRequest<'a> {
    expression: &'a Expression,
    file_format: &'static str,
    band_ids: [&'static str; 3],
}

/// `maps` response body.
#[derive(Debug, Deserialize)]
struct MapResponse {
    name: String,
}

/// Google API error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl EarthEngineClient {
    /// Create a client from config and an already-loaded key.
    pub fn new(config: &Config, key: ServiceAccountKey) -> Result<Self, EngineError> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = config.http_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let http = builder.build()?;

        let project = config
            .ee_project
            .clone()
            .or_else(|| key.project_id.clone())
            .ok_or_else(|| {
                EngineError::InvalidCredentials(
                    "no EE_PROJECT configured and the key has no project_id".to_string(),
                )
            })?;

        let tokens = TokenProvider::new(http.clone(), key)?;

        Ok(Self {
            http,
            api_url: config.api_base().to_string(),
            project,
            tokens,
        })
    }

    /// Load the key file and authenticate once.
    #[instrument(skip(config), fields(key = %config.service_account_key_path.display()))]
    pub async fn initialize(config: &Config) -> Result<Self, EngineError> {
        let key = ServiceAccountKey::from_file(&config.service_account_key_path)?;
        let client = Self::new(config, key)?;
        client.tokens.access_token().await?;

        info!(
            email = %client.tokens.client_email(),
            project = %client.project,
            "Earth Engine initialized with service account"
        );

        Ok(client)
    }

    /// Cloud project in use.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Service account e-mail.
    pub fn client_email(&self) -> &str {
        self.tokens.client_email()
    }

    fn project_url(&self, method: &str) -> String {
        format!("{}/v1/projects/{}/{}", self.api_url, self.project, method)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, EngineError> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header("x-goog-user-project", &self.project)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Api {
                status: status.as_u16(),
                message: api_error_message(&text),
            });
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::UnexpectedResponse(e.to_string()))
    }

    /// Evaluate an expression and return its JSON result.
    #[instrument(skip(self, expression), fields(project = %self.project))]
    pub async fn compute_value(&self, expression: &Expression) -> Result<Value, EngineError> {
        let url = self.project_url("value:compute");
        let response: ComputeResponse = self.post(&url, &ComputeRequest { expression }).await?;
        Ok(response.result)
    }

    /// Connectivity check: band names of a public elevation image.
    pub async fn probe(&self) -> Result<Vec<String>, EngineError> {
        let value = self.compute_value(&graph::probe()).await?;
        serde_json::from_value(value)
            .map_err(|e| EngineError::UnexpectedResponse(format!("band names: {}", e)))
    }
}

/// Tile URL template for a map resource name.
pub fn tile_template(api_url: &str, map_name: &str) -> String {
    format!("{}/v1/{}/tiles/{{z}}/{{x}}/{{y}}", api_url, map_name)
}

/// Message from a Google error envelope, or the trimmed raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl ImageryBackend for EarthEngineClient {
    #[instrument(skip(self, query), fields(collection = %query.collection_id))]
    async fn collection_size(&self, query: &CollectionQuery) -> Result<u64, EngineError> {
        let start = Instant::now();
        let result = self.compute_value(&graph::collection_size(query)).await;
        metrics::record_engine_latency(start, "collection_size");

        let value = result?;
        let count = value.as_u64().ok_or_else(|| {
            EngineError::UnexpectedResponse(format!("collection size is not a count: {}", value))
        })?;

        debug!(count, "Collection size computed");
        Ok(count)
    }

    #[instrument(skip(self, composite, vis))]
    async fn tile_url(
        &self,
        composite: &CompositeRequest,
        vis: &Visualization,
    ) -> Result<String, EngineError> {
        let start = Instant::now();
        let expression = graph::visualized_composite(composite, vis);
        let body = MapRequest {
            expression: &expression,
            file_format: "AUTO_JPEG_PNG",
            band_ids: VISUALIZED_BANDS,
        };

        let url = self.project_url("maps");
        let result: Result<MapResponse, EngineError> = self.post(&url, &body).await;
        metrics::record_engine_latency(start, "tile_url");

        let map = result?;
        debug!(map = %map.name, "Map created");
        Ok(tile_template(&self.api_url, &map.name))
    }
}
