//! Unified error types for the bloom layer service.

use thiserror::Error;

/// Errors surfaced at the request boundary of `/get-canola-layer`.
#[derive(Error, Debug)]
pub enum LayerError {
    /// Earth Engine was never authenticated at startup.
    #[error("earth engine not initialized")]
    ServiceUnavailable,

    /// The filtered collection is empty.
    #[error("no images found for this period (count={count})")]
    NoImagesFound {
        /// Number of matching images (always zero).
        count: u64,
    },

    /// Caller-supplied bounds do not describe a valid rectangle.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// Request body or date fields could not be understood.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Anything that failed while talking to the imagery backend.
    #[error("processing error: {0}")]
    Processing(#[from] EngineError),
}

impl LayerError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LayerError::ServiceUnavailable => "service_unavailable",
            LayerError::NoImagesFound { .. } => "no_images",
            LayerError::InvalidRegion(_) => "invalid_region",
            LayerError::InvalidRequest(_) => "invalid_request",
            LayerError::Processing(_) => "processing_error",
        }
    }
}

/// Errors from the remote imagery backend and its authentication.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The service-account key file does not exist.
    #[error("service account key not found at {path}")]
    CredentialsNotFound {
        /// Path that was checked.
        path: String,
    },

    /// The key file exists but could not be used.
    #[error("invalid service account key: {0}")]
    InvalidCredentials(String),

    /// JWT assertion could not be signed.
    #[error("signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// The OAuth token endpoint rejected the assertion.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// HTTP transport failure.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("earth engine api error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the error envelope, or the raw body.
        message: String,
    },

    /// The API answered 2xx with a body we could not interpret.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// No authenticated backend is available.
    #[error("earth engine client not initialized")]
    NotInitialized,
}

/// Errors from evaluating a pipeline over an in-memory raster.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    /// An expression referenced a band the raster does not carry.
    #[error("band {0} not found")]
    MissingBand(String),

    /// A band's pixel count does not match the raster size.
    #[error("band {band} has {actual} pixels, expected {expected}")]
    DimensionMismatch {
        /// Offending band.
        band: String,
        /// Expected pixel count.
        expected: usize,
        /// Actual pixel count.
        actual: usize,
    },

    /// A composite was requested over zero images.
    #[error("cannot composite an empty collection")]
    EmptyCollection,
}

/// Convenient Result type alias for request handling.
pub type Result<T> = std::result::Result<T, LayerError>;
