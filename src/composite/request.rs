//! Request and response bodies for `/get-canola-layer`.

use serde::{Deserialize, Serialize};

use crate::error::LayerError;
use crate::imagery::{DateWindow, Region};

/// City reported when the caller names none.
pub const DEFAULT_CITY: &str = "regina";
/// Default search window start.
pub const DEFAULT_START_DATE: &str = "2019-01-01";
/// Default search window end.
pub const DEFAULT_END_DATE: &str = "2019-12-31";
/// Default bloom window start.
pub const DEFAULT_BLOOM_START: &str = "2019-07-01";
/// Default bloom window end.
pub const DEFAULT_BLOOM_END: &str = "2019-08-31";

/// JSON body of a layer request. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerRequest {
    /// Label echoed back to the caller.
    #[serde(default)]
    pub city: Option<String>,
    /// `[[west, south], [east, north]]`.
    #[serde(default)]
    pub bounds: Option<Vec<Vec<f64>>>,
    /// Search window start (`YYYY-MM-DD`).
    #[serde(default)]
    pub start_date: Option<String>,
    /// Search window end (`YYYY-MM-DD`).
    #[serde(default)]
    pub end_date: Option<String>,
    /// Bloom window start (`YYYY-MM-DD`).
    #[serde(default)]
    pub bloom_start: Option<String>,
    /// Bloom window end (`YYYY-MM-DD`).
    #[serde(default)]
    pub bloom_end: Option<String>,
}

impl LayerRequest {
    /// Parse a request body. An empty body means "all defaults".
    pub fn from_body(body: &[u8]) -> Result<Self, LayerError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| LayerError::InvalidRequest(e.to_string()))
    }
}

/// Validated layer parameters with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParams {
    /// City label.
    pub city: String,
    /// Area of interest.
    pub region: Region,
    /// Archive search window.
    pub search_window: DateWindow,
    /// Window the median composite is built from.
    pub bloom_window: DateWindow,
    /// Search window as supplied, `"<start_date> to <end_date>"`.
    pub period: String,
    /// Bloom window as supplied, `"<bloom_start> to <bloom_end>"`.
    pub bloom_period: String,
}

impl TryFrom<LayerRequest> for LayerParams {
    type Error = LayerError;

    fn try_from(request: LayerRequest) -> Result<Self, Self::Error> {
        // An empty list counts as absent.
        let region = match request.bounds {
            Some(bounds) if !bounds.is_empty() => region_from_bounds(&bounds)?,
            _ => Region::DEFAULT,
        };

        let start_date = request.start_date.as_deref().unwrap_or(DEFAULT_START_DATE);
        let end_date = request.end_date.as_deref().unwrap_or(DEFAULT_END_DATE);
        let bloom_start = request.bloom_start.as_deref().unwrap_or(DEFAULT_BLOOM_START);
        let bloom_end = request.bloom_end.as_deref().unwrap_or(DEFAULT_BLOOM_END);

        let search_window = DateWindow::parse(start_date, end_date)?;
        let bloom_window = DateWindow::parse(bloom_start, bloom_end)?;

        Ok(Self {
            city: request.city.unwrap_or_else(|| DEFAULT_CITY.to_string()),
            region,
            search_window,
            bloom_window,
            period: format!("{} to {}", start_date, end_date),
            bloom_period: format!("{} to {}", bloom_start, bloom_end),
        })
    }
}

fn region_from_bounds(bounds: &[Vec<f64>]) -> Result<Region, LayerError> {
    let corner = |pair: &Vec<f64>| -> Result<[f64; 2], LayerError> {
        match pair.as_slice() {
            [lng, lat] => Ok([*lng, *lat]),
            _ => Err(LayerError::InvalidRegion(
                "each corner must be a [lng, lat] pair".to_string(),
            )),
        }
    };

    match bounds {
        [sw, ne] => Region::from_corners(corner(sw)?, corner(ne)?),
        _ => Err(LayerError::InvalidRegion(
            "bounds must contain exactly two corners".to_string(),
        )),
    }
}

/// Summary of the periods that produced a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerInfo {
    /// `"<start_date> to <end_date>"`.
    pub period: String,
    /// `"<bloom_start> to <bloom_end>"`.
    pub bloom_period: String,
    /// Images matched by the search.
    pub images_used: u64,
}

/// Successful layer response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerResponse {
    /// Always `"success"`.
    pub status: String,
    /// Tile URL template with `{z}/{x}/{y}` placeholders.
    pub tile_url: String,
    /// City label from the request.
    pub city: String,
    /// Images matched by the search.
    pub image_count: u64,
    /// Period summary.
    pub info: LayerInfo,
}
