//! End-to-end request flows through the router against the mock backend.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use time::macros::date;
use tower::ServiceExt;

use bloomwatch::api::{create_router, AppState};
use bloomwatch::composite::LayerResponse;
use bloomwatch::engine::mock::MOCK_TILE_URL;
use bloomwatch::engine::{MockConfig, MockEngineClient};
use bloomwatch::imagery::{Region, SceneMetadata};

fn app(mock: &MockEngineClient) -> Router {
    create_router(AppState::new(Arc::new(mock.clone()), true, 50.0))
}

async fn post_layer(router: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/get-canola-layer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn scene(id: &str, acquired: time::Date, cloud_cover: f64) -> SceneMetadata {
    SceneMetadata {
        id: id.to_string(),
        acquired,
        cloud_cover,
        footprint: Region::DEFAULT,
    }
}

#[tokio::test]
async fn empty_body_uses_defaults() {
    let mock = MockEngineClient::with_collection_size(12);
    let (status, body) = post_layer(app(&mock), json!({})).await;

    assert_eq!(status, StatusCode::OK);
    let response: LayerResponse = serde_json::from_value(body).unwrap();
    assert_eq!(response.status, "success");
    assert_eq!(response.tile_url, MOCK_TILE_URL);
    assert_eq!(response.city, "regina");
    assert_eq!(response.image_count, 12);
    assert_eq!(response.info.period, "2019-01-01 to 2019-12-31");
    assert_eq!(response.info.bloom_period, "2019-07-01 to 2019-08-31");
    assert_eq!(response.info.images_used, 12);

    let composite = mock.last_composite().unwrap();
    assert_eq!(composite.query.region, Region::DEFAULT);
}

#[tokio::test]
async fn info_echoes_supplied_dates() {
    let mock = MockEngineClient::with_collection_size(4);
    let (status, body) = post_layer(
        app(&mock),
        json!({
            "city": "saskatoon",
            "bounds": [[-106.9, 52.0], [-106.4, 52.3]],
            "start_date": "2021-03-01",
            "end_date": "2021-10-31",
            "bloom_start": "2021-07-10",
            "bloom_end": "2021-08-15"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city"], "saskatoon");
    assert_eq!(body["info"]["period"], "2021-03-01 to 2021-10-31");
    assert_eq!(body["info"]["bloom_period"], "2021-07-10 to 2021-08-15");

    let composite = mock.last_composite().unwrap();
    assert_eq!(composite.query.region.corners(), [[-106.9, 52.0], [-106.4, 52.3]]);
}

#[tokio::test]
async fn counts_only_scenes_below_cloud_ceiling() {
    let mock = MockEngineClient::new();
    mock.add_scene(scene("LC08_036025_20190614", date!(2019 - 06 - 14), 12.5));
    mock.add_scene(scene("LC08_036025_20190716", date!(2019 - 07 - 16), 50.0));
    mock.add_scene(scene("LC08_036025_20190801", date!(2019 - 08 - 01), 49.9));
    mock.add_scene(scene("LC08_036025_20200801", date!(2020 - 08 - 01), 3.0));

    let (status, body) = post_layer(app(&mock), json!({})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["image_count"], 2);
}

#[tokio::test]
async fn no_images_returns_404_without_tile_request() {
    let mock = MockEngineClient::with_collection_size(0);
    let (status, body) = post_layer(app(&mock), json!({"city": "regina"})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({"error": "No images found for this period", "count": 0})
    );
    assert_eq!(mock.size_calls(), 1);
    assert_eq!(mock.tile_calls(), 0);
}

#[tokio::test]
async fn remote_failure_is_sanitized() {
    let mock = MockEngineClient::with_config(MockConfig {
        collection_size: Some(6),
        fail_tile_url: true,
        ..Default::default()
    });
    let (status, body) = post_layer(app(&mock), json!({})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Error processing request");
    assert!(!body["message"].as_str().unwrap().contains("SR_B5"));
}

#[tokio::test]
async fn count_failure_is_processing_error() {
    let mock = MockEngineClient::with_config(MockConfig {
        fail_collection_size: true,
        ..Default::default()
    });
    let (status, body) = post_layer(app(&mock), json!({})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Error processing request");
    assert_eq!(mock.tile_calls(), 0);
}

#[tokio::test]
async fn bad_dates_return_400_without_remote_calls() {
    let mock = MockEngineClient::with_collection_size(3);
    for body in [
        json!({"start_date": "2019/01/01"}),
        json!({"start_date": "2019-12-31", "end_date": "2019-01-01"}),
        json!({"bloom_start": "2019-08-31", "bloom_end": "2019-08-31"}),
    ] {
        let (status, response) = post_layer(app(&mock), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "Invalid request");
    }
    assert_eq!(mock.total_calls(), 0);
}

#[tokio::test]
async fn unready_engine_never_calls_backend() {
    let mock = MockEngineClient::with_collection_size(3);
    let router = create_router(AppState::new(Arc::new(mock.clone()), false, 50.0));
    let (status, body) = post_layer(router, json!({})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({
            "error": "Earth Engine not initialized",
            "message": "Service account credentials not configured"
        })
    );
    assert_eq!(mock.total_calls(), 0);
}
