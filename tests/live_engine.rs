//! Live tests against Google Earth Engine.
//!
//! These tests require a service-account key with Earth Engine access at
//! SERVICE_ACCOUNT_KEY_PATH (default `service-account-key.json`).
//! Run with: cargo test --test live_engine -- --ignored
//!
//! Note: These tests call the real Earth Engine REST API.

use bloomwatch::composite::{CompositeBuilder, LayerParams, LayerRequest};
use bloomwatch::config::Config;
use bloomwatch::engine::{EarthEngineClient, ImageryBackend};
use bloomwatch::imagery::{CollectionQuery, DateWindow, Region};
use std::sync::Arc;

/// Get a test config from environment, if a key file exists.
fn test_config() -> Option<Config> {
    let config = Config::load().ok()?;
    if !config.service_account_key_path.exists() {
        return None;
    }
    Some(config)
}

async fn client() -> Option<EarthEngineClient> {
    let config = match test_config() {
        Some(c) => c,
        None => {
            println!("Skipping: service account key not found");
            return None;
        }
    };
    Some(
        EarthEngineClient::initialize(&config)
            .await
            .expect("Failed to authenticate"),
    )
}

#[tokio::test]
#[ignore = "requires a service account key"]
async fn test_probe_band_names() {
    let Some(client) = client().await else { return };

    let bands = client.probe().await.expect("Failed to compute band names");
    println!("Bands: {:?}", bands);
    assert_eq!(bands, vec!["elevation".to_string()]);
}

#[tokio::test]
#[ignore = "requires a service account key"]
async fn test_default_region_has_scenes() {
    let Some(client) = client().await else { return };

    let window = DateWindow::parse("2019-01-01", "2019-12-31").unwrap();
    let query = CollectionQuery::landsat8(Region::DEFAULT, window, 50.0);
    let count = client
        .collection_size(&query)
        .await
        .expect("Failed to count scenes");

    println!("Scenes: {}", count);
    assert!(count > 0);
}

#[tokio::test]
#[ignore = "requires a service account key"]
async fn test_build_default_layer() {
    let Some(client) = client().await else { return };

    let builder = CompositeBuilder::new(Arc::new(client), 50.0);
    let params = LayerParams::try_from(LayerRequest::default()).unwrap();
    let response = builder.build(&params).await.expect("Failed to build layer");

    println!("Tile URL: {}", response.tile_url);
    assert!(response.tile_url.ends_with("/tiles/{z}/{x}/{y}"));
    assert!(response.image_count > 0);
}
