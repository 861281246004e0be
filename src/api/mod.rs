//! HTTP API module for the landing page, health check and layer endpoint.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
