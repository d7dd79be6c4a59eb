pub mod health;
pub mod wfs;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::auth::{IdentityState, identity_middleware};
use crate::config::Config;
use crate::error::AppResult;
use crate::services::PepService;

/// All routes of the proxy. Tracing, CORS and compression are added by the binary.
pub fn router(config: &Config, service: Arc<PepService>) -> AppResult<Router> {
    let identity = IdentityState::new(&config.identity_header)?;

    let protected_routes = wfs::routes(&config.wfs_path, service)
        .layer(middleware::from_fn_with_state(identity, identity_middleware));

    Ok(Router::new()
        .merge(health::routes())
        .merge(protected_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes)))
}
