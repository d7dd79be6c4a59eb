use axum::{
    Extension, Router,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::{AppError, AppResult};
use crate::services::{PepService, UpstreamResponse};

pub fn routes(path: &str, service: Arc<PepService>) -> Router {
    Router::new()
        .route(path, get(get_wfs).post(post_wfs))
        .with_state(service)
}

/// KVP request in the query string
async fn get_wfs(
    State(service): State<Arc<PepService>>,
    Extension(identity): Extension<Identity>,
    RawQuery(query): RawQuery,
) -> AppResult<UpstreamResponse> {
    service
        .handle_kvp(query.as_deref().unwrap_or_default(), &identity)
        .await
}

/// XML request body, or KVP when the body is form encoded
async fn post_wfs(
    State(service): State<Arc<PepService>>,
    Extension(identity): Extension<Identity>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<UpstreamResponse> {
    let body = std::str::from_utf8(&body)
        .map_err(|e| AppError::InvalidXml(format!("Request body is not UTF-8: {}", e)))?;

    if is_form_encoded(&headers) {
        service.handle_kvp(body, &identity).await
    } else {
        service.handle_xml(body, &identity).await
    }
}

fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut response = (status, self.body).into_response();

        if let Some(content_type) = self
            .content_type
            .and_then(|ct| HeaderValue::from_str(&ct).ok())
        {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }

        response
    }
}
