use axum::{
    extract::{Request, State},
    http::HeaderName,
    middleware::Next,
    response::Response,
};

use super::Identity;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct IdentityState {
    pub header: HeaderName,
}

impl IdentityState {
    pub fn new(header: &str) -> AppResult<Self> {
        let header = HeaderName::from_bytes(header.trim().as_bytes())
            .map_err(|e| AppError::Config(format!("Invalid identity header '{}': {}", header, e)))?;
        Ok(Self { header })
    }
}

/// Rejects requests without an identity and exposes it to handlers as an
/// `Identity` extension.
pub async fn identity_middleware(
    State(state): State<IdentityState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = request
        .headers()
        .get(&state.header)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| Identity::new(h));

    let Some(identity) = identity else {
        tracing::warn!(
            header = %state.header,
            uri = %request.uri(),
            "Rejected request without identity"
        );
        return Err(AppError::Unauthorized(format!(
            "Missing or empty {} header",
            state.header
        )));
    };

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
