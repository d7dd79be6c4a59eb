use std::sync::Arc;

use super::upstream::{Upstream, UpstreamResponse};
use crate::auth::Identity;
use crate::error::{AppError, AppResult};
use crate::fes::xml::{parse_document, serialize};
use crate::wfs::{Access, FilterPolicy, KvpRequest, Operation, kvp, post};

/// Applies the access policy to WFS requests and forwards what survives.
pub struct PepService {
    upstream: Arc<dyn Upstream>,
    policy: FilterPolicy,
}

impl PepService {
    pub fn new(upstream: Arc<dyn Upstream>, policy: FilterPolicy) -> Self {
        Self { upstream, policy }
    }

    /// Handle a KVP encoded request (query string or form body)
    pub async fn handle_kvp(&self, query: &str, identity: &Identity) -> AppResult<UpstreamResponse> {
        let mut request = KvpRequest::from_query(query);
        request.ensure_single_valued()?;
        let operation = request.operation()?;

        match authorize(&operation, identity)? {
            Access::Rewrite => kvp::rewrite_get_feature(&mut request, &self.policy, identity)?,
            _ => {
                tracing::debug!(operation = operation.name(), "Passing KVP request through");
            }
        }

        self.upstream.forward_get(&request).await
    }

    /// Handle an XML encoded request body
    pub async fn handle_xml(&self, body: &str, identity: &Identity) -> AppResult<UpstreamResponse> {
        let mut root = parse_document(body)?;
        let operation = Operation::from_name(root.local_name());

        match authorize(&operation, identity)? {
            Access::Rewrite => {
                post::rewrite_get_feature_document(&mut root, &self.policy, identity)?;
                self.upstream.forward_post(serialize(&root)).await
            }
            _ => {
                tracing::debug!(operation = operation.name(), "Passing XML request through");
                self.upstream.forward_post(body.to_string()).await
            }
        }
    }
}

/// Returns the access level for an operation the caller may perform
fn authorize(operation: &Operation, identity: &Identity) -> AppResult<Access> {
    match operation.access() {
        Access::Deny => {
            tracing::warn!(
                operation = operation.name(),
                identity = %identity,
                "Denied WFS operation"
            );
            Err(AppError::AccessDenied(format!(
                "{} is not permitted",
                operation.name()
            )))
        }
        Access::Unsupported => Err(AppError::OperationNotSupported(
            operation.name().to_string(),
        )),
        access => Ok(access),
    }
}
