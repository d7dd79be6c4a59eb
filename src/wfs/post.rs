//! XML (POST) encoded `GetFeature` requests.

use super::FilterPolicy;
use crate::auth::Identity;
use crate::error::{AppError, AppResult};
use crate::fes::{Element, NamespaceScope, Node, inject_identity};

/// Inject the identity constraint into every `Query` of a `GetFeature`
/// document. The document keeps its formatting apart from the filters.
pub fn rewrite_get_feature_document(
    root: &mut Element,
    policy: &FilterPolicy,
    identity: &Identity,
) -> AppResult<()> {
    let constraint = policy.constraint(identity);
    let scope = NamespaceScope::default().enter(root);
    let mut type_names = Vec::new();

    for child in root.child_elements_mut() {
        match child.local_name() {
            "Query" => {}
            // Stored queries run server side filters we cannot constrain
            "StoredQuery" => {
                return Err(AppError::AccessDenied(
                    "Stored queries are not available through this service".to_string(),
                ));
            }
            _ => continue,
        }

        let type_name = child
            .attribute("typeName")
            .or_else(|| child.attribute("typeNames"))
            .ok_or_else(|| AppError::MissingParameterValue("typeName".to_string()))?;
        type_names.push(type_name.to_string());

        let filter_count = child
            .child_elements()
            .filter(|e| e.local_name() == "Filter")
            .count();
        if filter_count > 1 {
            return Err(AppError::invalid_parameter(
                "Filter",
                format!("Query for {} has more than one Filter", type_name),
            ));
        }

        let query_scope = scope.enter(child);
        match child.find_child_mut("Filter") {
            Some(filter) => inject_identity(filter, &constraint, &query_scope),
            None => insert_filter(child, constraint.filter()),
        }
    }

    if type_names.is_empty() {
        return Err(AppError::MissingParameterValue("Query".to_string()));
    }

    tracing::debug!(type_names = ?type_names, "Rewrote XML GetFeature request");

    Ok(())
}

/// `Query` content is ordered `PropertyName*, Filter?, SortBy?`
fn insert_filter(query: &mut Element, filter: Element) {
    let sort_by = query
        .children
        .iter()
        .position(|node| matches!(node, Node::Element(e) if e.local_name() == "SortBy"));

    match sort_by {
        Some(index) => query.children.insert(index, filter.into()),
        None => query.children.push(filter.into()),
    }
}
