//! KVP (GET / form) encoded WFS requests.

use url::form_urlencoded;

use super::{FilterPolicy, Operation};
use crate::auth::Identity;
use crate::error::{AppError, AppResult};
use crate::fes::xml::{parse_document, serialize};
use crate::fes::{
    BoundingBox, Element, NamespaceScope, conjunction_filter, feature_id_predicate,
    inject_identity,
};

const TYPE_NAME_KEYS: [&str; 2] = ["typeName", "typeNames"];

/// Parameters that decide what the upstream returns. Each group may appear
/// once, otherwise the upstream could act on a value that was never checked.
const SINGLE_VALUED: [&[&str]; 6] = [
    &["request"],
    &TYPE_NAME_KEYS,
    &["filter"],
    &["bbox"],
    &["featureid"],
    &["resourceid"],
];

/// Request parameters in client order. Keys compare case-insensitively,
/// as WFS requires, but keep their original spelling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KvpRequest {
    params: Vec<(String, String)>,
}

impl KvpRequest {
    pub fn from_query(query: &str) -> Self {
        Self {
            params: form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Remove every occurrence of `key`, returning the first value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let mut removed = None;
        self.params.retain_mut(|(k, v)| {
            if !k.eq_ignore_ascii_case(key) {
                return true;
            }
            if removed.is_none() {
                removed = Some(std::mem::take(v));
            }
            false
        });
        removed
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push((key.into(), value.into()));
    }

    /// Reject requests repeating a parameter from `SINGLE_VALUED`.
    /// `typeName` and `typeNames` count as the same parameter.
    pub fn ensure_single_valued(&self) -> AppResult<()> {
        for keys in SINGLE_VALUED {
            let count = self
                .params
                .iter()
                .filter(|(k, _)| keys.iter().any(|key| k.eq_ignore_ascii_case(key)))
                .count();
            if count > 1 {
                return Err(AppError::invalid_parameter(
                    keys[0],
                    format!("{} must be given at most once", keys.join("/")),
                ));
            }
        }
        Ok(())
    }

    pub fn operation(&self) -> AppResult<Operation> {
        self.get("request")
            .filter(|r| !r.trim().is_empty())
            .map(Operation::from_name)
            .ok_or_else(|| AppError::MissingParameterValue("request".to_string()))
    }

    pub fn type_names(&self) -> AppResult<Vec<String>> {
        let value = TYPE_NAME_KEYS
            .iter()
            .find_map(|key| self.get(key))
            .ok_or_else(|| AppError::MissingParameterValue("typeName".to_string()))?;
        split_list("typeName", value)
    }

    /// Form-urlencoded query for the upstream WFS
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish()
    }

    /// `key=value;key=value`, the format the development echo backend answers with
    pub fn to_echo(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Split a comma separated KVP list, rejecting empty entries
pub fn split_list(locator: &str, value: &str) -> AppResult<Vec<String>> {
    let items: Vec<String> = value.split(',').map(|s| s.trim().to_string()).collect();
    if items.iter().any(String::is_empty) {
        return Err(AppError::invalid_parameter(
            locator,
            format!("Empty entry in list '{}'", value),
        ));
    }
    Ok(items)
}

/// Split a `filter` value into one document per type name.
///
/// Accepts a bare document, or a list of parenthesised documents written
/// either `(<F/>)(<F/>)` or `(<F/>),(<F/>)`.
pub fn split_filters(value: &str) -> AppResult<Vec<&str>> {
    let value = value.trim();
    if !value.starts_with('(') {
        return Ok(vec![value]);
    }

    let malformed = || AppError::invalid_parameter("filter", "Malformed filter list");

    let mut filters = Vec::new();
    let mut rest = value;
    while !rest.is_empty() {
        let body = rest.strip_prefix('(').ok_or_else(malformed)?;
        let end = find_item_end(body).ok_or_else(malformed)?;
        filters.push(body[..end].trim());

        rest = body[end + 1..].trim_start();
        if let Some(after_comma) = rest.strip_prefix(',') {
            rest = after_comma.trim_start();
        }
    }

    Ok(filters)
}

/// The `)` closing a list item follows a tag and precedes the next item or the end
fn find_item_end(body: &str) -> Option<usize> {
    body.match_indices(')').map(|(i, _)| i).find(|&i| {
        let before = body[..i].trim_end();
        let after = body[i + 1..].trim_start();
        let next_item = after.is_empty()
            || after.starts_with('(')
            || after
                .strip_prefix(',')
                .is_some_and(|a| a.trim_start().starts_with('('));
        before.ends_with('>') && next_item
    })
}

fn take_non_empty(request: &mut KvpRequest, key: &str) -> Option<String> {
    request.remove(key).filter(|v| !v.trim().is_empty())
}

/// Replace any `filter`, `bbox` or `featureid` parameter with a `FILTER`
/// holding one identity constrained filter per requested type name.
pub fn rewrite_get_feature(
    request: &mut KvpRequest,
    policy: &FilterPolicy,
    identity: &Identity,
) -> AppResult<()> {
    // Stored queries run server side filters we cannot constrain
    if request.get("storedquery_id").is_some() {
        return Err(AppError::AccessDenied(
            "Stored queries are not available through this service".to_string(),
        ));
    }
    if request.get("resourceid").is_some() {
        return Err(AppError::invalid_parameter(
            "resourceid",
            "resourceid is not supported, use featureid",
        ));
    }

    let type_names = request.type_names()?;

    let filter = take_non_empty(request, "filter");
    let bbox = take_non_empty(request, "bbox");
    let feature_ids = take_non_empty(request, "featureid");

    let supplied = [&filter, &bbox, &feature_ids]
        .iter()
        .filter(|v| v.is_some())
        .count();
    if supplied > 1 {
        return Err(AppError::invalid_parameter(
            "filter",
            "filter, bbox and featureid are mutually exclusive",
        ));
    }

    let constraint = policy.constraint(identity);

    let (kind, filters): (&str, Vec<Element>) = if let Some(filter) = filter {
        let documents = split_filters(&filter)?;
        if documents.len() != type_names.len() {
            return Err(AppError::invalid_parameter(
                "filter",
                format!(
                    "{} filters given for {} type names",
                    documents.len(),
                    type_names.len()
                ),
            ));
        }

        let filters = documents
            .into_iter()
            .map(|document| {
                let mut root = parse_document(document)?;
                if root.local_name() != "Filter" {
                    return Err(AppError::invalid_parameter(
                        "filter",
                        format!("Expected a Filter element, found {}", root.name),
                    ));
                }
                inject_identity(&mut root, &constraint, &NamespaceScope::default());
                Ok(root)
            })
            .collect::<AppResult<Vec<_>>>()?;
        ("filter", filters)
    } else if let Some(bbox) = bbox {
        let bbox = BoundingBox::parse(&bbox, &policy.default_bbox_crs)?;
        let filters = type_names
            .iter()
            .map(|_| conjunction_filter(vec![bbox.predicate()], &constraint))
            .collect();
        ("bbox", filters)
    } else if let Some(feature_ids) = feature_ids {
        let ids = split_list("featureid", &feature_ids)?;
        let filters = type_names
            .iter()
            .map(|_| {
                let predicates = ids.iter().map(|id| feature_id_predicate(id)).collect();
                conjunction_filter(predicates, &constraint)
            })
            .collect();
        ("featureid", filters)
    } else {
        let filters = type_names.iter().map(|_| constraint.filter()).collect();
        ("identity", filters)
    };

    let value = filters
        .iter()
        .map(|f| format!("({})", serialize(f)))
        .collect::<Vec<_>>()
        .join(",");
    request.push("FILTER", value);

    tracing::debug!(
        type_names = ?type_names,
        kind,
        "Rewrote KVP GetFeature request"
    );

    Ok(())
}
