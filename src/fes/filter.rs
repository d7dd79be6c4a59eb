//! OGC Filter Encoding predicates and the identity merge.

use super::xml::{Element, NamespaceScope, Node};
use crate::error::{AppError, AppResult};

pub const FES_NS: &str = "http://www.opengis.net/ogc";
pub const GML_NS: &str = "http://www.opengis.net/gml";

const FES: &str = "fes";
const GML: &str = "gml";

fn fes(local_name: &str) -> Element {
    Element::new(format!("{}:{}", FES, local_name))
}

fn declared_fes(local_name: &str) -> Element {
    fes(local_name).with_namespace(FES, FES_NS)
}

/// The `property == value` constraint restricting results to one caller
#[derive(Debug, Clone, Copy)]
pub struct IdentityConstraint<'a> {
    pub property: &'a str,
    pub value: &'a str,
}

impl IdentityConstraint<'_> {
    /// `fes:PropertyIsEqualTo`, declaring the `fes` prefix on itself when
    /// it is going to live inside a foreign filter.
    pub fn predicate(&self, declare_namespace: bool) -> Element {
        let root = if declare_namespace {
            declared_fes("PropertyIsEqualTo")
        } else {
            fes("PropertyIsEqualTo")
        };

        root.with_child(fes("PropertyName").with_text(self.property))
            .with_child(fes("Literal").with_text(self.value))
    }

    /// A complete filter for a query that had none
    pub fn filter(&self) -> Element {
        declared_fes("Filter").with_child(self.predicate(false))
    }
}

/// A KVP `bbox` value. Coordinates keep the client's spelling.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub min_x: String,
    pub min_y: String,
    pub max_x: String,
    pub max_y: String,
    pub crs: String,
}

impl BoundingBox {
    /// Parse `minx,miny,maxx,maxy[,crs]`
    pub fn parse(value: &str, default_crs: &str) -> AppResult<Self> {
        let parts: Vec<&str> = value.split(',').map(str::trim).collect();
        if parts.len() != 4 && parts.len() != 5 {
            return Err(AppError::invalid_parameter(
                "bbox",
                "bbox must have 4 values: minx,miny,maxx,maxy[,crs]",
            ));
        }

        let mut coords = [0.0f64; 4];
        for (i, part) in parts.iter().take(4).enumerate() {
            coords[i] = part
                .parse::<f64>()
                .ok()
                .filter(|c| c.is_finite())
                .ok_or_else(|| {
                    AppError::invalid_parameter(
                        "bbox",
                        format!("Invalid bbox coordinate '{}': must be a finite number", part),
                    )
                })?;
        }

        if coords[0] > coords[2] {
            return Err(AppError::invalid_parameter(
                "bbox",
                "bbox minx must not exceed maxx",
            ));
        }
        if coords[1] > coords[3] {
            return Err(AppError::invalid_parameter(
                "bbox",
                "bbox miny must not exceed maxy",
            ));
        }

        let crs = match parts.get(4) {
            Some(crs) if !crs.is_empty() => crs.to_string(),
            _ => default_crs.to_string(),
        };

        Ok(Self {
            min_x: parts[0].to_string(),
            min_y: parts[1].to_string(),
            max_x: parts[2].to_string(),
            max_y: parts[3].to_string(),
            crs,
        })
    }

    pub fn predicate(&self) -> Element {
        let envelope = Element::new(format!("{}:Envelope", GML))
            .with_namespace(GML, GML_NS)
            .with_attribute("srsName", self.crs.as_str())
            .with_child(
                Element::new(format!("{}:lowerCorner", GML))
                    .with_text(format!("{} {}", self.min_x, self.min_y)),
            )
            .with_child(
                Element::new(format!("{}:upperCorner", GML))
                    .with_text(format!("{} {}", self.max_x, self.max_y)),
            );

        declared_fes("BBOX").with_child(envelope)
    }
}

pub fn feature_id_predicate(fid: &str) -> Element {
    declared_fes("FeatureId").with_attribute("fid", fid)
}

/// `Filter(And(predicates..., identity))`
pub fn conjunction_filter(predicates: Vec<Element>, identity: &IdentityConstraint<'_>) -> Element {
    let mut and = declared_fes("And");
    and.children.extend(predicates.into_iter().map(Node::Element));
    and.children.push(identity.predicate(true).into());

    declared_fes("Filter").with_child(and)
}

/// Merge the identity constraint into a client supplied `Filter` element.
///
/// A lone `And` gets the identity appended; anything else is wrapped in a
/// new `And` that starts with the identity. `scope` holds the namespace
/// declarations in force around `filter`.
pub fn inject_identity(
    filter: &mut Element,
    identity: &IdentityConstraint<'_>,
    scope: &NamespaceScope,
) {
    let element_count = filter.child_elements().count();

    if element_count == 0 {
        filter.children.push(identity.predicate(true).into());
        return;
    }

    if element_count == 1 {
        if let Some(and) = filter.find_child_mut("And") {
            and.children.push(identity.predicate(true).into());
            return;
        }
    }

    let scope = scope.enter(filter);
    // Unqualified unless that would put it in a foreign default namespace
    let and_name = match (filter.prefix(), scope.resolve("").filter(|uri| !uri.is_empty())) {
        (Some(prefix), Some(_)) => format!("{}:And", prefix),
        _ => "And".to_string(),
    };
    let mut and = Element::new(and_name).with_child(identity.predicate(true));
    for mut node in std::mem::take(&mut filter.children) {
        if let Node::Element(moved) = &mut node {
            redeclare_prefix(moved, &scope);
        }
        and.children.push(node);
    }
    filter.children.push(and.into());
}

/// Moved elements carry their own prefix declaration so the fragment stays
/// readable on its own.
fn redeclare_prefix(element: &mut Element, scope: &NamespaceScope) {
    let Some(prefix) = element.prefix() else {
        return;
    };
    if element.declares(prefix) {
        return;
    }
    if let Some(uri) = scope.resolve(prefix) {
        let declaration = (prefix.to_string(), uri.to_string());
        element.namespaces.insert(0, declaration);
    }
}
