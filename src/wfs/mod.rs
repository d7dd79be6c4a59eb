pub mod kvp;
pub mod operation;
pub mod post;

pub use kvp::KvpRequest;
pub use operation::{Access, Operation};

use crate::auth::Identity;
use crate::config::FilterConfig;
use crate::fes::IdentityConstraint;

/// How the identity constraint is expressed for this deployment
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    pub identity_property: String,
    pub default_bbox_crs: String,
}

impl FilterPolicy {
    pub fn constraint<'a>(&'a self, identity: &'a Identity) -> IdentityConstraint<'a> {
        IdentityConstraint {
            property: &self.identity_property,
            value: identity.as_str(),
        }
    }
}

impl From<&FilterConfig> for FilterPolicy {
    fn from(config: &FilterConfig) -> Self {
        Self {
            identity_property: config.identity_property.clone(),
            default_bbox_crs: config.default_bbox_crs.clone(),
        }
    }
}
