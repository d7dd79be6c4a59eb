pub mod pep_service;
pub mod upstream;

pub use pep_service::PepService;
pub use upstream::{EchoUpstream, HttpUpstream, Upstream, UpstreamResponse};
