pub mod identity;
pub mod middleware;

pub use identity::*;
pub use middleware::*;
