pub mod filter;
pub mod xml;

pub use filter::*;
pub use xml::{Element, NamespaceScope, Node};
