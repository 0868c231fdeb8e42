//! Transformations applied to the catalog and to messages before they reach the destination.

mod base;
mod namespacing;

pub use base::{IdentityMapper, MessageMapper};
pub use namespacing::{NamespacingMapper, SOURCE_NAMESPACE_PLACEHOLDER};
