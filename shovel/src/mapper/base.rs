use crate::types::{ConfiguredCatalog, Message};

/// Rewrites what the source emits into what the destination expects.
///
/// Implementations must be one-in-one-out and must not reorder anything, the worker relies on
/// mapped records keeping the order in which the source emitted them.
pub trait MessageMapper {
    fn map_catalog(&self, catalog: ConfiguredCatalog) -> ConfiguredCatalog;

    fn map_message(&self, message: Message) -> Message;
}

/// Mapper forwarding everything unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl MessageMapper for IdentityMapper {
    fn map_catalog(&self, catalog: ConfiguredCatalog) -> ConfiguredCatalog {
        catalog
    }

    fn map_message(&self, message: Message) -> Message {
        message
    }
}
