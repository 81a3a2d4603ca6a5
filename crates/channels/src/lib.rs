//! Platform-agnostic messaging types and the collaborator traits the sync
//! engine talks to.
//!
//! A transport (Discord, a test fake, ...) implements [`ChannelDirectory`]
//! for lookups and [`ChannelOutbound`] for sending and editing.

pub mod error;
pub mod plugin;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use {
    error::{Error, Result},
    plugin::{ChannelDirectory, ChannelOutbound},
    types::{
        Attachment, Author, ChannelHandle, ChannelKind, ConversationHandle, DeliveredCopy,
        Destination, InboundMessage, MessageEdit, OriginMessage, OutboundMessage, SearchScope,
        SharedCopy,
    },
};
