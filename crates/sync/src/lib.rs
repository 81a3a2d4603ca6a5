//! Message sync and relay engine.
//!
//! Fans one origin message out to private conversations, keeps the copies in
//! step with later edits, and forwards inbound private messages to a single
//! configured channel. Platform access goes through the
//! [`msgsync_channels`] collaborator traits.

pub mod commands;
pub mod dispatcher;
pub mod propagator;
pub mod registry;
pub mod relay;
pub mod service;

pub use {
    commands::{CommandInvocation, CommandReply},
    dispatcher::{DeliveryStatus, DispatchReport, FanoutDispatcher, RecipientOutcome},
    propagator::{CopyOutcome, EditPropagator, EditStatus, PropagationReport},
    registry::{InMemorySyncRegistry, RecordId, SyncRecord, SyncRegistry},
    relay::{RelayOutcome, RelayRouter, RelayTarget},
    service::SyncService,
};
