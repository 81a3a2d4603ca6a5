//! Discord binding for msgsync.
//!
//! Implements the channel collaborator traits on top of serenity's REST
//! client, registers the `/sync` and `/forward` guild commands, and routes
//! gateway events into [`msgsync_sync::SyncService`].

pub mod bot;
pub mod commands;
pub mod error;
pub mod handler;
pub mod ids;
pub mod transport;

pub use {
    bot::run,
    error::{Error, Result},
    handler::DiscordHandler,
    transport::DiscordTransport,
};
