use std::sync::{Arc, OnceLock};

use {
    secrecy::ExposeSecret,
    serenity::{all::Client, cache::Settings as CacheSettings},
    tracing::{info, warn},
};

use {
    msgsync_channels::{ChannelDirectory, ChannelOutbound},
    msgsync_config::MsgsyncConfig,
    msgsync_sync::SyncService,
};

use crate::{
    error::{Error, Result},
    handler::DiscordHandler,
    ids,
    transport::DiscordTransport,
};

/// Connect to the gateway and serve events until ctrl-c or a fatal error.
///
/// The configuration is expected to have passed validation; a missing token
/// or guild id is still rejected here.
pub async fn run(config: MsgsyncConfig) -> Result<()> {
    let discord = &config.discord;
    if !discord.has_token() {
        return Err(Error::config("discord.token is required"));
    }
    let guild_id = discord
        .guild_id
        .as_deref()
        .and_then(ids::guild_id)
        .ok_or_else(|| Error::config("discord.guild_id must be a Discord id"))?;

    let slot = Arc::new(OnceLock::new());
    let handler = DiscordHandler::new(guild_id, Arc::clone(&slot));

    // Edits of uncached messages arrive without their previous content.
    let mut cache = CacheSettings::default();
    cache.max_messages = discord.message_cache_size;

    let mut builder = Client::builder(discord.token.expose_secret(), DiscordHandler::intents())
        .event_handler(handler)
        .cache_settings(cache);
    if let Some(application_id) = discord.application_id.as_deref().and_then(ids::application_id)
    {
        builder = builder.application_id(application_id);
    }
    let mut client = builder.await?;

    let transport = Arc::new(DiscordTransport::new(
        Arc::clone(&client.http),
        guild_id,
        config.sync.operation_timeout(),
    )?);
    let service = SyncService::new(
        Arc::clone(&transport) as Arc<dyn ChannelDirectory>,
        transport as Arc<dyn ChannelOutbound>,
        &config.sync,
    );
    if slot.set(Arc::new(service)).is_err() {
        return Err(Error::config("sync service installed twice"));
    }

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("shutting down");
        shard_manager.shutdown_all().await;
    });

    info!(
        guild_id = %guild_id,
        cache_messages = discord.message_cache_size,
        timeout_secs = config.sync.operation_timeout().as_secs(),
        "starting discord client"
    );
    client.start().await?;
    Ok(())
}
