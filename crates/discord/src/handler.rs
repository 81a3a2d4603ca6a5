//! Discord event handler for serenity.
//!
//! Translates gateway events into engine calls. Nothing here decides what
//! to do with a message; that lives in [`msgsync_sync`].

use std::sync::{Arc, OnceLock};

use {
    serenity::{
        all::{
            Context, EditInteractionResponse, EventHandler, GatewayIntents, GuildId, Interaction,
            Message, MessageUpdateEvent, Ready,
        },
        async_trait,
    },
    tracing::{debug, info, warn},
};

use {
    msgsync_channels::{Attachment, Author, InboundMessage, MessageEdit},
    msgsync_sync::SyncService,
};

use crate::commands;

/// Discord rejects message content longer than this.
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Filled once the client exists, since the transport needs the client's HTTP handle.
pub type ServiceSlot = Arc<OnceLock<Arc<SyncService>>>;

/// Handler for Discord gateway events.
pub struct DiscordHandler {
    guild_id: GuildId,
    service: ServiceSlot,
}

impl DiscordHandler {
    pub fn new(guild_id: GuildId, service: ServiceSlot) -> Self {
        Self { guild_id, service }
    }

    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    fn service(&self) -> Option<&SyncService> {
        let service = self.service.get().map(Arc::as_ref);
        if service.is_none() {
            warn!("event received before the sync service was installed");
        }
        service
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );

        match self
            .guild_id
            .set_commands(&ctx.http, commands::definitions())
            .await
        {
            Ok(registered) => info!(
                guild_id = %self.guild_id,
                count = registered.len(),
                "registered guild commands"
            ),
            Err(e) => warn!(guild_id = %self.guild_id, error = %e, "failed to register commands"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        let Some(service) = self.service() else {
            return;
        };

        // Dispatch can outlast the interaction deadline, so acknowledge first.
        if let Err(e) = command.defer_ephemeral(&ctx.http).await {
            warn!(command = %command.data.name, error = %e, "failed to defer interaction");
            return;
        }

        let invocation = commands::invocation_from(&command);
        debug!(command = %invocation.name, invoker = ?invocation.invoker_id, "command received");
        let reply = service.handle_command(&invocation).await;

        let response = EditInteractionResponse::new().content(clamp_content(&reply.content));
        if let Err(e) = command.edit_response(&ctx.http, response).await {
            warn!(command = %command.data.name, error = %e, "failed to send command reply");
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        let Some(service) = self.service() else {
            return;
        };
        let inbound = inbound_from(&msg);
        if let Some(outcome) = service.relay(&inbound).await {
            debug!(
                source = %inbound.id,
                channel_id = %outcome.channel_id,
                "relayed direct message"
            );
        }
    }

    async fn message_update(
        &self,
        _ctx: Context,
        old_if_available: Option<Message>,
        new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        let Some(service) = self.service() else {
            return;
        };
        let edit = MessageEdit {
            origin_id: event.id.to_string(),
            channel_id: event.channel_id.to_string(),
            old_content: old_if_available.map(|m| m.content),
            new_content: new.map(|m| m.content).or(event.content),
        };
        if let Some(report) = service.handle_edit(&edit).await {
            debug!(
                origin_id = %report.origin_id,
                updated = report.updated(),
                failed = report.failed(),
                "edit propagated"
            );
        }
    }
}

fn inbound_from(msg: &Message) -> InboundMessage {
    InboundMessage {
        id: msg.id.to_string(),
        channel_id: msg.channel_id.to_string(),
        author: Author {
            id: msg.author.id.to_string(),
            name: msg.author.name.clone(),
            is_bot: msg.author.bot || msg.author.system,
        },
        is_private: msg.guild_id.is_none(),
        content: msg.content.clone(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| Attachment {
                name: a.filename.clone(),
                url: a.url.clone(),
            })
            .collect(),
    }
}

/// Truncate to Discord's content limit on a character boundary.
#[must_use]
pub fn clamp_content(text: &str) -> String {
    match text.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
