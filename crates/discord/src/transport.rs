//! Discord implementation of the channel collaborator traits.

use std::{collections::HashSet, sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    serenity::all::{
        Channel, ChannelId, ChannelType, CreateAttachment, CreateMessage, EditMessage, GuildId,
        Http, Message, MessageId, MessageReference,
    },
    tracing::debug,
};

use msgsync_channels::{
    Attachment, Author, ChannelDirectory, ChannelHandle, ChannelKind, ChannelOutbound,
    ConversationHandle, DeliveredCopy, Destination, Error, OriginMessage, OutboundMessage, Result,
    SearchScope,
};

use crate::{handler::clamp_content, ids};

/// REST-backed directory and outbound for one guild.
pub struct DiscordTransport {
    http: Arc<Http>,
    /// Guild searched when a message is looked up in every channel.
    guild_id: GuildId,
    downloads: reqwest::Client,
}

impl DiscordTransport {
    /// `download_timeout` bounds each attachment fetch from the CDN.
    pub fn new(
        http: Arc<Http>,
        guild_id: GuildId,
        download_timeout: Duration,
    ) -> reqwest::Result<Self> {
        let downloads = reqwest::Client::builder()
            .timeout(download_timeout)
            .build()?;
        Ok(Self {
            http,
            guild_id,
            downloads,
        })
    }

    async fn find_in_channel(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<OriginMessage>> {
        match channel_id.message(&self.http, message_id).await {
            Ok(message) => Ok(Some(origin_from(message))),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(Error::external(format!("fetch message {message_id}"), e)),
        }
    }

    /// Searches the guild's text channels, then its active threads.
    async fn find_in_guild(&self, message_id: MessageId) -> Result<Option<OriginMessage>> {
        let channels = self
            .guild_id
            .channels(&self.http)
            .await
            .map_err(|e| Error::external(format!("list channels of guild {}", self.guild_id), e))?;
        let threads = match self.guild_id.get_active_threads(&self.http).await {
            Ok(data) => data.threads,
            Err(e) => {
                debug!(guild_id = %self.guild_id, error = %e, "cannot list active threads");
                Vec::new()
            },
        };

        let candidates = search_order(
            channels
                .values()
                .filter(|c| c.is_text_based())
                .map(|c| c.id),
            threads.iter().map(|t| t.id),
        );
        for channel_id in candidates {
            match self.find_in_channel(channel_id, message_id).await {
                Ok(Some(origin)) => return Ok(Some(origin)),
                Ok(None) => {},
                Err(e) => debug!(channel_id = %channel_id, error = %e, "skipping channel"),
            }
        }
        Ok(None)
    }

    async fn download(&self, attachment: &Attachment) -> Result<CreateAttachment> {
        let fetch_err = |e| Error::external(format!("download attachment {}", attachment.url), e);
        let bytes = self
            .downloads
            .get(&attachment.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(fetch_err)?
            .bytes()
            .await
            .map_err(fetch_err)?;
        Ok(CreateAttachment::bytes(bytes.to_vec(), attachment.name.clone()))
    }
}

#[async_trait]
impl ChannelDirectory for DiscordTransport {
    async fn resolve_private_conversation(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationHandle>> {
        let Some(user) = ids::user_id(user_id) else {
            return Ok(None);
        };
        match user.create_dm_channel(&self.http).await {
            Ok(channel) => Ok(Some(ConversationHandle {
                id: channel.id.to_string(),
                user_id: user.to_string(),
            })),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(Error::external(format!("open DM with {user}"), e)),
        }
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelHandle>> {
        let Some(id) = ids::channel_id(channel_id) else {
            return Ok(None);
        };
        match id.to_channel(&self.http).await {
            Ok(Channel::Guild(channel)) => Ok(Some(ChannelHandle {
                id: channel.id.to_string(),
                name: Some(channel.name.clone()),
                kind: if channel.kind == ChannelType::Text {
                    ChannelKind::Text
                } else {
                    ChannelKind::Other
                },
            })),
            Ok(Channel::Private(channel)) => Ok(Some(ChannelHandle {
                id: channel.id.to_string(),
                name: None,
                kind: ChannelKind::Private,
            })),
            Ok(_) => Ok(None),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(Error::external(format!("resolve channel {id}"), e)),
        }
    }

    async fn fetch_message(
        &self,
        message_id: &str,
        scope: &SearchScope,
    ) -> Result<Option<OriginMessage>> {
        let Some(message_id) = ids::message_id(message_id) else {
            return Ok(None);
        };
        match scope {
            SearchScope::AllChannels => self.find_in_guild(message_id).await,
            SearchScope::Channel(raw) => match ids::channel_id(raw) {
                Some(channel_id) => self.find_in_channel(channel_id, message_id).await,
                None => Ok(None),
            },
        }
    }
}

#[async_trait]
impl ChannelOutbound for DiscordTransport {
    async fn send_message(
        &self,
        target: &Destination,
        message: OutboundMessage,
    ) -> Result<DeliveredCopy> {
        let channel_id = ids::channel_id(target.id())
            .ok_or_else(|| Error::invalid_input(format!("bad channel id '{}'", target.id())))?;

        let mut builder = CreateMessage::new().content(clamp_content(&message.content));
        for attachment in &message.attachments {
            builder = builder.add_file(self.download(attachment).await?);
        }
        if let Some(reply_to) = message.reply_to.as_deref().and_then(ids::message_id) {
            builder = builder.reference_message(MessageReference::from((channel_id, reply_to)));
        }

        let sent = channel_id
            .send_message(&self.http, builder)
            .await
            .map_err(|e| classify(format!("send message to {channel_id}"), e))?;
        Ok(DeliveredCopy::new(
            sent.id.to_string(),
            sent.channel_id.to_string(),
            sent.content,
        ))
    }

    async fn edit_message(&self, copy: &DeliveredCopy, new_content: &str) -> Result<()> {
        let (Some(channel_id), Some(message_id)) = (
            ids::channel_id(&copy.conversation_id),
            ids::message_id(&copy.id),
        ) else {
            return Err(Error::invalid_input(format!(
                "bad message reference {}/{}",
                copy.conversation_id, copy.id
            )));
        };

        channel_id
            .edit_message(
                &self.http,
                message_id,
                EditMessage::new().content(clamp_content(new_content)),
            )
            .await
            .map(|_| ())
            .map_err(|e| classify(format!("edit message {message_id}"), e))
    }
}

/// Channels first, then threads, each id once.
fn search_order(
    channels: impl Iterator<Item = ChannelId>,
    threads: impl Iterator<Item = ChannelId>,
) -> Vec<ChannelId> {
    let mut seen = HashSet::new();
    channels.chain(threads).filter(|id| seen.insert(*id)).collect()
}

fn origin_from(message: Message) -> OriginMessage {
    OriginMessage {
        id: message.id.to_string(),
        channel_id: message.channel_id.to_string(),
        author: Author {
            id: message.author.id.to_string(),
            name: message.author.name.clone(),
            is_bot: message.author.bot,
        },
        content: message.content,
    }
}

fn http_status(err: &serenity::Error) -> Option<u16> {
    match err {
        serenity::Error::Http(e) => e.status_code().map(|status| status.as_u16()),
        _ => None,
    }
}

/// 404 (unknown) and 403 (no access) both mean the bot cannot reach the target.
fn is_missing(err: &serenity::Error) -> bool {
    matches!(http_status(err), Some(403 | 404))
}

fn classify(context: String, err: serenity::Error) -> Error {
    if is_missing(&err) {
        Error::not_found(context)
    } else {
        Error::external(context, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ChannelId> {
        raw.iter().copied().map(ChannelId::new).collect()
    }

    #[test]
    fn threads_are_searched_after_channels() {
        let order = search_order(ids(&[1, 2]).into_iter(), ids(&[10, 11]).into_iter());
        assert_eq!(order, ids(&[1, 2, 10, 11]));
    }

    #[test]
    fn repeated_ids_are_searched_once() {
        let order = search_order(ids(&[1, 2]).into_iter(), ids(&[2, 3, 3]).into_iter());
        assert_eq!(order, ids(&[1, 2, 3]));
    }
}
