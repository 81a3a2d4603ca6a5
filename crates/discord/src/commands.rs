//! Slash command registration and option extraction.

use serenity::all::{
    CommandDataOption, CommandDataOptionValue, CommandInteraction, CommandOptionType,
    CreateCommand, CreateCommandOption, UserId,
};

use msgsync_sync::{
    CommandInvocation,
    commands::{FORWARD_COMMAND, SYNC_COMMAND},
};

/// Guild commands registered when the bot becomes ready.
#[must_use]
pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new(SYNC_COMMAND)
            .description("Sync a message to a user's DMs")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "message",
                    "The message ID to sync",
                )
                .required(true),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "users",
                    "Users to sync the message to",
                )
                .required(true),
            ),
        CreateCommand::new(FORWARD_COMMAND)
            .description("Forward all messages sent to the bot to a designated channel")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Channel,
                    "channel",
                    "The channel to forward messages to",
                )
                .required(true),
            ),
    ]
}

pub fn invocation_from(command: &CommandInteraction) -> CommandInvocation {
    build_invocation(&command.data.name, &command.data.options, command.user.id)
}

fn build_invocation(
    name: &str,
    options: &[CommandDataOption],
    invoker: UserId,
) -> CommandInvocation {
    let mut invocation = CommandInvocation::new(name);
    invocation.invoker_id = Some(invoker.to_string());
    for option in options {
        if let Some(value) = option_value(&option.value) {
            invocation = invocation.with_option(option.name.clone(), value);
        }
    }
    invocation
}

/// Flatten an option to the string form the command layer expects.
/// Subcommands and attachments carry nothing we use.
fn option_value(value: &CommandDataOptionValue) -> Option<String> {
    match value {
        CommandDataOptionValue::String(s) => Some(s.clone()),
        CommandDataOptionValue::Channel(id) => Some(id.to_string()),
        CommandDataOptionValue::User(id) => Some(id.to_string()),
        CommandDataOptionValue::Role(id) => Some(id.to_string()),
        CommandDataOptionValue::Integer(n) => Some(n.to_string()),
        CommandDataOptionValue::Number(n) => Some(n.to_string()),
        CommandDataOptionValue::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        serenity::all::{AttachmentId, ChannelId},
    };

    #[test]
    fn registers_sync_and_forward() {
        let commands = serde_json::to_value(definitions()).unwrap();
        let names: Vec<_> = commands
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["sync", "forward"]);

        let sync_options = commands[0]["options"].as_array().unwrap();
        assert_eq!(sync_options.len(), 2);
        assert!(sync_options.iter().all(|o| o["required"] == true));
        assert_eq!(commands[1]["options"][0]["name"], "channel");
    }

    #[test]
    fn channel_option_becomes_its_id() {
        let value = CommandDataOptionValue::Channel(ChannelId::new(555));
        assert_eq!(option_value(&value).as_deref(), Some("555"));
    }

    #[test]
    fn string_option_is_kept_verbatim() {
        let value = CommandDataOptionValue::String("<@1> <@!2>".into());
        assert_eq!(option_value(&value).as_deref(), Some("<@1> <@!2>"));
    }

    #[test]
    fn attachments_are_ignored() {
        let value = CommandDataOptionValue::Attachment(AttachmentId::new(1));
        assert!(option_value(&value).is_none());
    }

    #[test]
    fn invocation_records_invoker() {
        let invocation = build_invocation(SYNC_COMMAND, &[], UserId::new(77));
        assert_eq!(invocation.name, "sync");
        assert_eq!(invocation.invoker_id.as_deref(), Some("77"));
        assert!(invocation.options.is_empty());
    }
}
