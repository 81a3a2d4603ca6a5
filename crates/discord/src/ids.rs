//! Conversions between opaque string ids and Discord snowflakes.
//!
//! Anything that is not a non-zero `u64` maps to `None`, which the engine
//! treats as "not found".

use serenity::all::{ApplicationId, ChannelId, GuildId, MessageId, UserId};

fn snowflake(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id != 0)
}

#[must_use]
pub fn user_id(raw: &str) -> Option<UserId> {
    snowflake(raw).map(UserId::new)
}

#[must_use]
pub fn channel_id(raw: &str) -> Option<ChannelId> {
    snowflake(raw).map(ChannelId::new)
}

#[must_use]
pub fn message_id(raw: &str) -> Option<MessageId> {
    snowflake(raw).map(MessageId::new)
}

#[must_use]
pub fn guild_id(raw: &str) -> Option<GuildId> {
    snowflake(raw).map(GuildId::new)
}

#[must_use]
pub fn application_id(raw: &str) -> Option<ApplicationId> {
    snowflake(raw).map(ApplicationId::new)
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("1084529316781838406", Some(1_084_529_316_781_838_406))]
    #[case(" 42 ", Some(42))]
    #[case("0", None)]
    #[case("<@42>", None)]
    #[case("", None)]
    #[case("18446744073709551616", None)]
    fn parses_snowflakes(#[case] raw: &str, #[case] expected: Option<u64>) {
        assert_eq!(user_id(raw).map(|id| id.get()), expected);
        assert_eq!(channel_id(raw).map(|id| id.get()), expected);
    }

    #[test]
    fn message_and_guild_ids() {
        assert_eq!(message_id("7").map(|id| id.get()), Some(7));
        assert!(guild_id("guild").is_none());
        assert_eq!(application_id("99").map(|id| id.get()), Some(99));
    }
}
