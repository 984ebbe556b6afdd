use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::ValidationError;
use crate::models::{BotInfo, GuildInfo};

const CDN_URL: &str = "https://cdn.discordapp.com";
// 2015-01-01T00:00:00Z in milliseconds
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// Validates a credential against the external service and returns the
/// profile it belongs to.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn check(&self, token: &str) -> Result<BotInfo, ValidationError>;
}

// Discord REST payloads, only the fields we need
#[derive(Deserialize, Debug)]
struct DiscordUser {
    id: String,
    username: Option<String>,
    avatar: Option<String>,
    #[serde(default)]
    bot: bool,
    #[serde(default)]
    verified: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct PartialGuild {
    id: String,
}

#[derive(Deserialize, Debug)]
struct DiscordGuild {
    id: String,
    name: Option<String>,
    icon: Option<String>,
    approximate_member_count: Option<u64>,
    owner_id: String,
    #[serde(default)]
    features: Vec<String>,
}

// Bot token validator backed by the Discord REST API
pub struct DiscordValidator {
    client: reqwest::Client,
    api_url: String,
}

impl DiscordValidator {
    pub fn new(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T, ValidationError> {
        let res = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .header(AUTHORIZATION, format!("Bot {token}"))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        match res.status() {
            status if status.is_success() => Ok(res.json::<T>().await?),
            StatusCode::UNAUTHORIZED => Err(ValidationError::InvalidToken),
            status => Err(ValidationError::UnexpectedStatus(status)),
        }
    }
}

#[async_trait]
impl CredentialValidator for DiscordValidator {
    async fn check(&self, token: &str) -> Result<BotInfo, ValidationError> {
        let user: DiscordUser = self.get("/users/@me", token).await?;
        let partial: Vec<PartialGuild> = self.get("/users/@me/guilds", token).await?;
        debug!(user = %user.id, guilds = partial.len(), "fetched bot user");

        let mut guilds = Vec::with_capacity(partial.len());
        for PartialGuild { id } in partial {
            let guild: DiscordGuild = self
                .get(&format!("/guilds/{id}?with_counts=true"), token)
                .await
                .map_err(|source| ValidationError::Guild {
                    id: id.clone(),
                    source: Box::new(source),
                })?;
            guilds.push(guild_info(guild));
        }

        Ok(bot_info(user, guilds))
    }
}

fn bot_info(user: DiscordUser, guilds: Vec<GuildInfo>) -> BotInfo {
    BotInfo {
        avatar_url: avatar_url(&user.id, user.avatar.as_deref()),
        created_at: snowflake_created_at(&user.id).unwrap_or_default(),
        username: user.username.unwrap_or_else(|| "Unknown".to_string()),
        is_bot: user.bot,
        is_verified: user.verified.unwrap_or(false),
        id: user.id,
        guilds,
    }
}

fn guild_info(guild: DiscordGuild) -> GuildInfo {
    GuildInfo {
        icon_url: guild
            .icon
            .as_deref()
            .map(|hash| format!("{CDN_URL}/icons/{}/{hash}.{}?size=128", guild.id, image_ext(hash))),
        name: guild.name.unwrap_or_else(|| "Unknown Server".to_string()),
        member_count: guild.approximate_member_count.unwrap_or(0),
        owner_id: guild.owner_id,
        features: guild.features,
        id: guild.id,
    }
}

fn avatar_url(user_id: &str, avatar: Option<&str>) -> String {
    match avatar {
        Some(hash) => format!("{CDN_URL}/avatars/{user_id}/{hash}.{}?size=512", image_ext(hash)),
        None => {
            let index = user_id.parse::<u64>().map(|id| (id >> 22) % 6).unwrap_or(0);
            format!("{CDN_URL}/embed/avatars/{index}.png")
        }
    }
}

// animated hashes are prefixed with a_
fn image_ext(hash: &str) -> &'static str {
    if hash.starts_with("a_") { "gif" } else { "png" }
}

fn snowflake_created_at(id: &str) -> Option<DateTime<Utc>> {
    let id = id.parse::<u64>().ok()?;
    let millis = i64::try_from((id >> 22) + DISCORD_EPOCH_MS).ok()?;
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_timestamp() {
        // example id from the Discord docs
        let created = snowflake_created_at("175928847299117063").unwrap();
        assert_eq!(created.to_rfc3339(), "2016-04-30T11:18:25.796+00:00");
        assert!(snowflake_created_at("not-a-number").is_none());
    }

    #[test]
    fn avatar_urls() {
        assert_eq!(
            avatar_url("175928847299117063", Some("abc")),
            "https://cdn.discordapp.com/avatars/175928847299117063/abc.png?size=512"
        );
        assert_eq!(
            avatar_url("175928847299117063", Some("a_abc")),
            "https://cdn.discordapp.com/avatars/175928847299117063/a_abc.gif?size=512"
        );
        // (175928847299117063 >> 22) % 6 == 41944705796 % 6 == 2
        assert_eq!(
            avatar_url("175928847299117063", None),
            "https://cdn.discordapp.com/embed/avatars/2.png"
        );
    }

    #[test]
    fn user_payload_maps_to_bot_info() {
        let user: DiscordUser = serde_json::from_value(serde_json::json!({
            "id": "175928847299117063",
            "username": "gatekeeper",
            "avatar": null,
            "bot": true
        }))
        .unwrap();
        let info = bot_info(user, Vec::new());
        assert_eq!(info.username, "gatekeeper");
        assert!(info.is_bot);
        assert!(!info.is_verified);
        assert!(info.guilds.is_empty());
    }

    #[test]
    fn guild_payload_defaults() {
        let guild: DiscordGuild = serde_json::from_value(serde_json::json!({
            "id": "1",
            "name": null,
            "icon": "a_hash",
            "owner_id": "2"
        }))
        .unwrap();
        let info = guild_info(guild);
        assert_eq!(info.name, "Unknown Server");
        assert_eq!(info.member_count, 0);
        assert!(info.features.is_empty());
        assert_eq!(
            info.icon_url.as_deref(),
            Some("https://cdn.discordapp.com/icons/1/a_hash.gif?size=128")
        );
    }

    #[test]
    fn api_url_trailing_slash_is_trimmed() {
        let validator = DiscordValidator::new(reqwest::Client::new(), "https://discord.com/api/v10/");
        assert_eq!(validator.api_url, "https://discord.com/api/v10");
    }
}
