use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Token check request body (both endpoints)
#[derive(Deserialize, Debug, Default, Clone)]
pub struct TokenRequest {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

// Bot profile returned on a valid token
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BotInfo {
    pub id: String,
    pub username: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
    pub is_bot: bool,
    pub is_verified: bool,
    pub guilds: Vec<GuildInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GuildInfo {
    pub id: String,
    pub name: String,
    pub icon_url: Option<String>,
    pub member_count: u64,
    pub owner_id: String,
    pub features: Vec<String>,
}

// Response body - `data` on success, `error` otherwise
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TokenCheckResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BotInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenCheckResponse {
    pub fn valid(data: BotInfo) -> Self {
        Self {
            valid: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
