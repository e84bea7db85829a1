//! Legacy REST API module, kept for endpoints the modern API does not cover.
//! Same calling convention as the rest of the request/response modules; the
//! flat legacy models live here and nowhere else.

use cb_core::{RestClient, RestError};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.twitch.tv/kraken";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    #[serde(rename = "_id")]
    pub id: u64,
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub views: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    #[serde(rename = "_id")]
    pub id: u64,
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

pub struct KrakenClient {
    rest: RestClient,
}

impl KrakenClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Channel, RestError> {
        debug!(channel_id, "fetching legacy channel");
        self.rest
            .get(&format!("/channels/{channel_id}"), &[])
            .await
    }

    pub async fn get_team(&self, team_name: &str) -> Result<Team, RestError> {
        self.rest.get(&format!("/teams/{team_name}"), &[]).await
    }
}
