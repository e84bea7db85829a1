//! Modern REST API module. A stateless request/response client delegating to
//! the shared calling convention in `cb-core`; no wire-format guarantees
//! beyond the typed models below.

mod models;

use cb_core::{RestClient, RestError};
use tracing::debug;

pub use models::{Paginated, Pagination, Stream, User, Video};

pub const DEFAULT_BASE_URL: &str = "https://api.twitch.tv/helix";

pub struct HelixClient {
    rest: RestClient,
}

impl std::fmt::Debug for HelixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelixClient").finish_non_exhaustive()
    }
}

impl HelixClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Looks up users by login name.
    pub async fn get_users(&self, logins: &[&str]) -> Result<Paginated<User>, RestError> {
        let query: Vec<(&str, String)> = logins
            .iter()
            .map(|login| ("login", (*login).to_string()))
            .collect();
        debug!(count = logins.len(), "fetching users");
        self.rest.get("/users", &query).await
    }

    /// Live streams for the given user logins, newest first.
    pub async fn get_streams(
        &self,
        user_logins: &[&str],
        first: Option<u32>,
    ) -> Result<Paginated<Stream>, RestError> {
        let mut query: Vec<(&str, String)> = user_logins
            .iter()
            .map(|login| ("user_login", (*login).to_string()))
            .collect();
        if let Some(first) = first {
            query.push(("first", first.to_string()));
        }
        self.rest.get("/streams", &query).await
    }

    /// Archived videos for one user.
    pub async fn get_videos(
        &self,
        user_id: &str,
        first: Option<u32>,
    ) -> Result<Paginated<Video>, RestError> {
        let mut query: Vec<(&str, String)> = vec![("user_id", user_id.to_string())];
        if let Some(first) = first {
            query.push(("first", first.to_string()));
        }
        self.rest.get("/videos", &query).await
    }
}
