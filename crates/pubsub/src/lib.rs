//! Push-notification topic management. Like the other non-chat modules this
//! is a stateless request/response client over the shared calling
//! convention; it manages which topics the caller is subscribed to and does
//! not own a socket of its own.

use cb_core::{RestClient, RestError};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://pubsub-edge.twitch.tv/v1";

/// One subscribable topic, e.g. channel points redemptions for a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    pub channel_id: String,
}

impl Topic {
    pub fn new(name: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel_id: channel_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TopicsEnvelope {
    #[serde(default)]
    data: Vec<Topic>,
}

#[derive(Debug, Serialize)]
struct TopicsRequest<'a> {
    topics: &'a [Topic],
}

pub struct PubSubClient {
    rest: RestClient,
}

impl PubSubClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Topics the current credentials are subscribed to.
    pub async fn list_topics(&self) -> Result<Vec<Topic>, RestError> {
        let envelope: TopicsEnvelope = self.rest.get("/topics", &[]).await?;
        Ok(envelope.data)
    }

    pub async fn subscribe_topics(&self, topics: &[Topic]) -> Result<(), RestError> {
        debug!(count = topics.len(), "subscribing topics");
        let _: serde_json::Value = self
            .rest
            .post("/topics/subscribe", &TopicsRequest { topics })
            .await?;
        Ok(())
    }

    pub async fn unsubscribe_topics(&self, topics: &[Topic]) -> Result<(), RestError> {
        let _: serde_json::Value = self
            .rest
            .post("/topics/unsubscribe", &TopicsRequest { topics })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::{AccessToken, RestConfig, StaticCredentials};
    use std::sync::Arc;

    fn client(base: &str) -> PubSubClient {
        let rest = RestClient::new(
            RestConfig::new(base, "cid"),
            Arc::new(StaticCredentials::new(AccessToken::new("tok"))),
        )
        .unwrap();
        PubSubClient::new(rest)
    }

    #[tokio::test]
    async fn list_topics_unwraps_the_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/topics")
            .with_status(200)
            .with_body(
                r#"{"data":[{"name":"channel-points","channel_id":"9"},{"name":"bits","channel_id":"9"}]}"#,
            )
            .create_async()
            .await;

        let topics = client(&server.url()).list_topics().await.unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0], Topic::new("channel-points", "9"));
    }

    #[tokio::test]
    async fn subscribe_posts_the_topic_list() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/topics/subscribe")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "topics": [{"name": "bits", "channel_id": "9"}]
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        client(&server.url())
            .subscribe_topics(&[Topic::new("bits", "9")])
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
