//! Query-language API module: posts an operation plus variables and returns
//! the raw data document. Server-reported query errors are surfaced as a
//! dedicated variant so callers can tell them from transport failures.

use cb_core::{RestClient, RestError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://gql.twitch.tv/gql";

#[derive(Debug, Error)]
pub enum GraphQlError {
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error("query failed: {0}")]
    Query(String),
    #[error("response carried no data document")]
    EmptyResponse,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    variables: Value,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<QueryError>,
}

#[derive(Debug, Deserialize)]
struct QueryError {
    message: String,
}

pub struct GraphQlClient {
    rest: RestClient,
}

impl GraphQlClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    /// Executes one operation and returns its data document.
    pub async fn query(&self, operation: &str, variables: Value) -> Result<Value, GraphQlError> {
        debug!(bytes = operation.len(), "executing query");
        let response: QueryResponse = self
            .rest
            .post(
                "",
                &QueryRequest {
                    query: operation,
                    variables,
                },
            )
            .await?;

        if !response.errors.is_empty() {
            let messages: Vec<&str> = response
                .errors
                .iter()
                .map(|err| err.message.as_str())
                .collect();
            return Err(GraphQlError::Query(messages.join("; ")));
        }
        response.data.ok_or(GraphQlError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::{AccessToken, RestConfig, StaticCredentials};
    use serde_json::json;
    use std::sync::Arc;

    fn client(base: &str) -> GraphQlClient {
        let rest = RestClient::new(
            RestConfig::new(base, "cid"),
            Arc::new(StaticCredentials::new(AccessToken::new("tok"))),
        )
        .unwrap();
        GraphQlClient::new(rest)
    }

    #[tokio::test]
    async fn query_returns_the_data_document() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({
                "query": "query { user { id } }"
            })))
            .with_status(200)
            .with_body(r#"{"data":{"user":{"id":"9"}}}"#)
            .create_async()
            .await;

        let data = client(&server.url())
            .query("query { user { id } }", Value::Null)
            .await
            .unwrap();
        assert_eq!(data["user"]["id"], "9");
    }

    #[tokio::test]
    async fn server_reported_errors_become_query_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"data":null,"errors":[{"message":"field does not exist"}]}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .query("query { nope }", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphQlError::Query(msg) if msg.contains("field does not exist")));
    }
}
