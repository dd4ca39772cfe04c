//! Authorization code exchange against Slack's `oauth.access` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::types::OAuthResponse;

/// Production Slack API origin.
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com";

const EXCHANGE_TIMEOUT_SECS: u64 = 30;

/// Error type for authorization code exchange
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// The HTTP request could not be built or sent.
    #[error("exchange request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Slack replied `ok: false` with an error code such as `invalid_code`.
    #[error("slack rejected the exchange: {0}")]
    Provider(String),

    /// The reply body was not a valid `oauth.access` payload.
    #[error("malformed exchange reply: {0}")]
    Parse(String),
}

/// Exchanges an authorization code for an access token.
///
/// The callback handler calls this once per inbound request. The real
/// implementation is [`SlackTokenExchanger`]; tests inject doubles through
/// [`crate::SlackAuth::with_exchanger`].
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Perform the exchange. `debug` asks the implementation to log the wire
    /// traffic at debug level.
    async fn exchange(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        debug: bool,
    ) -> Result<OAuthResponse, ExchangeError>;
}

/// Envelope fields common to every Slack API reply.
#[derive(Debug, Deserialize)]
struct SlackEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Exchanger backed by Slack's `oauth.access` endpoint.
#[derive(Debug, Clone)]
pub struct SlackTokenExchanger {
    client: Client,
    base_url: String,
}

impl SlackTokenExchanger {
    /// Create an exchanger against the production Slack API.
    pub fn new() -> Result<Self, ExchangeError> {
        Self::with_base_url(DEFAULT_SLACK_API_BASE)
    }

    /// Create an exchanger against a custom API origin.
    ///
    /// Tests point this at a local mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ExchangeError> {
        let client =
            Client::builder().timeout(Duration::from_secs(EXCHANGE_TIMEOUT_SECS)).build()?;
        Ok(Self { client, base_url: base_url.into() })
    }
}

#[async_trait]
impl TokenExchanger for SlackTokenExchanger {
    async fn exchange(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        debug: bool,
    ) -> Result<OAuthResponse, ExchangeError> {
        let url = format!("{}/api/oauth.access", self.base_url);
        let params =
            [("client_id", client_id), ("client_secret", client_secret), ("code", code)];

        if debug {
            debug!(url = %url, code, "exchanging authorization code");
        }

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if debug {
            debug!(status = %status, body = %body, "oauth.access reply");
        }

        // Slack signals failure through the `ok` field, not the HTTP status.
        let envelope: SlackEnvelope = serde_json::from_str(&body)
            .map_err(|err| ExchangeError::Parse(format!("not a slack api reply: {err}")))?;
        if !envelope.ok {
            return Err(ExchangeError::Provider(
                envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|err| ExchangeError::Parse(format!("invalid oauth.access payload: {err}")))
    }
}
