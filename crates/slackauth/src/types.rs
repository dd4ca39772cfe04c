//! Wire types for Slack's OAuth endpoints

use serde::{Deserialize, Serialize};

/// Successful reply from Slack's `oauth.access` endpoint.
///
/// Slack omits sections the workspace did not grant, so every field falls
/// back to its default when absent. The same struct doubles as the render
/// context for the success page template (serialized to JSON).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthResponse {
    /// Workspace access token.
    #[serde(default)]
    pub access_token: String,
    /// Comma-separated scopes granted to the token.
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub user_id: String,
    /// Present when the `incoming-webhook` scope was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_webhook: Option<IncomingWebhook>,
    /// Present when the `bot` scope was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<BotAuth>,
}

/// Incoming webhook issued alongside the workspace token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomingWebhook {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub configuration_url: String,
}

/// Bot user credentials issued alongside the workspace token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotAuth {
    #[serde(default)]
    pub bot_user_id: String,
    #[serde(default)]
    pub bot_access_token: String,
}
