//! Service configuration

use std::path::{Path, PathBuf};

/// Scope granting a bot user.
pub const SCOPE_BOT: &str = "bot";
/// Scope granting slash commands.
pub const SCOPE_COMMANDS: &str = "commands";
/// Scope granting an incoming webhook for one channel.
pub const SCOPE_INCOMING_WEBHOOK: &str = "incoming-webhook";

/// Options for [`crate::SlackAuth::new`].
///
/// `addr`, `client_id`, `client_secret`, the three template paths and at
/// least one scope are required; validation rejects anything less before the
/// service is built. TLS is served only when both `cert_file` and `key_file`
/// are set.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Listen address, e.g. `0.0.0.0:8080`.
    pub addr: String,
    /// OAuth client id issued by Slack.
    pub client_id: String,
    /// OAuth client secret issued by Slack.
    pub client_secret: String,
    /// Page shown after a successful exchange; rendered with the token
    /// response as context.
    pub success_template: PathBuf,
    /// Page shown after a failed exchange; rendered with a null context.
    pub error_template: PathBuf,
    /// "Add to Slack" landing page served at `/`; rendered with `client_id`
    /// and the joined `scopes`.
    pub button_template: PathBuf,
    /// OAuth scopes requested by the button link.
    pub scopes: Vec<String>,
    /// TLS certificate chain in PEM format.
    pub cert_file: Option<PathBuf>,
    /// TLS private key in PEM format.
    pub key_file: Option<PathBuf>,
    /// Log wire-level exchange detail at debug level.
    pub debug: bool,
}

impl Options {
    /// Scopes joined the way Slack's `oauth/authorize` URL expects them.
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(",")
    }

    /// Certificate and key pair, when both are configured.
    pub(crate) fn tls_pair(&self) -> Option<(&Path, &Path)> {
        match (&self.cert_file, &self.key_file) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}
