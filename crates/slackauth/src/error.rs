//! Error types for the authorization service

use thiserror::Error;

use crate::exchange::ExchangeError;

/// Main error type for the authorization service.
///
/// Construction and listener failures are fatal and surface through
/// [`crate::SlackAuth::new`] and [`crate::SlackAuth::run`]. Per-request
/// exchange and render failures are handled inside the callback handler and
/// never abort the service.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Required options were missing or empty.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A page template could not be read or parsed.
    #[error("cannot load {name} template: {reason}")]
    TemplateLoad {
        /// Which template slot failed (`success`, `error` or `button`).
        name: String,
        /// What went wrong while loading it.
        reason: String,
    },

    /// The token exchange client failed.
    #[error("token exchange failed: {0}")]
    Exchange(#[from] ExchangeError),

    /// The HTTP listener could not be started or stopped serving.
    #[error("listener error: {0}")]
    Listen(String),
}

/// Result type alias for authorization service operations
pub type Result<T> = std::result::Result<T, AuthError>;
