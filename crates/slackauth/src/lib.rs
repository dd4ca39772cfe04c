//! Slack "Add to Slack" OAuth authorization flow as an embeddable service.
//!
//! [`SlackAuth`] runs an HTTP endpoint that receives Slack's authorization
//! redirect, exchanges the `code` for an access token through
//! `oauth.access`, shows the user a success or failure page, and hands each
//! successful [`OAuthResponse`] to the callback registered with
//! [`SlackAuth::on_auth`]. A landing page with the "Add to Slack" button is
//! served at `/`.
//!
//! # Example
//!
//! ```no_run
//! use slackauth::{Options, SCOPE_BOT, SCOPE_COMMANDS, SlackAuth};
//!
//! # async fn example() -> slackauth::Result<()> {
//! let service = SlackAuth::new(Options {
//!     addr: "0.0.0.0:8080".to_string(),
//!     client_id: "1234.5678".to_string(),
//!     client_secret: "shhh".to_string(),
//!     success_template: "templates/success.html".into(),
//!     error_template: "templates/error.html".into(),
//!     button_template: "templates/button.html".into(),
//!     scopes: vec![SCOPE_BOT.to_string(), SCOPE_COMMANDS.to_string()],
//!     ..Options::default()
//! })?;
//!
//! service.on_auth(|auth| {
//!     println!("{} authorized by {}", auth.team_name, auth.user_id);
//! });
//!
//! service.run().await
//! # }
//! ```
//!
//! The crate logs through [`tracing`] and never installs a subscriber; the
//! embedding application decides where events go.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

mod dispatch;

pub mod config;
pub mod error;
pub mod exchange;
pub mod service;
pub mod template;
pub mod types;

// Re-export the public surface at the crate root for convenience
pub use config::{Options, SCOPE_BOT, SCOPE_COMMANDS, SCOPE_INCOMING_WEBHOOK};
pub use error::{AuthError, Result};
pub use exchange::{DEFAULT_SLACK_API_BASE, ExchangeError, SlackTokenExchanger, TokenExchanger};
pub use service::SlackAuth;
pub use template::{Template, TemplateError};
pub use types::{BotAuth, IncomingWebhook, OAuthResponse};
