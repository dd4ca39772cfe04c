//! The authorization callback service.
//!
//! [`SlackAuth`] owns the HTTP side of the "Add to Slack" flow: `GET /`
//! serves the button page, and `GET|POST /auth` receives the provider
//! redirect, exchanges the authorization code for a token, and queues the
//! result for the registered callback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::Options;
use crate::dispatch::{dispatch_events, ObserverCell};
use crate::error::{AuthError, Result};
use crate::exchange::{SlackTokenExchanger, TokenExchanger};
use crate::template::Template;
use crate::types::OAuthResponse;

/// In-flight authorizations the service buffers before callback delivery.
/// Further exchanges wait for the dispatcher instead of dropping events.
const AUTH_QUEUE_CAPACITY: usize = 1;

/// Handle to a configured authorization service.
///
/// Cheap to clone; all clones share one listener, one event queue and one
/// callback slot.
#[derive(Clone)]
pub struct SlackAuth {
    inner: Arc<Inner>,
}

struct Inner {
    addr: String,
    client_id: String,
    client_secret: String,
    scopes: String,
    debug: bool,
    tls: Option<(PathBuf, PathBuf)>,
    success_template: Template,
    error_template: Template,
    button_template: Template,
    exchanger: Arc<dyn TokenExchanger>,
    events: mpsc::Sender<OAuthResponse>,
    receiver: Mutex<Option<mpsc::Receiver<OAuthResponse>>>,
    observer: ObserverCell,
}

/// A listener that is bound and ready to serve.
enum Bound {
    Plain(TcpListener),
    Tls(std::net::TcpListener, RustlsConfig),
}

impl SlackAuth {
    /// Validate `options` and build a service backed by the real Slack API.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidConfig`] when `addr`, `client_id` or
    /// `client_secret` is empty or no scope is configured, and
    /// [`AuthError::TemplateLoad`] when any of the three page templates
    /// cannot be read or parsed. Nothing is bound or spawned until
    /// [`run`](Self::run).
    pub fn new(options: Options) -> Result<Self> {
        let exchanger = SlackTokenExchanger::new()?;
        Self::with_exchanger(options, Arc::new(exchanger))
    }

    /// Like [`new`](Self::new), but with a caller-supplied token exchanger.
    ///
    /// This is the seam tests use to substitute the remote provider.
    pub fn with_exchanger(options: Options, exchanger: Arc<dyn TokenExchanger>) -> Result<Self> {
        if options.addr.is_empty()
            || options.client_id.is_empty()
            || options.client_secret.is_empty()
        {
            return Err(AuthError::InvalidConfig(
                "addr, client id and client secret can not be empty".to_string(),
            ));
        }

        let success_template = load_template("success", &options.success_template)?;
        let error_template = load_template("error", &options.error_template)?;
        let button_template = load_template("button", &options.button_template)?;

        if options.scopes.is_empty() {
            return Err(AuthError::InvalidConfig("at least one scope is required".to_string()));
        }

        if options.cert_file.is_some() != options.key_file.is_some() {
            warn!("cert_file and key_file must both be set for tls, serving plain http");
        }

        let tls = options.tls_pair().map(|(cert, key)| (cert.to_path_buf(), key.to_path_buf()));
        let scopes = options.scope_string();
        let (events, receiver) = mpsc::channel(AUTH_QUEUE_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                addr: options.addr,
                client_id: options.client_id,
                client_secret: options.client_secret,
                scopes,
                debug: options.debug,
                tls,
                success_template,
                error_template,
                button_template,
                exchanger,
                events,
                receiver: Mutex::new(Some(receiver)),
                observer: Arc::new(RwLock::new(None)),
            }),
        })
    }

    /// Register the callback invoked once per successful authorization.
    ///
    /// Replaces any previously registered callback. Queued events are
    /// delivered to whichever callback is registered when they come up; with
    /// none registered they are dropped. The callback runs on the dispatcher
    /// task, so a slow callback delays subsequent deliveries.
    pub fn on_auth<F>(&self, callback: F)
    where
        F: Fn(OAuthResponse) + Send + Sync + 'static,
    {
        *self.inner.observer.write().expect("observer slot poisoned") = Some(Arc::new(callback));
    }

    /// Spawn the event dispatcher and serve callbacks until the listener
    /// stops.
    ///
    /// Serves HTTPS when a certificate and key pair was configured, plain
    /// HTTP otherwise. The dispatcher starts only once the listener is
    /// bound: a `run` that fails at startup leaves the service runnable
    /// again, while a second `run` on any clone of a serving service
    /// returns [`AuthError::Listen`].
    ///
    /// # Errors
    /// Returns [`AuthError::Listen`] when the address cannot be bound, the
    /// TLS material cannot be loaded, the service is already serving, or the
    /// listener fails while serving.
    pub async fn run(&self) -> Result<()> {
        let mut receiver = self.inner.receiver.lock().await;
        let Some(events) = receiver.take() else {
            return Err(AuthError::Listen("service is already running".to_string()));
        };

        // A run that never listened puts the receiver back so a corrected
        // retry can start.
        let bound = match self.bind().await {
            Ok(bound) => bound,
            Err(err) => {
                *receiver = Some(events);
                return Err(err);
            }
        };
        drop(receiver);

        tokio::spawn(dispatch_events(events, Arc::clone(&self.inner.observer)));
        self.serve(bound).await
    }

    async fn bind(&self) -> Result<Bound> {
        let listener = TcpListener::bind(&self.inner.addr).await.map_err(|err| {
            AuthError::Listen(format!("cannot bind {}: {err}", self.inner.addr))
        })?;

        let Some((cert, key)) = &self.inner.tls else {
            return Ok(Bound::Plain(listener));
        };

        let tls = RustlsConfig::from_pem_file(cert, key)
            .await
            .map_err(|err| AuthError::Listen(format!("cannot load tls material: {err}")))?;
        let listener = listener
            .into_std()
            .map_err(|err| AuthError::Listen(format!("cannot prepare tls listener: {err}")))?;

        Ok(Bound::Tls(listener, tls))
    }

    async fn serve(&self, bound: Bound) -> Result<()> {
        let app = self.router();
        match bound {
            Bound::Plain(listener) => {
                info!(addr = %self.inner.addr, "serving oauth callbacks");
                axum::serve(listener, app).await.map_err(|err| AuthError::Listen(err.to_string()))
            }
            Bound::Tls(listener, tls) => {
                info!(addr = %self.inner.addr, "serving oauth callbacks over https");
                axum_server::from_tcp_rustls(listener, tls)
                    .serve(app.into_make_service())
                    .await
                    .map_err(|err| AuthError::Listen(err.to_string()))
            }
        }
    }

    fn router(&self) -> Router {
        let state = Arc::clone(&self.inner);

        let authorize_get = {
            let state = Arc::clone(&state);
            move |Query(params): Query<HashMap<String, String>>| {
                handle_authorize(state.clone(), params)
            }
        };
        let authorize_post = {
            let state = Arc::clone(&state);
            move |Query(query): Query<HashMap<String, String>>,
                  form: std::result::Result<Form<HashMap<String, String>>, FormRejection>| {
                let state = state.clone();
                async move {
                    // Body fields win when a key appears in both places.
                    let mut params = query;
                    if let Ok(Form(form)) = form {
                        params.extend(form);
                    }
                    handle_authorize(state, params).await
                }
            }
        };
        let button = move || handle_button(state.clone());

        Router::new()
            .route("/", get(button))
            .route("/auth", get(authorize_get).post(authorize_post))
    }
}

// The client secret stays out of the output.
impl std::fmt::Debug for SlackAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackAuth")
            .field("addr", &self.inner.addr)
            .field("client_id", &self.inner.client_id)
            .field("scopes", &self.inner.scopes)
            .field("tls", &self.inner.tls)
            .field("debug", &self.inner.debug)
            .field("exchanger", &"TokenExchanger")
            .finish()
    }
}

/// Receive the provider redirect and walk it through exchange, render and
/// enqueue. Always replies 200 with whatever was rendered; exchange and
/// render failures only reach the logs.
async fn handle_authorize(state: Arc<Inner>, params: HashMap<String, String>) -> Html<String> {
    let code = params.get("code").map_or("", String::as_str);

    if state.debug {
        debug!(code, "oauth callback received");
    }

    let exchanged = state
        .exchanger
        .exchange(&state.client_id, &state.client_secret, code, state.debug)
        .await;

    match exchanged {
        Ok(auth) => {
            let context = serde_json::to_value(&auth).unwrap_or(Value::Null);
            let mut body = String::new();
            if let Err(err) = state.success_template.render_to(&mut body, &context) {
                error!(error = %err, "failed to render success page");
            }
            // Waits here when an earlier event is still undelivered.
            if state.events.send(auth).await.is_err() {
                warn!("auth event queue is closed, dropping event");
            }
            Html(body)
        }
        Err(err) => {
            error!(error = %err, "authorization code exchange failed");
            let mut body = String::new();
            if let Err(err) = state.error_template.render_to(&mut body, &Value::Null) {
                error!(error = %err, "failed to render error page");
            }
            Html(body)
        }
    }
}

/// Serve the "Add to Slack" landing page.
async fn handle_button(state: Arc<Inner>) -> Html<String> {
    let context = json!({
        "client_id": state.client_id,
        "scopes": state.scopes,
    });
    let mut body = String::new();
    if let Err(err) = state.button_template.render_to(&mut body, &context) {
        error!(error = %err, "failed to render button page");
    }
    Html(body)
}

fn load_template(name: &str, path: &Path) -> Result<Template> {
    Template::from_file(path).map_err(|err| AuthError::TemplateLoad {
        name: name.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::config::{SCOPE_BOT, SCOPE_COMMANDS};
    use crate::exchange::ExchangeError;

    struct StaticExchanger;

    #[async_trait::async_trait]
    impl TokenExchanger for StaticExchanger {
        async fn exchange(
            &self,
            _client_id: &str,
            _client_secret: &str,
            code: &str,
            _debug: bool,
        ) -> std::result::Result<OAuthResponse, ExchangeError> {
            if code == "invalid" {
                return Err(ExchangeError::Provider("invalid_code".to_string()));
            }
            Ok(OAuthResponse { access_token: format!("token-{code}"), ..OAuthResponse::default() })
        }
    }

    fn write_template(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).expect("Should write template");
        path
    }

    fn valid_options(dir: &TempDir) -> Options {
        Options {
            addr: "127.0.0.1:0".to_string(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            success_template: write_template(dir, "success.html", "<p>{{ access_token }}</p>"),
            error_template: write_template(dir, "error.html", "<p>authorization failed</p>"),
            button_template: write_template(
                dir,
                "button.html",
                r#"<a href="https://slack.com/oauth/authorize?scope={{ scopes }}&client_id={{ client_id }}">Add to Slack</a>"#,
            ),
            scopes: vec![SCOPE_BOT.to_string(), SCOPE_COMMANDS.to_string()],
            ..Options::default()
        }
    }

    fn test_service(options: Options) -> Result<SlackAuth> {
        SlackAuth::with_exchanger(options, Arc::new(StaticExchanger))
    }

    #[test]
    fn rejects_empty_required_fields() {
        let dir = TempDir::new().expect("Should create tempdir");

        for blank in ["addr", "client_id", "client_secret"] {
            let mut options = valid_options(&dir);
            match blank {
                "addr" => options.addr.clear(),
                "client_id" => options.client_id.clear(),
                _ => options.client_secret.clear(),
            }
            let result = test_service(options);
            assert!(
                matches!(result, Err(AuthError::InvalidConfig(_))),
                "blank {blank} should be rejected"
            );
        }
    }

    #[test]
    fn reports_missing_success_template() {
        let dir = TempDir::new().expect("Should create tempdir");
        let mut options = valid_options(&dir);
        options.success_template = dir.path().join("missing.html");

        let err = test_service(options).expect_err("Should fail");
        assert!(matches!(err, AuthError::TemplateLoad { ref name, .. } if name == "success"));
    }

    #[test]
    fn reports_missing_error_template_even_when_success_is_valid() {
        let dir = TempDir::new().expect("Should create tempdir");
        let mut options = valid_options(&dir);
        options.error_template = dir.path().join("missing.html");

        let err = test_service(options).expect_err("Should fail");
        assert!(matches!(err, AuthError::TemplateLoad { ref name, .. } if name == "error"));
    }

    #[test]
    fn reports_missing_button_template() {
        let dir = TempDir::new().expect("Should create tempdir");
        let mut options = valid_options(&dir);
        options.button_template = dir.path().join("missing.html");

        let err = test_service(options).expect_err("Should fail");
        assert!(matches!(err, AuthError::TemplateLoad { ref name, .. } if name == "button"));
    }

    #[test]
    fn reports_malformed_template_content() {
        let dir = TempDir::new().expect("Should create tempdir");
        let mut options = valid_options(&dir);
        options.success_template = write_template(&dir, "broken.html", "<p>{{ access_token</p>");

        let err = test_service(options).expect_err("Should fail");
        assert!(matches!(err, AuthError::TemplateLoad { ref name, .. } if name == "success"));
    }

    #[test]
    fn rejects_empty_scopes() {
        let dir = TempDir::new().expect("Should create tempdir");
        let mut options = valid_options(&dir);
        options.scopes.clear();

        let err = test_service(options).expect_err("Should fail");
        assert!(matches!(err, AuthError::InvalidConfig(_)));
    }

    #[test]
    fn builds_with_valid_options() {
        let dir = TempDir::new().expect("Should create tempdir");
        assert!(test_service(valid_options(&dir)).is_ok());
    }

    #[test]
    fn builds_with_the_default_exchanger() {
        let dir = TempDir::new().expect("Should create tempdir");
        assert!(SlackAuth::new(valid_options(&dir)).is_ok());
    }

    #[test]
    fn debug_output_omits_the_client_secret() {
        let dir = TempDir::new().expect("Should create tempdir");
        let service = test_service(valid_options(&dir)).expect("Should build");

        let printed = format!("{service:?}");
        assert!(printed.contains("client_id: \"cid\""), "should print public fields: {printed}");
        assert!(!printed.contains("secret"), "must not leak the client secret: {printed}");
    }

    #[test]
    fn half_configured_tls_builds_without_tls() {
        let dir = TempDir::new().expect("Should create tempdir");
        let mut options = valid_options(&dir);
        options.cert_file = Some(dir.path().join("cert.pem"));

        let service = test_service(options).expect("Should build");
        assert!(service.inner.tls.is_none());
    }

    #[tokio::test]
    async fn second_run_is_a_listen_error() {
        let dir = TempDir::new().expect("Should create tempdir");
        let service = test_service(valid_options(&dir)).expect("Should build");

        let runner = service.clone();
        tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = service.run().await.expect_err("Should refuse a second run");
        assert!(matches!(err, AuthError::Listen(_)));
    }

    #[tokio::test]
    async fn run_fails_on_unusable_address() {
        let dir = TempDir::new().expect("Should create tempdir");
        let mut options = valid_options(&dir);
        options.addr = "definitely-not-an-address".to_string();

        let service = test_service(options).expect("Should build");
        let err = service.run().await.expect_err("Should fail to bind");
        assert!(matches!(err, AuthError::Listen(_)));
    }

    #[tokio::test]
    async fn failed_run_leaves_the_service_runnable() {
        let dir = TempDir::new().expect("Should create tempdir");
        let mut options = valid_options(&dir);
        options.addr = "definitely-not-an-address".to_string();

        let service = test_service(options).expect("Should build");
        let first = service.run().await.expect_err("Should fail to bind");
        assert!(first.to_string().contains("cannot bind"), "unexpected error: {first}");

        // The retry reports the bind failure again, not a phantom running
        // state.
        let second = service.run().await.expect_err("Should fail to bind again");
        assert!(second.to_string().contains("cannot bind"), "unexpected error: {second}");
    }

    #[tokio::test]
    async fn run_fails_on_missing_tls_material() {
        let dir = TempDir::new().expect("Should create tempdir");
        let mut options = valid_options(&dir);
        options.cert_file = Some(dir.path().join("missing-cert.pem"));
        options.key_file = Some(dir.path().join("missing-key.pem"));

        let service = test_service(options).expect("Should build");
        let err = service.run().await.expect_err("Should fail to load tls material");
        assert!(matches!(err, AuthError::Listen(_)));

        let retry = service.run().await.expect_err("Should fail the same way on retry");
        assert!(retry.to_string().contains("tls material"), "unexpected error: {retry}");
    }
}
