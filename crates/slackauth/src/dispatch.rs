//! Background delivery of successful authorizations.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::types::OAuthResponse;

/// Callback invoked once per successful authorization.
pub(crate) type AuthCallback = Arc<dyn Fn(OAuthResponse) + Send + Sync>;

/// Shared slot holding the currently registered callback.
pub(crate) type ObserverCell = Arc<RwLock<Option<AuthCallback>>>;

/// Drain the authorization queue until every sender is gone.
///
/// Events are delivered one at a time, in queue order, to whichever callback
/// is registered at the moment of delivery; events arriving while the slot
/// is empty are dropped with a warning. A panicking callback is contained so
/// the loop keeps serving later events.
pub(crate) async fn dispatch_events(
    mut events: mpsc::Receiver<OAuthResponse>,
    observer: ObserverCell,
) {
    while let Some(auth) = events.recv().await {
        // The slot is never held across the invocation.
        let callback = observer.read().expect("observer slot poisoned").clone();
        let Some(callback) = callback else {
            warn!("auth event received but no handler is registered");
            continue;
        };

        let team_id = auth.team_id.clone();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(auth))) {
            error!(
                team_id = %team_id,
                panic = %panic_message(&payload),
                "auth handler panicked"
            );
        }
    }

    debug!("auth event queue closed, dispatcher stopping");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    }
}
