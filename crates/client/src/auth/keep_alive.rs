//! Background session keep-alive loop
//!
//! Started through [`Session::ensure_keep_alive`](super::session::Session)
//! once [`Client::connect`](crate::client::Client::connect) has a usable
//! session. The loop sleeps until the earlier of the
//! configured interval or the moment the session comes within its extend
//! threshold of expiry, then runs the lazy-extend decision chain. A failure
//! of that chain (i.e. a failed re-login) is recorded on the session and
//! stops the loop; transient extend/verify failures are absorbed inside
//! `lazy_extend` and do not stop it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::KeepAliveOptions;

use super::session::Session;

/// Handle to a running keep-alive loop
#[derive(Debug)]
pub(crate) struct KeepAliveHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl KeepAliveHandle {
    /// Spawn the loop for a session
    ///
    /// The task holds only a weak reference, so an abandoned session is
    /// dropped normally and the loop winds down on its own.
    pub(crate) fn spawn(session: &Arc<Session>, options: KeepAliveOptions) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(Arc::downgrade(session), options, cancel.clone()));
        Self { cancel, task }
    }

    /// Signal the loop to stop and detach it
    pub(crate) fn stop(self) {
        self.cancel.cancel();
        // The loop exits at its next select point; no need to await it
        drop(self.task);
    }
}

async fn run(session: Weak<Session>, options: KeepAliveOptions, cancel: CancellationToken) {
    debug!(interval = ?options.interval, "keep-alive loop started");
    loop {
        let sleep_for = {
            let Some(session) = session.upgrade() else {
                return;
            };
            next_wakeup(session.time_remaining().await, &options)
        };

        tokio::select! {
            () = cancel.cancelled() => {
                debug!("keep-alive loop stopped");
                return;
            }
            () = tokio::time::sleep(sleep_for) => {}
        }

        let Some(session) = session.upgrade() else {
            return;
        };
        match session.lazy_extend(&options).await {
            Ok(renewed) => {
                if renewed {
                    debug!("keep-alive renewed the session");
                }
            }
            Err(e) => {
                warn!(error = %e, "keep-alive could not re-establish the session; stopping");
                session.record_keep_alive_error(e);
                return;
            }
        }
    }
}

/// Sleep until the configured interval or until the session enters its
/// extend threshold, whichever comes first
fn next_wakeup(remaining: Duration, options: &KeepAliveOptions) -> Duration {
    let until_threshold = remaining.saturating_sub(options.extend_threshold);
    until_threshold.min(options.interval)
}
