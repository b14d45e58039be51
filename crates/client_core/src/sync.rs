//! Periodic reconciliation against the remote service.
//!
//! [`schedule`] is the cancellable repeating-timer primitive used by both the
//! 30-second data poll and the 1-second alarm tick. Cancellation stops future
//! runs; it never aborts a request already in flight, whose result is only
//! applied if the session is still valid when it lands.

use std::{future::Future, ops::ControlFlow, sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{ClientError, DashboardClient};

/// Handle to a scheduled repeating task. Dropping it cancels the schedule.
pub struct TaskHandle {
    inner: JoinHandle<()>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.inner.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.inner.abort();
    }
}

impl From<JoinHandle<()>> for TaskHandle {
    fn from(inner: JoinHandle<()>) -> Self {
        Self { inner }
    }
}

/// Runs `task` every `period`, starting one period from now. The task ends
/// the schedule by returning `ControlFlow::Break`; the handle cancels it from
/// outside.
pub fn schedule<F, Fut>(period: Duration, mut task: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send,
{
    let inner = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; the first run belongs one period out.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if task().await.is_break() {
                break;
            }
        }
    });
    TaskHandle { inner }
}

/// Outcome of starting the synchronizer: the cancellation handle for the
/// background polls plus, when the initial fetch failed recoverably, the
/// human-readable notice to show while the server warms up.
pub struct SyncStart {
    pub handle: TaskHandle,
    pub notice: Option<String>,
}

impl DashboardClient {
    /// Begins the poll cycle: an immediate fetch now, then one every `period`
    /// until the handle is cancelled, the session ends, or an authorization
    /// failure terminates it.
    ///
    /// An auth failure on the initial fetch invalidates the session and is
    /// returned as an error. Any other initial failure is reported through
    /// [`SyncStart::notice`] while background polling still starts, since the
    /// next poll may succeed on its own.
    pub async fn start_sync(self: &Arc<Self>, period: Duration) -> Result<SyncStart, ClientError> {
        let notice = match self.poll_cycle(true).await {
            Ok(()) => None,
            Err(ClientError::Auth) => return Err(ClientError::Auth),
            Err(err) => {
                let message = err.to_string();
                self.inner.lock().await.last_error = Some(message.clone());
                info!("initial fetch failed: {message}");
                Some(message)
            }
        };

        let client = Arc::clone(self);
        let handle = schedule(period, move || {
            let client = Arc::clone(&client);
            async move {
                if !client.session_active().await {
                    return ControlFlow::Break(());
                }
                match client.poll_cycle(false).await {
                    Err(ClientError::Auth) => ControlFlow::Break(()),
                    _ => ControlFlow::Continue(()),
                }
            }
        });

        Ok(SyncStart { handle, notice })
    }

    /// One poll: fetch the medication list, replace the cache wholesale on
    /// success, then fetch history best-effort. Background failures other
    /// than auth keep the previous cache untouched so the display never
    /// flickers.
    pub(crate) async fn poll_cycle(&self, initial: bool) -> Result<(), ClientError> {
        let token = self.require_token().await?;

        let medications = match self.api.list_medications(&token).await {
            Ok(medications) => medications,
            Err(ClientError::Auth) => {
                self.invalidate_session().await;
                return Err(ClientError::Auth);
            }
            Err(err) if initial => return Err(err),
            Err(err) => {
                debug!("background poll failed, keeping current cache: {err}");
                return Ok(());
            }
        };

        // A logout may have raced this request; a stale success must not
        // repopulate caches that were just cleared.
        if !self.session_active().await {
            debug!("discarding poll result for an ended session");
            return Ok(());
        }
        self.replace_medications(medications).await;

        // Secondary, best-effort: a history failure never changes the
        // verdict of the cycle, but an auth failure still ends the session.
        match self.api.list_history(&token).await {
            Ok(history) => {
                if self.session_active().await {
                    self.replace_history(history).await;
                }
            }
            Err(ClientError::Auth) => {
                self.invalidate_session().await;
                return Err(ClientError::Auth);
            }
            Err(err) => warn!("history fetch failed: {err}"),
        }

        Ok(())
    }

    /// History re-fetch decoupled from the outcome of the mutation that
    /// requested it.
    pub(crate) async fn refresh_history_best_effort(&self, token: &str) {
        match self.api.list_history(token).await {
            Ok(history) => {
                if self.session_active().await {
                    self.replace_history(history).await;
                }
            }
            Err(ClientError::Auth) => {
                self.invalidate_session().await;
            }
            Err(err) => debug!("history refresh failed: {err}"),
        }
    }
}
