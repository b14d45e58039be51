//! Synchronization-and-alarm core of the CuidaMed dashboard.
//!
//! A [`DashboardClient`] owns the in-memory medication and history caches, the
//! session token, and the dose-alarm state machine. The remote service is the
//! source of truth: polls replace the medication cache wholesale, mutations
//! fold the server's echo back in, and the presentation layer observes
//! everything through a broadcast event stream.

use std::sync::Arc;

use shared::domain::{HistoryEntry, Medication, MedicationId};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info};

pub mod alarm;
pub mod api;
pub mod error;
mod mutations;
pub mod session;
pub mod sort;
pub mod sync;

pub use alarm::{AlarmScheduler, AlarmState, Clock, ConfirmationWindow, SystemClock};
pub use api::{HttpInventory, RemoteInventory};
pub use error::ClientError;
pub use session::{Session, TokenStore};
pub use sort::{SortConfig, SortDirection, SortKey, SortProjection};
pub use sync::{schedule, SyncStart, TaskHandle};

/// Notifications for the presentation layer.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    MedicationsUpdated,
    HistoryUpdated,
    /// Display the alarm and start the audio cue.
    AlarmTriggered {
        medication_id: MedicationId,
        name: String,
    },
    /// Stop the audio cue and hide the alarm.
    AlarmCleared,
    /// Credentials are invalid; route to login. Caches are already cleared.
    SessionInvalidated,
    Error(String),
}

pub(crate) struct ClientState {
    pub medications: Vec<Medication>,
    pub history: Vec<HistoryEntry>,
    /// Bumped on every cache replacement; drives projection memoization.
    pub generation: u64,
    pub last_error: Option<String>,
}

pub struct DashboardClient {
    pub(crate) api: Arc<dyn RemoteInventory>,
    pub(crate) session: RwLock<Session>,
    pub(crate) token_store: Option<TokenStore>,
    pub(crate) inner: Mutex<ClientState>,
    pub(crate) alarm: Mutex<AlarmScheduler>,
    pub(crate) events: broadcast::Sender<ClientEvent>,
}

impl DashboardClient {
    pub fn new(api: Arc<dyn RemoteInventory>, token_store: Option<TokenStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            session: RwLock::new(Session::default()),
            token_store,
            inner: Mutex::new(ClientState {
                medications: Vec::new(),
                history: Vec::new(),
                generation: 0,
                last_error: None,
            }),
            alarm: Mutex::new(AlarmScheduler::new()),
            events,
        })
    }

    /// Client against a live service, with the default on-disk token store.
    pub fn connect(base_url: impl Into<String>) -> Arc<Self> {
        let store = TokenStore::default_path().map(TokenStore::new);
        Self::new(Arc::new(HttpInventory::new(base_url)), store)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    // --- session lifecycle ---

    pub async fn login(&self, password: &str, remember_me: bool) -> Result<(), ClientError> {
        let token = self.api.login(password, remember_me).await?;
        if remember_me {
            if let Some(store) = &self.token_store {
                if let Err(err) = store.save(&token) {
                    debug!("token not persisted: {err}");
                }
            }
        }
        *self.session.write().await = Session::with_token(token);
        info!("logged in");
        Ok(())
    }

    /// Restores a persisted token, if any. Returns whether a session is now
    /// active; the first poll decides whether the token is still valid.
    pub async fn resume_session(&self) -> bool {
        let Some(token) = self.token_store.as_ref().and_then(TokenStore::load) else {
            return false;
        };
        *self.session.write().await = Session::with_token(token);
        true
    }

    pub async fn logout(&self) {
        self.invalidate_session().await;
    }

    /// Terminal session teardown: clears the token (memory and disk), empties
    /// both caches, resets the alarm machine, and notifies the presentation
    /// layer. Invoked on user logout and whenever any component observes an
    /// authorization failure.
    pub(crate) async fn invalidate_session(&self) {
        *self.session.write().await = Session::default();
        if let Some(store) = &self.token_store {
            store.clear();
        }
        {
            let mut inner = self.inner.lock().await;
            inner.medications.clear();
            inner.history.clear();
            inner.generation += 1;
            inner.last_error = None;
        }
        self.alarm.lock().await.reset();
        info!("session invalidated; caches cleared");
        self.emit(ClientEvent::SessionInvalidated);
    }

    pub async fn session_active(&self) -> bool {
        self.session.read().await.is_active()
    }

    pub(crate) async fn token(&self) -> Option<String> {
        self.session.read().await.token.clone()
    }

    pub(crate) async fn require_token(&self) -> Result<String, ClientError> {
        self.token().await.ok_or(ClientError::Auth)
    }

    // --- cache access ---

    /// Snapshot of the medication cache plus its generation counter. The
    /// generation changes iff the cache was replaced, which is what the sort
    /// projection memoizes on.
    pub async fn medications_snapshot(&self) -> (u64, Vec<Medication>) {
        let inner = self.inner.lock().await;
        (inner.generation, inner.medications.clone())
    }

    pub async fn history_snapshot(&self) -> Vec<HistoryEntry> {
        self.inner.lock().await.history.clone()
    }

    /// Message from the most recent failed foreground fetch, cleared by the
    /// next successful poll.
    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }

    pub(crate) async fn replace_medications(&self, medications: Vec<Medication>) {
        {
            let mut inner = self.inner.lock().await;
            inner.medications = medications;
            inner.generation += 1;
            inner.last_error = None;
        }
        self.emit(ClientEvent::MedicationsUpdated);
    }

    pub(crate) async fn replace_history(&self, history: Vec<HistoryEntry>) {
        self.inner.lock().await.history = history;
        self.emit(ClientEvent::HistoryUpdated);
    }

    /// Replaces the cache entry matching `updated` by id. A record whose id is
    /// no longer cached (deleted concurrently) is dropped silently.
    pub(crate) async fn fold_medication(&self, updated: Medication) {
        let mut changed = false;
        {
            let mut inner = self.inner.lock().await;
            if let Some(slot) = inner.medications.iter_mut().find(|m| m.id == updated.id) {
                *slot = updated;
                changed = true;
            }
            if changed {
                inner.generation += 1;
            }
        }
        if changed {
            self.emit(ClientEvent::MedicationsUpdated);
        }
    }

    // --- alarm orchestration ---

    pub async fn alarm_state(&self) -> AlarmState {
        self.alarm.lock().await.state().clone()
    }

    /// One scheduler tick at the given `"HH:MM"` minute. Emits
    /// [`ClientEvent::AlarmTriggered`] when a new alarm activates.
    pub async fn alarm_tick_at(&self, minute_key: &str) -> Option<MedicationId> {
        let triggered = {
            let inner = self.inner.lock().await;
            let mut alarm = self.alarm.lock().await;
            let id = alarm.tick(minute_key, &inner.medications)?;
            let name = inner
                .medications
                .iter()
                .find(|m| m.id == id)
                .map(|m| m.name.clone())
                .unwrap_or_default();
            (id, name)
        };
        info!(medication = %triggered.1, minute = minute_key, "dose alarm activated");
        self.emit(ClientEvent::AlarmTriggered {
            medication_id: triggered.0.clone(),
            name: triggered.1,
        });
        Some(triggered.0)
    }

    /// Runs the alarm state machine once per second against `clock` until
    /// cancelled or until the session ends.
    pub fn start_alarm_ticker(self: &Arc<Self>, clock: Arc<dyn Clock>) -> TaskHandle {
        let client = Arc::clone(self);
        schedule(std::time::Duration::from_secs(1), move || {
            let client = Arc::clone(&client);
            let clock = Arc::clone(&clock);
            async move {
                if !client.session_active().await {
                    return std::ops::ControlFlow::Break(());
                }
                client.alarm_tick_at(&clock.now_minute()).await;
                std::ops::ControlFlow::Continue(())
            }
        })
    }

    /// Confirms the active alarm. The confirmation is locked in (window entry
    /// plus transition to idle) before the dose-taken call goes out, so a slow
    /// or failed network round-trip can never re-trigger the same medication
    /// within the minute.
    pub async fn confirm_active_alarm(&self) -> Result<(), ClientError> {
        let Some(id) = self.alarm.lock().await.confirm() else {
            return Err(ClientError::Operation("no alarm is active".to_string()));
        };
        self.emit(ClientEvent::AlarmCleared);

        // The medication may have been deleted while its alarm was showing;
        // the confirmation still stands, only the network step is skipped.
        let cached = {
            let inner = self.inner.lock().await;
            inner.medications.iter().any(|m| m.id == id)
        };
        if !cached {
            debug!(medication_id = %id, "confirmed alarm for medication no longer cached");
            return Ok(());
        }
        let Some(token) = self.token().await else {
            debug!(medication_id = %id, "confirmed alarm without an active session");
            return Ok(());
        };

        match self.api.confirm_dose(&token, &id).await {
            Ok(updated) => {
                self.fold_medication(updated).await;
                Ok(())
            }
            Err(ClientError::Auth) => {
                self.invalidate_session().await;
                Err(ClientError::Auth)
            }
            Err(err) => {
                // The id stays in the confirmation window: de-duplication is a
                // UI-level guarantee independent of backend acknowledgment.
                self.emit(ClientEvent::Error(format!(
                    "dose confirmation was not recorded: {err}"
                )));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
