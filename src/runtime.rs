//! Runtime for executing dialogue sessions
//!
//! Each session is a single tokio task that owns its state and at most one
//! pending reply timer. Observers read snapshots and a stream of events.

mod executor;


pub use executor::{DialogueRuntime, Request};

use crate::locale::{CatalogError, GraphCatalog, Locale, LocaleWatcher};
use crate::state_machine::{
    DialogueContext, DialogueState, Event, TranscriptEntry, TransitionError,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A choice as offered to the visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceView {
    pub index: usize,
    pub label: String,
}

/// Everything a presentation layer needs to render a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueSnapshot {
    pub session_id: String,
    pub locale: Locale,
    pub current_node: String,
    pub transcript: Vec<TranscriptEntry>,
    /// Empty while composing
    pub choices: Vec<ChoiceView>,
    pub composing: bool,
}

impl DialogueSnapshot {
    pub fn build(
        session_id: &str,
        locale: Locale,
        state: &DialogueState,
        context: &DialogueContext,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            locale,
            current_node: state.current_node.clone(),
            transcript: state.transcript.clone(),
            choices: choice_views(state, context),
            composing: state.is_composing(),
        }
    }
}

pub(crate) fn choice_views(state: &DialogueState, context: &DialogueContext) -> Vec<ChoiceView> {
    state
        .available_choices(&context.graph)
        .iter()
        .enumerate()
        .map(|(index, choice)| ChoiceView {
            index,
            label: choice.label.clone(),
        })
        .collect()
}

/// Events sent to observers of a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Init {
        snapshot: DialogueSnapshot,
    },
    Entry {
        entry: TranscriptEntry,
    },
    StateChange {
        current_node: String,
        composing: bool,
        choices: Vec<ChoiceView>,
    },
    /// The session was replaced wholesale (reset or locale change)
    Reset {
        snapshot: DialogueSnapshot,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error("session has ended")]
    Closed,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

// ============================================================================
// Session Handle
// ============================================================================

/// Handle to interact with a running session
pub struct SessionHandle {
    id: String,
    request_tx: mpsc::Sender<Request>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_rx: watch::Receiver<DialogueSnapshot>,
    locale: LocaleWatcher,
    shutdown: CancellationToken,
    last_activity: Mutex<Instant>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pick one of the currently offered choices
    pub async fn select_choice(&self, index: usize) -> Result<DialogueSnapshot, SessionError> {
        self.request(Event::choice(index)).await
    }

    /// Restart the conversation at the start node
    pub async fn reset(&self) -> Result<DialogueSnapshot, SessionError> {
        self.request(Event::Reset).await
    }

    /// Switch locale; the session restarts once the new graph arrives.
    /// Returns false when the locale was already active.
    pub fn change_locale(&self, locale: Locale) -> bool {
        self.touch();
        self.locale.set(locale)
    }

    pub fn snapshot(&self) -> DialogueSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that sees every published snapshot
    #[allow(dead_code)] // Used by tests and embedders that poll instead of streaming
    pub fn watch(&self) -> watch::Receiver<DialogueSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Stop the runtime; any pending reply timer is cancelled
    pub fn end(&self) {
        self.shutdown.cancel();
    }

    pub fn is_ended(&self) -> bool {
        self.shutdown.is_cancelled() || self.request_tx.is_closed()
    }

    fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .map(|at| at.elapsed())
            .unwrap_or_default()
    }

    fn touch(&self) {
        if let Ok(mut at) = self.last_activity.lock() {
            *at = Instant::now();
        }
    }

    async fn request(&self, event: Event) -> Result<DialogueSnapshot, SessionError> {
        self.touch();
        let (respond_to, response) = oneshot::channel();
        self.request_tx
            .send(Request { event, respond_to })
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(response.await.map_err(|_| SessionError::Closed)??)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ============================================================================
// Session Manager
// ============================================================================

/// Settings applied to every new session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub reply_delay: Duration,
    pub default_locale: Locale,
    pub idle_ttl: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reply_delay: crate::state_machine::state::DEFAULT_REPLY_DELAY,
            default_locale: Locale::default(),
            idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// Manager for all live dialogue sessions
pub struct SessionManager {
    catalog: Arc<dyn GraphCatalog>,
    settings: SessionSettings,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionManager {
    pub fn new(catalog: Arc<dyn GraphCatalog>, settings: SessionSettings) -> Self {
        Self {
            catalog,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn GraphCatalog> {
        &self.catalog
    }

    pub fn default_locale(&self) -> Locale {
        self.settings.default_locale
    }

    /// Start a new session at the start node of the locale's graph
    pub async fn create(&self, locale: Option<Locale>) -> Result<Arc<SessionHandle>, SessionError> {
        let locale = locale.unwrap_or(self.settings.default_locale);
        let graph = self.catalog.graph(locale)?;
        let session_id = uuid::Uuid::new_v4().to_string();

        let context = DialogueContext::new(graph).with_reply_delay(self.settings.reply_delay);
        let state = DialogueState::initial(&context.graph);
        let initial = DialogueSnapshot::build(&session_id, locale, &state, &context);

        let (event_tx, event_rx) = mpsc::channel(32);
        let (request_tx, request_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let shutdown = CancellationToken::new();

        let runtime = DialogueRuntime::new(
            session_id.clone(),
            locale,
            context,
            state,
            event_rx,
            event_tx.clone(),
            request_rx,
            broadcast_tx.clone(),
            snapshot_tx,
            shutdown.clone(),
        );
        tokio::spawn(runtime.run());

        let handle = Arc::new(SessionHandle {
            id: session_id.clone(),
            request_tx,
            broadcast_tx,
            snapshot_rx,
            locale: LocaleWatcher::spawn(locale, self.catalog.clone(), event_tx),
            shutdown,
            last_activity: Mutex::new(Instant::now()),
        });

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle.clone());
        tracing::info!(session_id = %session_id, %locale, "Dialogue session created");
        Ok(handle)
    }

    pub async fn get(&self, session_id: &str) -> Result<Arc<SessionHandle>, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Tear a session down (the hosting view went away)
    pub async fn end(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        handle.end();
        tracing::info!(session_id = %session_id, "Dialogue session ended");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle past the TTL, and any whose runtime already stopped
    pub async fn reap_idle(&self) -> usize {
        let ttl = self.settings.idle_ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| {
            let keep = !handle.is_ended() && handle.idle_for() < ttl;
            if !keep {
                handle.end();
            }
            keep
        });
        let reaped = before - sessions.len();
        if reaped > 0 {
            tracing::info!(reaped, remaining = sessions.len(), "Reaped idle dialogue sessions");
        }
        reaped
    }

    /// Start the background task that reaps idle sessions
    pub fn start_reaper(self: &Arc<Self>) {
        let manager = Arc::downgrade(self);
        let period = (self.settings.idle_ttl / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.reap_idle().await;
            }
            tracing::debug!("Session reaper stopped");
        });
    }
}
