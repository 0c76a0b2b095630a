//! Dialogue runtime executor

use super::{choice_views, DialogueSnapshot, SessionEvent};
use crate::locale::Locale;
use crate::state_machine::{
    transition, DialogueContext, DialogueState, Effect, Event, TransitionError,
};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// A visitor event awaiting the outcome of its transition
#[derive(Debug)]
pub struct Request {
    pub event: Event,
    pub respond_to: oneshot::Sender<Result<DialogueSnapshot, TransitionError>>,
}

/// Single-session actor: applies events in order and executes their effects
pub struct DialogueRuntime {
    session_id: String,
    locale: Locale,
    context: DialogueContext,
    state: DialogueState,
    /// Timer and locale events
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    /// Visitor events
    request_rx: mpsc::Receiver<Request>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<DialogueSnapshot>,
    /// Token to cancel the pending reply timer; at most one exists
    reply_cancel_token: Option<CancellationToken>,
    shutdown: CancellationToken,
}

impl DialogueRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        locale: Locale,
        context: DialogueContext,
        state: DialogueState,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        request_rx: mpsc::Receiver<Request>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        snapshot_tx: watch::Sender<DialogueSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            locale,
            context,
            state,
            event_rx,
            event_tx,
            request_rx,
            broadcast_tx,
            snapshot_tx,
            reply_cancel_token: None,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting dialogue runtime");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                request = self.request_rx.recv() => {
                    let Some(Request { event, respond_to }) = request else {
                        break;
                    };
                    let outcome = self.process_event(event).map(|()| self.snapshot());
                    // The caller may have gone away; the transition still stands
                    let _ = respond_to.send(outcome);
                }
                Some(event) = self.event_rx.recv() => {
                    let _ = self.process_event(event);
                }
            }
        }

        // Teardown: nothing may fire into a discarded session
        if let Some(token) = self.reply_cancel_token.take() {
            tracing::debug!(session_id = %self.session_id, "Cancelling pending reply on teardown");
            token.cancel();
        }
        tracing::info!(session_id = %self.session_id, "Dialogue runtime stopped");
    }

    fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let kind = event.kind();
        let relocalized = match &event {
            Event::LocaleChanged { locale, graph } => Some((*locale, graph.clone())),
            _ => None,
        };
        let reply_landed = matches!(event, Event::ReplyDue { .. });

        // Pure state transition
        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(e) => {
                self.report(kind, &e);
                return Err(e);
            }
        };

        if let Some((locale, graph)) = relocalized {
            self.locale = locale;
            self.context.graph = graph;
        }
        if reply_landed {
            // The timer that produced this event has finished
            self.reply_cancel_token = None;
        }
        self.state = result.new_state;
        tracing::debug!(
            session_id = %self.session_id,
            event = kind,
            node = %self.state.current_node,
            composing = self.state.is_composing(),
            "Dialogue transition"
        );

        for effect in result.effects {
            self.execute_effect(effect);
        }
        self.snapshot_tx.send_replace(self.snapshot());
        Ok(())
    }

    fn report(&self, kind: &str, error: &TransitionError) {
        match error {
            TransitionError::StaleReply { reply_id } => {
                // A timer that lost the race against cancellation
                tracing::debug!(session_id = %self.session_id, %reply_id, "Dropping stale reply");
                return;
            }
            TransitionError::Composing => {
                tracing::warn!(session_id = %self.session_id, event = kind, "Choice rejected while composing");
            }
            e if e.is_programming_error() => {
                tracing::error!(
                    session_id = %self.session_id,
                    event = kind,
                    node = %self.state.current_node,
                    error = %e,
                    "Dialogue contract violation"
                );
            }
            _ => {}
        }
        let _ = self.broadcast_tx.send(SessionEvent::Error {
            message: error.to_string(),
        });
    }

    /// Execute an effect
    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::PublishEntry { entry } => {
                let _ = self.broadcast_tx.send(SessionEvent::Entry { entry });
            }

            Effect::PublishState => {
                let _ = self.broadcast_tx.send(SessionEvent::StateChange {
                    current_node: self.state.current_node.clone(),
                    composing: self.state.is_composing(),
                    choices: choice_views(&self.state, &self.context),
                });
            }

            Effect::ScheduleReply { reply_id, delay } => {
                self.schedule_reply(reply_id, delay);
            }

            Effect::CancelReply => {
                if let Some(token) = self.reply_cancel_token.take() {
                    tracing::info!(session_id = %self.session_id, "Cancelling pending reply");
                    token.cancel();
                }
            }

            Effect::PublishReset => {
                let _ = self.broadcast_tx.send(SessionEvent::Reset {
                    snapshot: self.snapshot(),
                });
            }
        }
    }

    fn schedule_reply(&mut self, reply_id: String, delay: Duration) {
        let cancel_token = CancellationToken::new();
        if let Some(previous) = self.reply_cancel_token.replace(cancel_token.clone()) {
            previous.cancel();
        }

        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::debug!(%reply_id, "Reply timer cancelled");
                }

                () = tokio::time::sleep(delay) => {
                    let _ = event_tx.send(Event::ReplyDue { reply_id }).await;
                }
            }
        });
    }

    fn snapshot(&self) -> DialogueSnapshot {
        DialogueSnapshot::build(&self.session_id, self.locale, &self.state, &self.context)
    }
}
