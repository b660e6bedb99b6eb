//! # Event Bus
//!
//! Central messaging hub between the execution engine and the UI
//! layer. It provides a broadcast-based publish-subscribe mechanism so
//! the presentation side (block highlighting, completion banners) can
//! follow a run without the engine holding direct references to it.
//!
//! Two separate channels are maintained:
//!
//! 1. A run-event channel carrying the step-by-step execution trace
//! 2. A diagnostics channel for non-fatal reports (malformed blocks,
//!    unknown conditions, discarded snapshots)
//!
//! The implementation uses Tokio's broadcast channel rather than MPSC
//! channels so that multiple subscribers (highlighter, progress panel,
//! test probes) receive the same event, with backpressure bounded by
//! the channel capacity. High-volume events such as pose updates are
//! logged at `trace` level only.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace};

use crate::block::BlockId;
use crate::engine::Outcome;
use crate::world::Point;

/// One entry in the time-ordered trace of an exercise session.
///
/// `StepStarted` is published before the named block begins executing
/// and drives the "currently executing" highlight; `PoseChanged`
/// follows each movement step once its animation delay has elapsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExerciseEvent {
    RunStarted {
        exercise_id: String,
    },
    StepStarted {
        block_id: BlockId,
        kind: String,
        parameter: String,
    },
    PoseChanged {
        position: Point,
        heading: f64,
    },
    RunCompleted {
        outcome: Outcome,
    },
    RunReset {
        exercise_id: String,
    },
    ProgramSaved {
        exercise_id: String,
        blocks: usize,
    },
    ProgramLoaded {
        exercise_id: String,
        blocks: usize,
    },
    ExerciseCompleted {
        exercise_id: String,
        points: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum Severity {
    #[default]
    Warning,
    Error,
    Critical,
}

/// Non-fatal report published on the diagnostics channel. Execution
/// continues past everything reported here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub component: String,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn warning(component: &str, message: impl Into<String>) -> Self {
        Self {
            component: component.to_string(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// # EventBus
///
/// Broadcast hub distributing [`ExerciseEvent`]s and [`Diagnostic`]s to
/// any number of receivers. Capacity bounds how many unprocessed
/// entries a channel buffers before slow receivers start lagging.
pub struct EventBus {
    /// Broadcast sender for run events
    event_sender: broadcast::Sender<ExerciseEvent>,
    /// Broadcast sender for diagnostics
    diagnostic_sender: broadcast::Sender<Diagnostic>,
    /// Maximum number of entries that can be buffered per channel
    capacity: usize,
    /// Internal receiver to keep the event channel active
    _internal_receiver: broadcast::Receiver<ExerciseEvent>,
    /// Internal receiver to keep the diagnostics channel active
    _internal_diagnostic_receiver: broadcast::Receiver<Diagnostic>,
}

impl EventBus {
    /// Creates a new EventBus with the specified buffer capacity.
    ///
    /// Size the capacity for the expected event volume: a run emits two
    /// events per movement step plus one per block entered.
    pub fn new(capacity: usize) -> Self {
        let (event_sender, event_receiver) = broadcast::channel(capacity);
        let (diagnostic_sender, diagnostic_receiver) = broadcast::channel(capacity);
        Self {
            event_sender,
            diagnostic_sender,
            capacity,
            _internal_receiver: event_receiver,
            _internal_diagnostic_receiver: diagnostic_receiver,
        }
    }

    /// Subscribes to both run events and diagnostics.
    pub fn subscribe(&self) -> (EventReceiver, DiagnosticReceiver) {
        let event_rx = self.event_sender.subscribe();
        let diagnostic_rx = self.diagnostic_sender.subscribe();
        (
            EventReceiver::new(event_rx),
            DiagnosticReceiver::new(diagnostic_rx),
        )
    }

    /// Run events as a [`tokio_stream`] stream, for consumers that
    /// prefer combinators over an explicit receive loop.
    pub fn stream(&self) -> BroadcastStream<ExerciseEvent> {
        BroadcastStream::new(self.event_sender.subscribe())
    }

    /// Publishes a run event to all subscribers.
    pub async fn publish(&self, event: ExerciseEvent) -> EventResult<()> {
        debug_event("Publishing", &event);
        self.event_sender
            .send(event)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Publishes a run event from a synchronous context without
    /// awaiting. Behavior matches the async version.
    pub fn sync_publish(&self, event: ExerciseEvent) -> EventResult<()> {
        debug_event("Sync publishing", &event);
        self.event_sender
            .send(event)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Publishes a diagnostic to all diagnostics subscribers.
    pub async fn publish_diagnostic(&self, diagnostic: Diagnostic) -> EventResult<()> {
        self.diagnostic_sender
            .send(diagnostic)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Synchronous variant of [`Self::publish_diagnostic`].
    pub fn sync_publish_diagnostic(&self, diagnostic: Diagnostic) -> EventResult<()> {
        self.diagnostic_sender
            .send(diagnostic)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    pub fn queue_size(&self) -> usize {
        self.event_sender.len()
    }

    pub fn diagnostic_queue_size(&self) -> usize {
        self.diagnostic_sender.len()
    }

    pub fn subscribers_size(&self) -> usize {
        self.event_sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn debug_event(prefix: &str, event: &ExerciseEvent) {
    match event {
        ExerciseEvent::PoseChanged { .. } | ExerciseEvent::StepStarted { .. } => {
            trace!("{} event: {:?}", prefix, event)
        }
        _ => debug!("{} event: {:?}", prefix, event),
    }
}

pub struct EventReceiver {
    pub receiver: broadcast::Receiver<ExerciseEvent>,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<ExerciseEvent>) -> Self {
        Self { receiver }
    }

    /// Receives the next event. On lag the receiver resubscribes so the
    /// caller can keep consuming from the live edge, and the number of
    /// skipped events is reported.
    pub async fn recv(&mut self) -> EventResult<ExerciseEvent> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                self.receiver = self.receiver.resubscribe();
                Err(EventError::Lagged { count: n })
            }
            Err(e) => Err(EventError::ReceiveFailed {
                message: e.to_string(),
            }),
        }
    }
}

pub struct DiagnosticReceiver {
    pub receiver: broadcast::Receiver<Diagnostic>,
}

impl DiagnosticReceiver {
    fn new(receiver: broadcast::Receiver<Diagnostic>) -> Self {
        Self { receiver }
    }

    pub async fn recv(&mut self) -> EventResult<Diagnostic> {
        self.receiver
            .recv()
            .await
            .map_err(|e| EventError::ReceiveFailed {
                message: e.to_string(),
            })
    }
}

#[derive(Error, Debug)]
pub enum EventError {
    #[error("Event send failed: {message}")]
    SendFailed { message: String },

    #[error("Event receive failed: {message}")]
    ReceiveFailed { message: String },

    #[error("Event receiver lagged: {count}")]
    Lagged { count: u64 },
}

pub type EventResult<T> = Result<T, EventError>;
