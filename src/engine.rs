//! # Execution Engine
//!
//! Walks an ordered sequence of blocks and executes them as a
//! sequential, animated program against a mutable world.
//!
//! ## Sequencing
//!
//! Execution is depth-first and strictly ordered: a block does not
//! yield to its successor until its effect, including the animation
//! delay, is fully realized. Nested repeat and conditional bodies run
//! to full completion (with their own delays) before the parent
//! sequence advances; suspension composes depth-first. Each movement
//! step suspends the logical execution thread on the Tokio timer for
//! the configured step duration, then pushes the new pose to the
//! character surface.
//!
//! ## State machine
//!
//! ```text
//! Idle → Running → { Succeeded, Failed }
//! ```
//!
//! Terminal states are re-entered only through an explicit reset. One
//! execution pass may be active at a time per engine: a second
//! `execute` while one is in flight is rejected with
//! [`ExecutionError::RunInProgress`]. `cancel` aborts the pending chain
//! at the next block boundary, leaving the world at its last fully
//! applied step.
//!
//! ## Error policy
//!
//! Malformed blocks (unknown kinds, unknown condition names) are
//! skipped with a diagnostic; they never fail a run. Only setup
//! problems (a missing character surface) stop a run before it
//! starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_recursion::async_recursion;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::block::{Block, BlockBody};
use crate::condition::{self, Condition};
use crate::config::EngineConfig;
use crate::event_bus::{Diagnostic, EventBus, EventError, ExerciseEvent};
use crate::world::{Pose, WorldState};

/// Rendering surface for the executing character.
///
/// The engine owns the world during a run; the surface is a pure
/// outbound sink receiving the pose once per movement step, after the
/// step's animation delay has elapsed.
#[async_trait]
pub trait CharacterSurface: Send + Sync {
    async fn set_pose(&self, pose: Pose);
}

/// Observer invoked just before each block begins executing, alongside
/// the `StepStarted` event. Drives per-step UI such as the "currently
/// executing" highlight.
pub type StepObserver = Box<dyn Fn(&Block) -> BoxFuture<'static, ()> + Send + Sync>;

/// Lifecycle of one engine across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Terminal result of a completed execution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize)]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl From<Outcome> for RunState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Succeeded => RunState::Succeeded,
            Outcome::Failed => RunState::Failed,
        }
    }
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("no character surface attached")]
    SurfaceMissing,

    #[error("an execution pass is already in flight")]
    RunInProgress,

    #[error("execution cancelled")]
    Cancelled,

    #[error("event error: {0}")]
    Event(#[from] EventError),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Executes block programs against a world, one pass at a time.
pub struct ExecutionEngine {
    config: EngineConfig,
    event_bus: Arc<EventBus>,
    surface: Option<Arc<dyn CharacterSurface>>,
    step_observers: DashMap<String, StepObserver>,
    state: RwLock<RunState>,
    busy: AtomicBool,
    cancelled: AtomicBool,
}

impl ExecutionEngine {
    pub fn new(
        config: EngineConfig,
        event_bus: Arc<EventBus>,
        surface: Option<Arc<dyn CharacterSurface>>,
    ) -> Self {
        Self {
            config,
            event_bus,
            surface,
            step_observers: DashMap::new(),
            state: RwLock::new(RunState::Idle),
            busy: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn state(&self) -> RunState {
        *self.state.read().await
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Registers a named step observer. Re-registering a name replaces
    /// the previous observer.
    pub fn register_step_observer(&self, name: &str, observer: StepObserver) {
        let _ = self.step_observers.insert(name.to_string(), observer);
    }

    pub fn unregister_step_observer(&self, name: &str) {
        let _ = self.step_observers.remove(name);
    }

    /// Requests cancellation of the in-flight pass. Checked at every
    /// block boundary; a no-op when nothing is running.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns the engine to `Idle` so a terminal state can be re-run.
    pub async fn reset(&self) -> ExecutionResult<()> {
        if self.is_busy() {
            return Err(ExecutionError::RunInProgress);
        }
        *self.state.write().await = RunState::Idle;
        Ok(())
    }

    /// Runs `program` against `world` to completion and reports the
    /// outcome.
    ///
    /// The world is borrowed exclusively for the whole pass; nothing
    /// else can mutate the pose while the engine is `Running`. After
    /// the top-level sequence is exhausted the completion check runs
    /// exactly once: any goal within threshold means `Succeeded`.
    pub async fn execute(
        &self,
        program: &[Block],
        world: &mut WorldState,
    ) -> ExecutionResult<Outcome> {
        let surface = self
            .surface
            .clone()
            .ok_or(ExecutionError::SurfaceMissing)?;
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ExecutionError::RunInProgress);
        }
        self.cancelled.store(false, Ordering::SeqCst);

        let result = self.run_pass(program, world, &surface).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run_pass(
        &self,
        program: &[Block],
        world: &mut WorldState,
        surface: &Arc<dyn CharacterSurface>,
    ) -> ExecutionResult<Outcome> {
        *self.state.write().await = RunState::Running;
        match self.run_sequence(program, world, surface).await {
            Ok(()) => {
                let outcome = if world.at_any_goal() {
                    Outcome::Succeeded
                } else {
                    Outcome::Failed
                };
                debug!(%outcome, "execution pass complete");
                *self.state.write().await = RunState::from(outcome);
                self.event_bus
                    .publish(ExerciseEvent::RunCompleted { outcome })
                    .await?;
                Ok(outcome)
            }
            Err(e) => {
                *self.state.write().await = RunState::Idle;
                Err(e)
            }
        }
    }

    #[async_recursion]
    async fn run_sequence(
        &self,
        blocks: &[Block],
        world: &mut WorldState,
        surface: &Arc<dyn CharacterSurface>,
    ) -> ExecutionResult<()> {
        for block in blocks {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(ExecutionError::Cancelled);
            }
            self.notify_step(block).await?;
            match block.body() {
                BlockBody::Move { distance } => {
                    world.advance(f64::from(*distance) * self.config.step_scale);
                    self.settle(world, surface).await?;
                }
                BlockBody::Turn { direction } => {
                    world.turn(*direction);
                    self.settle(world, surface).await?;
                }
                BlockBody::Repeat { count, children } => {
                    for _ in 0..*count {
                        self.run_sequence(children, world, surface).await?;
                    }
                }
                BlockBody::Conditional {
                    condition,
                    children,
                } => {
                    if let Condition::Unknown(name) = condition {
                        self.report_malformed(block, format!("unknown condition `{name}`"))
                            .await;
                    }
                    if condition::evaluate(condition, world, self.config.unit_step()) {
                        self.run_sequence(children, world, surface).await?;
                    }
                }
                BlockBody::Unknown { kind } => {
                    self.report_malformed(block, format!("unknown block kind `{kind}`"))
                        .await;
                }
            }
        }
        Ok(())
    }

    /// Completes one movement step: wait out the animation, then push
    /// the settled pose outward.
    async fn settle(
        &self,
        world: &WorldState,
        surface: &Arc<dyn CharacterSurface>,
    ) -> ExecutionResult<()> {
        sleep(self.config.step_duration).await;
        surface.set_pose(world.pose()).await;
        self.event_bus
            .publish(ExerciseEvent::PoseChanged {
                position: world.position(),
                heading: world.heading(),
            })
            .await?;
        Ok(())
    }

    async fn notify_step(&self, block: &Block) -> ExecutionResult<()> {
        debug!(block = %block.id(), kind = block.kind(), "executing block");
        self.event_bus
            .publish(ExerciseEvent::StepStarted {
                block_id: block.id().clone(),
                kind: block.kind().to_string(),
                parameter: block.parameter(),
            })
            .await?;
        // The returned futures own their data, so the map guards are
        // released before anything is awaited.
        let pending: Vec<_> = self
            .step_observers
            .iter()
            .map(|observer| observer.value()(block))
            .collect();
        for invocation in pending {
            invocation.await;
        }
        Ok(())
    }

    async fn report_malformed(&self, block: &Block, message: String) {
        warn!(block = %block.id(), "{message}, skipping");
        let _ = self
            .event_bus
            .publish_diagnostic(Diagnostic::warning("engine", message))
            .await;
    }
}
