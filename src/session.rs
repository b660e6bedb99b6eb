//! # Exercise Session
//!
//! The system-level owner of one exercise attempt: it wires the event
//! bus, palette, workspace, world, execution engine, and the stores
//! together and exposes the interface the UI layer drives.
//!
//! A session holds the world behind a lock that the engine borrows
//! exclusively for the duration of a run, so nothing else can mutate
//! the character while a pass is `Running`. Program mutations persist
//! the snapshot immediately, matching the save-on-every-change behavior
//! learners expect when they reload a page.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::block::BlockId;
use crate::config::ExerciseConfig;
use crate::engine::{CharacterSurface, ExecutionEngine, Outcome, RunState, StepObserver};
use crate::error::Result;
use crate::event_bus::{DiagnosticReceiver, EventBus, EventReceiver, ExerciseEvent};
use crate::formatter;
use crate::progress::{Progress, ProgressTracker};
use crate::store::{KeyValueStore, ProgramStore};
use crate::workspace::{Palette, Workspace};
use crate::world::{Pose, WorldState};

pub struct ExerciseSession {
    config: ExerciseConfig,
    event_bus: Arc<EventBus>,
    engine: ExecutionEngine,
    world: RwLock<WorldState>,
    palette: Palette,
    workspace: RwLock<Workspace>,
    programs: ProgramStore,
    progress: ProgressTracker,
}

impl ExerciseSession {
    pub fn new(
        config: ExerciseConfig,
        palette: Palette,
        store: Arc<dyn KeyValueStore>,
        surface: Option<Arc<dyn CharacterSurface>>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let engine = ExecutionEngine::new(config.engine.clone(), event_bus.clone(), surface);
        let world = RwLock::new(config.world.build());
        Self {
            event_bus,
            engine,
            world,
            palette,
            workspace: RwLock::new(Workspace::new()),
            programs: ProgramStore::new(store.clone()),
            progress: ProgressTracker::new(store),
            config,
        }
    }

    pub fn config(&self) -> &ExerciseConfig {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn subscribe(&self) -> (EventReceiver, DiagnosticReceiver) {
        self.event_bus.subscribe()
    }

    pub fn register_step_observer(&self, name: &str, observer: StepObserver) {
        self.engine.register_step_observer(name, observer);
    }

    pub async fn state(&self) -> RunState {
        self.engine.state().await
    }

    pub async fn pose(&self) -> Pose {
        self.world.read().await.pose()
    }

    /// The preview listing for the current program.
    pub async fn preview(&self) -> String {
        formatter::render_program(self.workspace.read().await.program())
    }

    /// Places a palette template (looked up by kind and parameter) at
    /// the end of the program and persists the snapshot.
    pub async fn place(&self, kind: &str, parameter: &str) -> Result<Option<BlockId>> {
        let Some(template) = self.palette.find(kind, parameter) else {
            return Ok(None);
        };
        let id = {
            let mut workspace = self.workspace.write().await;
            workspace.place(template)
        };
        self.save_program().await?;
        Ok(Some(id))
    }

    /// Places a palette template inside an existing container block and
    /// persists the snapshot.
    pub async fn place_into(
        &self,
        parent: &BlockId,
        kind: &str,
        parameter: &str,
    ) -> Result<Option<BlockId>> {
        let Some(template) = self.palette.find(kind, parameter) else {
            return Ok(None);
        };
        let id = {
            let mut workspace = self.workspace.write().await;
            workspace.place_into(parent, template)?
        };
        self.save_program().await?;
        Ok(Some(id))
    }

    pub async fn remove_block(&self, id: &BlockId) -> Result<()> {
        {
            let mut workspace = self.workspace.write().await;
            let _ = workspace.remove(id)?;
        }
        self.save_program().await
    }

    pub async fn move_block(&self, id: &BlockId, index: usize) -> Result<()> {
        {
            let mut workspace = self.workspace.write().await;
            workspace.move_block(id, index)?;
        }
        self.save_program().await
    }

    /// Persists the current top-level program snapshot.
    pub async fn save_program(&self) -> Result<()> {
        let workspace = self.workspace.read().await;
        self.programs
            .save(&self.config.exercise_id, workspace.program())
            .await?;
        self.event_bus
            .publish(ExerciseEvent::ProgramSaved {
                exercise_id: self.config.exercise_id.clone(),
                blocks: workspace.len(),
            })
            .await?;
        Ok(())
    }

    /// Restores the saved program into the workspace. Returns the
    /// number of blocks restored (zero when nothing was saved or the
    /// snapshot was corrupted and discarded).
    pub async fn load_program(&self) -> Result<usize> {
        let Some(records) = self.programs.load(&self.config.exercise_id).await? else {
            return Ok(0);
        };
        let restored = {
            let mut workspace = self.workspace.write().await;
            workspace.restore(&records, &self.palette)
        };
        self.event_bus
            .publish(ExerciseEvent::ProgramLoaded {
                exercise_id: self.config.exercise_id.clone(),
                blocks: restored,
            })
            .await?;
        Ok(restored)
    }

    /// Removes the persisted snapshot and clears the workspace.
    pub async fn reset_program(&self) -> Result<()> {
        self.programs.reset(&self.config.exercise_id).await?;
        self.workspace.write().await.clear();
        Ok(())
    }

    /// Full reset: program, world pose, and run state. Only meaningful
    /// while no run is active.
    pub async fn reset(&self) -> Result<()> {
        self.engine.reset().await?;
        self.reset_program().await?;
        self.world.write().await.reset();
        self.event_bus
            .publish(ExerciseEvent::RunReset {
                exercise_id: self.config.exercise_id.clone(),
            })
            .await?;
        Ok(())
    }

    /// Executes the composed program from the exercise's start pose and
    /// reports the outcome. A success on first completion records
    /// progress and announces it.
    pub async fn run(&self) -> Result<Outcome> {
        if self.engine.is_busy() {
            return Err(crate::engine::ExecutionError::RunInProgress.into());
        }
        let program = self.workspace.read().await.program().to_vec();
        debug!(
            exercise_id = %self.config.exercise_id,
            blocks = program.len(),
            "starting execution pass"
        );

        let outcome = {
            let mut world = self.world.write().await;
            world.reset();
            self.event_bus
                .publish(ExerciseEvent::RunStarted {
                    exercise_id: self.config.exercise_id.clone(),
                })
                .await?;
            self.engine.execute(&program, &mut world).await?
        };

        if outcome == Outcome::Succeeded {
            let progress = self.record_completion().await?;
            info!(
                exercise_id = %self.config.exercise_id,
                points = progress.points,
                "exercise completed"
            );
        }
        Ok(outcome)
    }

    pub async fn record_hint_used(&self) -> Result<()> {
        self.progress
            .record_hint_used(&self.config.exercise_id)
            .await?;
        Ok(())
    }

    pub async fn progress(&self) -> Result<Progress> {
        Ok(self.progress.progress(&self.config.path).await?)
    }

    async fn record_completion(&self) -> Result<Progress> {
        let progress = self
            .progress
            .record_completion(&self.config.path, &self.config.exercise_id, self.config.level)
            .await?;
        self.event_bus
            .publish(ExerciseEvent::ExerciseCompleted {
                exercise_id: self.config.exercise_id.clone(),
                points: progress.points,
            })
            .await?;
        Ok(progress)
    }
}
