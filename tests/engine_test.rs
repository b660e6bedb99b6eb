use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::Mutex;

use blockrun::block::{Block, TurnDirection};
use blockrun::condition::Condition;
use blockrun::config::EngineConfig;
use blockrun::engine::{CharacterSurface, ExecutionEngine, ExecutionError, Outcome, RunState};
use blockrun::event_bus::{EventBus, ExerciseEvent};
use blockrun::world::{Point, Pose, Region, WorldState};

/// Surface that records every settled pose, in order.
#[derive(Default)]
struct RecordingSurface {
    poses: Mutex<Vec<Pose>>,
}

impl RecordingSurface {
    async fn poses(&self) -> Vec<Pose> {
        self.poses.lock().await.clone()
    }
}

#[async_trait]
impl CharacterSurface for RecordingSurface {
    async fn set_pose(&self, pose: Pose) {
        self.poses.lock().await.push(pose);
    }
}

fn empty_world() -> WorldState {
    WorldState::new(Pose::default(), 40.0, vec![], vec![])
}

fn engine_with(
    config: EngineConfig,
) -> (ExecutionEngine, Arc<EventBus>, Arc<RecordingSurface>) {
    let bus = Arc::new(EventBus::new(256));
    let surface = Arc::new(RecordingSurface::default());
    let engine = ExecutionEngine::new(config, bus.clone(), Some(surface.clone()));
    (engine, bus, surface)
}

fn default_engine() -> (ExecutionEngine, Arc<EventBus>, Arc<RecordingSurface>) {
    engine_with(EngineConfig::default())
}

#[tokio::test(start_paused = true)]
async fn sequencing_produces_the_reference_trajectory() {
    let (engine, _bus, surface) = default_engine();
    let mut world = empty_world();
    let program = vec![
        Block::move_by(1),
        Block::turn(TurnDirection::Right),
        Block::move_by(1),
    ];

    let started = tokio::time::Instant::now();
    let outcome = engine.execute(&program, &mut world).await.unwrap();

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(world.heading(), 90.0);
    assert!((world.position().x - 50.0).abs() < 1e-9);
    assert!((world.position().y + 50.0).abs() < 1e-9);
    // Three animated steps at 500 ms each.
    assert_eq!(started.elapsed(), Duration::from_millis(1500));

    let poses = surface.poses().await;
    assert_eq!(poses.len(), 3);
    assert_eq!(poses[0].heading, 0.0);
    assert_eq!(poses[0].position.y, -50.0);
    assert_eq!(poses[1].heading, 90.0);
    assert_eq!(poses[2].heading, 90.0);
    assert!((poses[2].position.x - 50.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn repeat_zero_runs_nothing() {
    let (engine, _bus, surface) = default_engine();
    let mut world = empty_world();
    let program = vec![
        Block::repeat(0, vec![Block::move_by(1)]),
        Block::move_by(1),
    ];

    let started = tokio::time::Instant::now();
    engine.execute(&program, &mut world).await.unwrap();

    // Only the sibling Move ran: one delay, one pose.
    assert_eq!(started.elapsed(), Duration::from_millis(500));
    assert_eq!(surface.poses().await.len(), 1);
    assert_eq!(world.position().y, -50.0);
}

#[tokio::test(start_paused = true)]
async fn false_conditional_short_circuits() {
    let (engine, bus, surface) = default_engine();
    let (mut rx, _) = bus.subscribe();
    // Obstacle one step ahead: pathAhead is false.
    let mut world = WorldState::new(
        Pose::default(),
        40.0,
        vec![Region::new(Point::new(0.0, -50.0), 40.0)],
        vec![],
    );
    let program = vec![Block::conditional(
        Condition::PathAhead,
        vec![Block::move_by(1), Block::turn(TurnDirection::Left)],
    )];

    let started = tokio::time::Instant::now();
    engine.execute(&program, &mut world).await.unwrap();

    // Skipped children: zero animation, zero delay, unchanged pose.
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(surface.poses().await.is_empty());
    assert_eq!(world.pose(), Pose::default());

    // Only the conditional itself was announced.
    assert!(matches!(
        rx.recv().await.unwrap(),
        ExerciseEvent::StepStarted { kind, .. } if kind == "if"
    ));
    assert!(matches!(
        rx.recv().await.unwrap(),
        ExerciseEvent::RunCompleted { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn true_conditional_runs_children_once() {
    let (engine, _bus, surface) = default_engine();
    let mut world = empty_world();
    let program = vec![Block::conditional(
        Condition::CanTurnRight,
        vec![Block::turn(TurnDirection::Right)],
    )];

    engine.execute(&program, &mut world).await.unwrap();

    assert_eq!(surface.poses().await.len(), 1);
    assert_eq!(world.heading(), 90.0);
}

#[tokio::test(start_paused = true)]
async fn nested_bodies_complete_before_the_parent_advances() {
    let (engine, bus, surface) = default_engine();
    let (mut rx, _) = bus.subscribe();
    let mut world = empty_world();
    let program = vec![
        Block::repeat(2, vec![Block::move_by(1)]),
        Block::turn(TurnDirection::Left),
    ];

    let started = tokio::time::Instant::now();
    engine.execute(&program, &mut world).await.unwrap();

    // Both repetitions (and their delays) finish before the turn starts.
    assert_eq!(started.elapsed(), Duration::from_millis(1500));
    let poses = surface.poses().await;
    assert_eq!(poses.len(), 3);
    assert_eq!(poses[0].position.y, -50.0);
    assert_eq!(poses[1].position.y, -100.0);
    assert_eq!(poses[2].heading, -90.0);

    let mut kinds = Vec::new();
    loop {
        match rx.recv().await.unwrap() {
            ExerciseEvent::StepStarted { kind, .. } => kinds.push(kind),
            ExerciseEvent::RunCompleted { .. } => break,
            _ => {}
        }
    }
    assert_eq!(kinds, vec!["repeat", "move", "move", "turn"]);
}

#[tokio::test(start_paused = true)]
async fn deep_nesting_executes_depth_first() {
    let (engine, _bus, surface) = default_engine();
    let mut world = empty_world();
    // repeat(2) { repeat(2) { move(1) } }: four moves in total.
    let program = vec![Block::repeat(
        2,
        vec![Block::repeat(2, vec![Block::move_by(1)])],
    )];

    engine.execute(&program, &mut world).await.unwrap();

    assert_eq!(surface.poses().await.len(), 4);
    assert_eq!(world.position().y, -200.0);
}

#[tokio::test(start_paused = true)]
async fn goal_overlap_decides_the_outcome() {
    let goal = Region::new(Point::new(0.0, -100.0), 40.0);

    let (engine, _bus, _surface) = default_engine();
    let mut world = WorldState::new(Pose::default(), 40.0, vec![], vec![goal]);
    let outcome = engine
        .execute(&[Block::move_by(2)], &mut world)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Succeeded);
    assert_eq!(engine.state().await, RunState::Succeeded);

    let (engine, _bus, _surface) = default_engine();
    let mut world = WorldState::new(Pose::default(), 40.0, vec![], vec![goal]);
    let outcome = engine
        .execute(&[Block::move_by(1)], &mut world)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(engine.state().await, RunState::Failed);
}

#[tokio::test(start_paused = true)]
async fn unknown_blocks_are_skipped_with_a_diagnostic() {
    let (engine, bus, _surface) = default_engine();
    let (_, mut diagnostics) = bus.subscribe();
    let mut world = empty_world();
    let program = vec![
        Block::new(blockrun::block::BlockBody::Unknown {
            kind: "sing".to_string(),
        }),
        Block::move_by(1),
    ];

    let outcome = engine.execute(&program, &mut world).await;
    assert!(outcome.is_ok());
    // The unknown block had no effect; the move still ran.
    assert_eq!(world.position().y, -50.0);

    let diagnostic = diagnostics.recv().await.unwrap();
    assert!(diagnostic.message.contains("sing"));
}

#[tokio::test(start_paused = true)]
async fn unknown_condition_evaluates_false_with_a_diagnostic() {
    let (engine, bus, surface) = default_engine();
    let (_, mut diagnostics) = bus.subscribe();
    let mut world = empty_world();
    let program = vec![Block::conditional(
        Condition::Unknown("nearTreasure".to_string()),
        vec![Block::move_by(1)],
    )];

    engine.execute(&program, &mut world).await.unwrap();

    assert!(surface.poses().await.is_empty());
    let diagnostic = diagnostics.recv().await.unwrap();
    assert!(diagnostic.message.contains("nearTreasure"));
}

#[tokio::test(start_paused = true)]
async fn missing_surface_is_a_setup_error() {
    let bus = Arc::new(EventBus::new(16));
    let engine = ExecutionEngine::new(EngineConfig::default(), bus, None);
    let mut world = empty_world();

    let result = engine.execute(&[Block::move_by(1)], &mut world).await;
    assert!(matches!(result, Err(ExecutionError::SurfaceMissing)));
    // No partial execution happened.
    assert_eq!(engine.state().await, RunState::Idle);
    assert_eq!(world.pose(), Pose::default());
}

#[tokio::test(start_paused = true)]
async fn a_second_execute_is_rejected_while_running() {
    let (engine, _bus, _surface) = default_engine();
    let engine = Arc::new(engine);

    let background = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut world = empty_world();
            let program = vec![Block::move_by(1), Block::move_by(1)];
            engine.execute(&program, &mut world).await
        })
    };
    // Let the background pass reach its first suspension.
    tokio::task::yield_now().await;
    assert!(engine.is_busy());

    let mut world = empty_world();
    let result = engine.execute(&[Block::move_by(1)], &mut world).await;
    assert!(matches!(result, Err(ExecutionError::RunInProgress)));

    let outcome = background.await.unwrap();
    assert!(outcome.is_ok());
    assert!(!engine.is_busy());
}

#[tokio::test(start_paused = true)]
async fn cancel_aborts_at_the_next_block_boundary() {
    let (engine, _bus, surface) = default_engine();
    let engine = Arc::new(engine);

    let background = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut world = empty_world();
            let program = vec![
                Block::move_by(1),
                Block::move_by(1),
                Block::move_by(1),
                Block::move_by(1),
            ];
            let result = engine.execute(&program, &mut world).await;
            (result, world.pose())
        })
    };
    tokio::task::yield_now().await;
    engine.cancel();

    let (result, pose) = background.await.unwrap();
    assert!(matches!(result, Err(ExecutionError::Cancelled)));
    // The world sits at the last fully-applied step, not mid-block.
    let settled = surface.poses().await;
    assert_eq!(settled.last().copied(), Some(pose));
    assert_eq!(engine.state().await, RunState::Idle);
}

#[tokio::test(start_paused = true)]
async fn step_observers_fire_before_each_block() {
    let (engine, _bus, _surface) = default_engine();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        engine.register_step_observer(
            "highlight",
            Box::new(move |block| {
                let seen = seen.clone();
                let kind = block.kind().to_string();
                Box::pin(async move {
                    seen.lock().await.push(kind);
                })
            }),
        );
    }

    let mut world = empty_world();
    let program = vec![Block::move_by(1), Block::turn(TurnDirection::Left)];
    engine.execute(&program, &mut world).await.unwrap();

    assert_eq!(*seen.lock().await, vec!["move", "turn"]);
}

#[tokio::test(start_paused = true)]
async fn identical_runs_are_deterministic() {
    let program = vec![
        Block::repeat(3, vec![Block::move_by(1), Block::turn(TurnDirection::Right)]),
        Block::conditional(Condition::PathAhead, vec![Block::move_by(2)]),
    ];

    let mut trajectories = Vec::new();
    for _ in 0..2 {
        let (engine, _bus, surface) = default_engine();
        let mut world = empty_world();
        let outcome = engine.execute(&program, &mut world).await.unwrap();
        trajectories.push((surface.poses().await, world.pose(), outcome));
    }

    assert_eq!(trajectories[0], trajectories[1]);
}
