use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{criterion_group, criterion_main, Criterion};

use blockrun::block::{Block, TurnDirection};
use blockrun::condition::Condition;
use blockrun::config::EngineConfig;
use blockrun::engine::{CharacterSurface, ExecutionEngine};
use blockrun::event_bus::EventBus;
use blockrun::world::{Pose, WorldState};

struct NullSurface;

#[async_trait]
impl CharacterSurface for NullSurface {
    async fn set_pose(&self, _pose: Pose) {}
}

fn flat_program(steps: usize) -> Vec<Block> {
    (0..steps)
        .map(|i| {
            if i % 4 == 3 {
                Block::turn(TurnDirection::Right)
            } else {
                Block::move_by(1)
            }
        })
        .collect()
}

fn nested_program() -> Vec<Block> {
    vec![
        Block::repeat(
            8,
            vec![
                Block::move_by(1),
                Block::repeat(4, vec![Block::turn(TurnDirection::Left)]),
            ],
        ),
        Block::conditional(Condition::PathAhead, vec![Block::move_by(2)]),
    ]
}

fn bench_execute(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let config = EngineConfig {
        step_duration: Duration::ZERO,
        step_scale: 50.0,
    };

    let flat = flat_program(64);
    c.bench_function("execute_flat_64", |b| {
        b.iter(|| {
            rt.block_on(async {
                let bus = Arc::new(EventBus::new(256));
                let engine = ExecutionEngine::new(config.clone(), bus, Some(Arc::new(NullSurface)));
                let mut world = WorldState::new(Pose::default(), 40.0, vec![], vec![]);
                engine.execute(&flat, &mut world).await.expect("run")
            })
        })
    });

    let nested = nested_program();
    c.bench_function("execute_nested_repeat", |b| {
        b.iter(|| {
            rt.block_on(async {
                let bus = Arc::new(EventBus::new(256));
                let engine = ExecutionEngine::new(config.clone(), bus, Some(Arc::new(NullSurface)));
                let mut world = WorldState::new(Pose::default(), 40.0, vec![], vec![]);
                engine.execute(&nested, &mut world).await.expect("run")
            })
        })
    });
}

criterion_group!(benches, bench_execute);
criterion_main!(benches);
