//! # BLOCKRUN: Block-Program Execution Engine
//!
//! BLOCKRUN executes visually-composed block programs, the kind a
//! learner assembles by dragging instruction blocks into a workspace,
//! as sequential, animated programs against a 2D character and world.
//!
//! ## Architecture
//!
//! The crate is organized around one data flow:
//!
//! ```text
//! Palette → Workspace (Program) → Execution Engine → Outcome
//!                                      │
//!                     Condition Evaluator · World State
//! ```
//!
//! ### 1. Program Composition
//! Instruction blocks ([`block`]) form a tree: movement and turn
//! leaves, repeat and conditional containers. The [`workspace`] module
//! holds the palette of templates and the ordered program assembled
//! from them; [`formatter`] renders the learner-facing preview.
//!
//! ### 2. Execution
//! The [`engine`] walks the program depth-first, suspending on the
//! Tokio timer for each step's animation delay, consulting the
//! [`condition`] evaluator against the [`world`] state, and finishing
//! with a single completion check against the exercise's goals. One
//! pass may be active at a time; cancellation is honored at block
//! boundaries.
//!
//! ### 3. Event-Based Outbound Interface
//! The UI layer follows a run through the [`event_bus`]: a broadcast
//! channel of step, pose, and outcome events plus a separate
//! diagnostics channel for non-fatal reports. The character itself is
//! driven through the engine's `CharacterSurface` trait.
//!
//! ### 4. Persistence & Progress
//! The [`store`] module persists program snapshots in a string-keyed
//! JSON store (in-memory or file-backed); [`progress`] keeps per-path
//! completion, points, levels, and badges. Corrupted documents are
//! discarded or defaulted, never fatal.
//!
//! ### 5. Session
//! An exercise attempt is owned by a [`session::ExerciseSession`],
//! which wires every component together behind the interface the UI
//! drives: load/save/reset program, run, reset, hints.

pub mod block;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod formatter;
pub mod progress;
pub mod session;
pub mod store;
pub mod workspace;
pub mod world;

// Re-exports
pub use block::*;
pub use condition::Condition;
pub use engine::*;
pub use error::*;
pub use event_bus::*;
pub use session::ExerciseSession;
pub use world::*;
