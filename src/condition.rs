//! The fixed condition vocabulary consumed by conditional blocks.
//!
//! Evaluation is a pure function of the world: it never mutates the
//! pose or geometry. Unknown condition names evaluate to false and are
//! reported as diagnostics, not errors.

use strum_macros::{Display, EnumString};
use tracing::warn;

use crate::world::WorldState;

/// Named boolean predicate over the world.
///
/// The string forms (`pathAhead`, `atGoal`, …) are the persisted and
/// displayed names; anything else parses into `Unknown` and keeps the
/// original spelling for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
pub enum Condition {
    #[strum(serialize = "pathAhead")]
    PathAhead,
    #[strum(serialize = "atGoal")]
    AtGoal,
    #[strum(serialize = "canTurnLeft")]
    CanTurnLeft,
    #[strum(serialize = "canTurnRight")]
    CanTurnRight,
    #[strum(default)]
    Unknown(String),
}

/// Evaluates `condition` against the current world. `step` is the
/// distance of one Move unit in world units.
pub fn evaluate(condition: &Condition, world: &WorldState, step: f64) -> bool {
    match condition {
        Condition::PathAhead => !world.obstacle_at(world.point_ahead(step)),
        Condition::AtGoal => world.at_any_goal(),
        // Turning is never blocked in the current exercise set; kept as
        // an extension point for real collision checks.
        Condition::CanTurnLeft | Condition::CanTurnRight => true,
        Condition::Unknown(name) => {
            warn!(condition = %name, "unknown condition evaluates to false");
            false
        }
    }
}
