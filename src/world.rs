//! World state for one exercise: the character's pose plus the static
//! obstacle and goal geometry it is judged against.
//!
//! The coordinate system matches the rendering surface: `y` grows
//! downward, heading 0 points "up" and increases clockwise. Regions are
//! matched with a bounding-circle overlap approximation rather than
//! exact containment.

use serde::{Deserialize, Serialize};

use crate::block::TurnDirection;

/// 2D coordinate in world units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

/// Character pose: position plus heading in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub heading: f64,
}

impl Pose {
    pub fn new(position: Point, heading: f64) -> Self {
        Self { position, heading }
    }

    /// Heading folded into `[0, 360)`. Storage keeps the raw
    /// accumulated angle; comparisons use this form.
    pub fn heading_normalized(&self) -> f64 {
        self.heading.rem_euclid(360.0)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Point::default(),
            heading: 0.0,
        }
    }
}

/// Fixed-position region, approximated by its center and width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: Point,
    pub width: f64,
}

impl Region {
    pub fn new(center: Point, width: f64) -> Self {
        Self { center, width }
    }
}

/// The executable character's situation: pose, start pose, and the
/// static geometry of the exercise.
///
/// Obstacles and goals are read-only for the duration of a run. The
/// pose is mutated only through the crate-internal movement operations
/// driven by the execution engine; condition evaluation and completion
/// checking are pure queries.
#[derive(Debug, Clone)]
pub struct WorldState {
    pose: Pose,
    start: Pose,
    character_width: f64,
    obstacles: Vec<Region>,
    goals: Vec<Region>,
}

impl WorldState {
    pub fn new(
        start: Pose,
        character_width: f64,
        obstacles: Vec<Region>,
        goals: Vec<Region>,
    ) -> Self {
        Self {
            pose: start,
            start,
            character_width,
            obstacles,
            goals,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn position(&self) -> Point {
        self.pose.position
    }

    pub fn heading(&self) -> f64 {
        self.pose.heading
    }

    pub fn character_width(&self) -> f64 {
        self.character_width
    }

    pub fn obstacles(&self) -> &[Region] {
        &self.obstacles
    }

    pub fn goals(&self) -> &[Region] {
        &self.goals
    }

    /// Displaces the character along its current heading by
    /// `displacement` world units.
    pub(crate) fn advance(&mut self, displacement: f64) {
        let radians = self.pose.heading.to_radians();
        self.pose.position.x += radians.sin() * displacement;
        self.pose.position.y -= radians.cos() * displacement;
    }

    /// Quarter-turn: left is counter-clockwise (−90°), right clockwise
    /// (+90°).
    pub(crate) fn turn(&mut self, direction: TurnDirection) {
        self.pose.heading += match direction {
            TurnDirection::Left => -90.0,
            TurnDirection::Right => 90.0,
        };
    }

    /// Restores the initial pose. Geometry is untouched.
    pub(crate) fn reset(&mut self) {
        self.pose = self.start;
    }

    /// The point one `step` world units ahead along the current
    /// heading.
    pub fn point_ahead(&self, step: f64) -> Point {
        let radians = self.pose.heading.to_radians();
        Point::new(
            self.pose.position.x + radians.sin() * step,
            self.pose.position.y - radians.cos() * step,
        )
    }

    /// Whether any obstacle overlaps `point`, using the half-sum of the
    /// character and obstacle widths as the overlap threshold.
    pub fn obstacle_at(&self, point: Point) -> bool {
        self.obstacles
            .iter()
            .any(|obstacle| point.distance_to(obstacle.center) < (self.character_width + obstacle.width) / 2.0)
    }

    /// Whether the character currently overlaps any goal region.
    pub fn at_any_goal(&self) -> bool {
        self.goals
            .iter()
            .any(|goal| self.pose.position.distance_to(goal.center) < (self.character_width + goal.width) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn empty_world() -> WorldState {
        WorldState::new(Pose::default(), 40.0, vec![], vec![])
    }

    #[test]
    fn advance_moves_up_at_heading_zero() {
        let mut world = empty_world();
        world.advance(50.0);
        assert!(world.position().x.abs() < 1e-9);
        assert_eq!(world.position().y, -50.0);
    }

    #[test]
    fn advance_moves_right_at_heading_ninety() {
        let mut world = empty_world();
        world.turn(TurnDirection::Right);
        world.advance(50.0);
        assert!((world.position().x - 50.0).abs() < 1e-9);
        assert!(world.position().y.abs() < 1e-9);
    }

    #[test]
    fn heading_normalizes_for_comparison_only() {
        let mut world = empty_world();
        world.turn(TurnDirection::Left);
        assert_eq!(world.heading(), -90.0);
        assert_eq!(world.pose().heading_normalized(), 270.0);
    }

    #[test]
    fn overlap_threshold_is_strict() {
        let goal = Region::new(Point::new(40.0, 0.0), 40.0);
        let mut world = WorldState::new(Pose::default(), 40.0, vec![], vec![goal]);
        // Exactly on the threshold (distance 40 = (40 + 40) / 2): no overlap.
        assert!(!world.at_any_goal());
        world.turn(TurnDirection::Right);
        world.advance(1.0);
        assert!(world.at_any_goal());
    }

    #[test]
    fn reset_restores_the_start_pose() {
        let mut world = empty_world();
        world.turn(TurnDirection::Right);
        world.advance(50.0);
        world.reset();
        assert_eq!(world.pose(), Pose::default());
    }

    #[test]
    fn obstacle_lookup_ahead() {
        let obstacle = Region::new(Point::new(0.0, -50.0), 40.0);
        let world = WorldState::new(Pose::default(), 40.0, vec![obstacle], vec![]);
        assert!(world.obstacle_at(world.point_ahead(50.0)));
        assert!(!world.obstacle_at(world.point_ahead(150.0)));
    }
}
