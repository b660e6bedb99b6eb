use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::Condition;

/// Stable identity of a placed block.
///
/// Identity survives moves within the workspace and persistence
/// round-trips. Two blocks with identical kind and parameter are still
/// distinct entities when their ids differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Mints a new unique id for a freshly instantiated block.
    pub fn fresh() -> Self {
        Self(format!("block-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quarter-turn direction. A turn block always rotates by exactly 90
/// degrees; arbitrary angles are not part of the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, Serialize, Deserialize)]
pub enum TurnDirection {
    Left,
    Right,
}

/// Kind-specific payload of one instruction block.
///
/// `Repeat` and `Conditional` own an ordered child sequence; the model
/// is a tree and children may nest to any depth. `Unknown` only appears
/// when foreign or hand-built data is restored; executing it is a
/// tolerated no-op rather than an error.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockBody {
    Move { distance: i32 },
    Turn { direction: TurnDirection },
    Repeat { count: u32, children: Vec<Block> },
    Conditional { condition: Condition, children: Vec<Block> },
    Unknown { kind: String },
}

/// One instruction node in a composed program.
///
/// Blocks are immutable during an execution pass; the engine only ever
/// reads them. Mutation (placing children, reordering) happens in the
/// workspace between runs.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    body: BlockBody,
}

impl Block {
    pub fn new(body: BlockBody) -> Self {
        Self {
            id: BlockId::fresh(),
            body,
        }
    }

    pub fn with_id(id: BlockId, body: BlockBody) -> Self {
        Self { id, body }
    }

    pub fn move_by(distance: i32) -> Self {
        Self::new(BlockBody::Move { distance })
    }

    pub fn turn(direction: TurnDirection) -> Self {
        Self::new(BlockBody::Turn { direction })
    }

    pub fn repeat(count: u32, children: Vec<Block>) -> Self {
        Self::new(BlockBody::Repeat { count, children })
    }

    pub fn conditional(condition: Condition, children: Vec<Block>) -> Self {
        Self::new(BlockBody::Conditional {
            condition,
            children,
        })
    }

    pub fn id(&self) -> &BlockId {
        &self.id
    }

    pub fn body(&self) -> &BlockBody {
        &self.body
    }

    /// Kind tag as persisted and displayed: `move`, `turn`, `repeat`,
    /// `if`, or the stored tag of an unknown block.
    pub fn kind(&self) -> &str {
        match &self.body {
            BlockBody::Move { .. } => "move",
            BlockBody::Turn { .. } => "turn",
            BlockBody::Repeat { .. } => "repeat",
            BlockBody::Conditional { .. } => "if",
            BlockBody::Unknown { kind } => kind,
        }
    }

    /// Kind-dependent parameter rendered as a string. Together with
    /// [`Self::kind`] this forms the persisted projection and the
    /// palette template lookup key.
    pub fn parameter(&self) -> String {
        match &self.body {
            BlockBody::Move { distance } => distance.to_string(),
            BlockBody::Turn { direction } => direction.to_string(),
            BlockBody::Repeat { count, .. } => count.to_string(),
            BlockBody::Conditional { condition, .. } => condition.to_string(),
            BlockBody::Unknown { .. } => String::new(),
        }
    }

    /// Child sequence for container kinds; empty for leaf kinds.
    pub fn children(&self) -> &[Block] {
        match &self.body {
            BlockBody::Repeat { children, .. } | BlockBody::Conditional { children, .. } => {
                children
            }
            _ => &[],
        }
    }

    /// Deep duplication: the copy and every descendant receive fresh
    /// ids. Used when a palette template is placed into a program.
    pub fn instantiate(&self) -> Block {
        let body = match &self.body {
            BlockBody::Repeat { count, children } => BlockBody::Repeat {
                count: *count,
                children: children.iter().map(Block::instantiate).collect(),
            },
            BlockBody::Conditional {
                condition,
                children,
            } => BlockBody::Conditional {
                condition: condition.clone(),
                children: children.iter().map(Block::instantiate).collect(),
            },
            other => other.clone(),
        };
        Block::new(body)
    }

    pub(crate) fn set_id(&mut self, id: BlockId) {
        self.id = id;
    }

    pub(crate) fn children_vec_mut(&mut self) -> Option<&mut Vec<Block>> {
        match &mut self.body {
            BlockBody::Repeat { children, .. } | BlockBody::Conditional { children, .. } => {
                Some(children)
            }
            _ => None,
        }
    }
}

impl PartialEq for Block {
    /// Identity is by id, not structural content.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Block {}
