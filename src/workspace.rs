//! Program composition: the palette of template blocks an exercise
//! offers and the ordered workspace program the learner assembles from
//! them.
//!
//! Placing a template instantiates a deep copy with fresh ids; palette
//! originals are never consumed. Removing a workspace block deletes it
//! (returning a block to the palette is a delete, not a move). Restore
//! rebuilds a saved program by template lookup plus id reassignment.

use thiserror::Error;
use tracing::warn;

use crate::block::{Block, BlockId};
use crate::store::BlockRecord;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("block not found: {id}")]
    BlockNotFound { id: BlockId },

    #[error("block {id} cannot hold children")]
    NotAContainer { id: BlockId },
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// The permanently-available template blocks for one exercise.
pub struct Palette {
    templates: Vec<Block>,
}

impl Palette {
    pub fn new(templates: Vec<Block>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &[Block] {
        &self.templates
    }

    /// Template lookup by the persisted (kind, parameter) projection.
    pub fn find(&self, kind: &str, parameter: &str) -> Option<&Block> {
        self.templates
            .iter()
            .find(|template| template.kind() == kind && template.parameter() == parameter)
    }
}

/// The ordered program the learner has composed.
#[derive(Default)]
pub struct Workspace {
    blocks: Vec<Block>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn program(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Instantiates `template` and appends it to the program. Returns
    /// the id of the new block.
    pub fn place(&mut self, template: &Block) -> BlockId {
        let instance = template.instantiate();
        let id = instance.id().clone();
        self.blocks.push(instance);
        id
    }

    /// Instantiates `template` inside the child sequence of an existing
    /// repeat or conditional block.
    pub fn place_into(&mut self, parent: &BlockId, template: &Block) -> WorkspaceResult<BlockId> {
        let parent_block =
            find_block_mut(&mut self.blocks, parent).ok_or_else(|| WorkspaceError::BlockNotFound {
                id: parent.clone(),
            })?;
        let children = parent_block
            .children_vec_mut()
            .ok_or_else(|| WorkspaceError::NotAContainer { id: parent.clone() })?;
        let instance = template.instantiate();
        let id = instance.id().clone();
        children.push(instance);
        Ok(id)
    }

    /// Reorders a top-level block to `index` (clamped to the end).
    pub fn move_block(&mut self, id: &BlockId, index: usize) -> WorkspaceResult<()> {
        let position = self
            .blocks
            .iter()
            .position(|block| block.id() == id)
            .ok_or_else(|| WorkspaceError::BlockNotFound { id: id.clone() })?;
        let block = self.blocks.remove(position);
        let index = index.min(self.blocks.len());
        self.blocks.insert(index, block);
        Ok(())
    }

    /// Removes a block (top-level or nested) and returns it.
    pub fn remove(&mut self, id: &BlockId) -> WorkspaceResult<Block> {
        remove_block(&mut self.blocks, id)
            .ok_or_else(|| WorkspaceError::BlockNotFound { id: id.clone() })
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Rebuilds the program from persisted records: each record's
    /// template is instantiated and the saved id reassigned to the new
    /// root. Records without a matching template are skipped with a
    /// diagnostic. Returns the number of blocks restored.
    pub fn restore(&mut self, records: &[BlockRecord], palette: &Palette) -> usize {
        self.blocks.clear();
        for record in records {
            match palette.find(&record.kind, &record.parameter) {
                Some(template) => {
                    let mut instance = template.instantiate();
                    instance.set_id(record.id.clone());
                    self.blocks.push(instance);
                }
                None => {
                    warn!(
                        kind = %record.kind,
                        parameter = %record.parameter,
                        "no palette template for saved block, skipping"
                    );
                }
            }
        }
        self.blocks.len()
    }
}

fn find_block_mut<'a>(blocks: &'a mut [Block], id: &BlockId) -> Option<&'a mut Block> {
    for block in blocks {
        if block.id() == id {
            return Some(block);
        }
        if let Some(children) = block.children_vec_mut() {
            if let Some(found) = find_block_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn remove_block(blocks: &mut Vec<Block>, id: &BlockId) -> Option<Block> {
    if let Some(position) = blocks.iter().position(|block| block.id() == id) {
        return Some(blocks.remove(position));
    }
    for block in blocks {
        if let Some(children) = block.children_vec_mut() {
            if let Some(removed) = remove_block(children, id) {
                return Some(removed);
            }
        }
    }
    None
}
