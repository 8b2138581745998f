//! Block-list state manager
//!
//! Holds the ordered block sequence of one open canvas. Every mutation keeps
//! the `order` fields equal to the sequence position (`0..N-1`) and reports
//! which blocks it touched so callers can persist exactly those.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::document::{Block, BlockId};
use crate::error::{Error, Result};
use crate::toc::{derive_toc, TocEntry};

/// Direction for [`BlockList::move_block`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards the start of the canvas
    Up,
    /// Towards the end of the canvas
    Down,
}

/// Blocks affected by one mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListChange {
    /// Blocks created by the operation, in sequence order
    pub inserted: Vec<BlockId>,
    /// Existing blocks whose content or order changed
    pub modified: Vec<BlockId>,
    /// Blocks removed from the sequence
    pub removed: Vec<BlockId>,
}

impl ListChange {
    /// True when the operation changed nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Ids of blocks that now need to be written (inserted or modified)
    pub fn touched(&self) -> impl Iterator<Item = &BlockId> {
        self.inserted.iter().chain(self.modified.iter())
    }
}

/// Ordered block sequence of one canvas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockList {
    blocks: Vec<Block>,
}

impl BlockList {
    /// Create an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored blocks.
    ///
    /// Blocks are sorted by their stored order (stable, so ties keep their
    /// input position) and renumbered densely. Stored data with gaps or
    /// duplicate orders is normalised here.
    #[must_use]
    pub fn from_blocks(mut blocks: Vec<Block>) -> Self {
        blocks.sort_by_key(|b| b.order);
        for (index, block) in blocks.iter_mut().enumerate() {
            block.order = index;
        }
        Self { blocks }
    }

    /// Blocks in sequence order
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Consume the list, returning the blocks
    #[must_use]
    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Number of blocks
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True if there are no blocks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Get a block by ID
    #[must_use]
    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    /// Sequence position of a block
    #[must_use]
    pub fn position(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| &b.id == id)
    }

    /// Table of contents for the current sequence
    #[must_use]
    pub fn toc(&self) -> Vec<TocEntry> {
        derive_toc(&self.blocks)
    }

    /// Swap a block with its neighbour.
    ///
    /// Moving the first block up or the last block down is a no-op and
    /// returns an empty change.
    pub fn move_block(&mut self, id: &BlockId, direction: Direction) -> Result<ListChange> {
        let index = self
            .position(id)
            .ok_or_else(|| Error::BlockNotFound(id.clone()))?;

        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.blocks.len() => index + 1,
            _ => return Ok(ListChange::default()),
        };

        self.blocks.swap(index, target);
        Ok(ListChange {
            modified: self.reindex(),
            ..ListChange::default()
        })
    }

    /// Insert a new block at `position` (end of sequence when `None`).
    ///
    /// Positions past the end are clamped to the end.
    pub fn insert(&mut self, position: Option<usize>, content: impl Into<String>) -> ListChange {
        self.insert_many(position, vec![content.into()])
    }

    /// Insert several new blocks as one contiguous run starting at `position`
    pub fn insert_many(&mut self, position: Option<usize>, contents: Vec<String>) -> ListChange {
        if contents.is_empty() {
            return ListChange::default();
        }

        let index = position
            .unwrap_or(self.blocks.len())
            .min(self.blocks.len());
        let new_blocks: Vec<Block> = contents.into_iter().map(Block::new).collect();
        let inserted: Vec<BlockId> = new_blocks.iter().map(|b| b.id.clone()).collect();

        self.blocks.splice(index..index, new_blocks);
        let modified = self
            .reindex()
            .into_iter()
            .filter(|id| !inserted.contains(id))
            .collect();

        ListChange {
            inserted,
            modified,
            removed: Vec::new(),
        }
    }

    /// Replace a block's content in place
    pub fn update(&mut self, id: &BlockId, content: impl Into<String>) -> Result<ListChange> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| &b.id == id)
            .ok_or_else(|| Error::BlockNotFound(id.clone()))?;

        block.content = content.into();
        block.updated_at = Utc::now();

        Ok(ListChange {
            modified: vec![id.clone()],
            ..ListChange::default()
        })
    }

    /// Remove a block and renumber the rest
    pub fn delete(&mut self, id: &BlockId) -> Result<ListChange> {
        let index = self
            .position(id)
            .ok_or_else(|| Error::BlockNotFound(id.clone()))?;

        let removed = self.blocks.remove(index);
        Ok(ListChange {
            modified: self.reindex(),
            removed: vec![removed.id],
            ..ListChange::default()
        })
    }

    /// Renumber orders to match positions, returning the ids that changed
    fn reindex(&mut self) -> Vec<BlockId> {
        let now = Utc::now();
        let mut changed = Vec::new();
        for (index, block) in self.blocks.iter_mut().enumerate() {
            if block.order != index {
                block.order = index;
                block.updated_at = now;
                changed.push(block.id.clone());
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[u64]) -> BlockList {
        BlockList::from_blocks(
            ids.iter()
                .enumerate()
                .map(|(i, id)| Block::with_id(*id, format!("block {id}")).at(i))
                .collect(),
        )
    }

    fn ids(list: &BlockList) -> Vec<String> {
        list.blocks().iter().map(|b| b.id.to_string()).collect()
    }

    fn assert_dense(list: &BlockList) {
        for (index, block) in list.blocks().iter().enumerate() {
            assert_eq!(block.order, index, "order mismatch at {index}");
        }
    }

    #[test]
    fn test_move_up_swaps_with_previous() {
        let mut list = list(&[1, 2, 3]);
        let change = list.move_block(&BlockId::from(2u64), Direction::Up).unwrap();

        assert_eq!(ids(&list), vec!["2", "1", "3"]);
        let orders: Vec<usize> = list.blocks().iter().map(|b| b.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(change.modified.len(), 2);
    }

    #[test]
    fn test_move_at_boundaries_is_noop() {
        let mut list = list(&[1, 2, 3]);
        let before = list.clone();

        let change = list.move_block(&BlockId::from(1u64), Direction::Up).unwrap();
        assert!(change.is_empty());
        let change = list.move_block(&BlockId::from(3u64), Direction::Down).unwrap();
        assert!(change.is_empty());

        assert_eq!(list, before);
    }

    #[test]
    fn test_move_down() {
        let mut list = list(&[1, 2, 3]);
        list.move_block(&BlockId::from(1u64), Direction::Down).unwrap();
        assert_eq!(ids(&list), vec!["2", "1", "3"]);
        assert_dense(&list);
    }

    #[test]
    fn test_move_unknown_block() {
        let mut list = list(&[1]);
        let err = list
            .move_block(&BlockId::from("missing"), Direction::Up)
            .unwrap_err();
        assert_eq!(err.code(), "block_not_found");
    }

    #[test]
    fn test_insert_into_empty() {
        let mut list = BlockList::new();
        let change = list.insert(Some(0), "hello");

        assert_eq!(list.len(), 1);
        let block = &list.blocks()[0];
        assert_eq!(block.order, 0);
        assert_eq!(block.content, "hello");
        assert_eq!(change.inserted, vec![block.id.clone()]);
        assert!(change.modified.is_empty());
    }

    #[test]
    fn test_insert_defaults_to_end_and_clamps() {
        let mut list = list(&[1, 2]);
        list.insert(None, "tail");
        list.insert(Some(99), "clamped");
        assert_eq!(list.blocks()[2].content, "tail");
        assert_eq!(list.blocks()[3].content, "clamped");
        assert_dense(&list);
    }

    #[test]
    fn test_insert_in_middle_shifts_followers() {
        let mut list = list(&[1, 2, 3]);
        let change = list.insert(Some(1), "middle");

        assert_eq!(list.blocks()[1].content, "middle");
        assert_dense(&list);
        let shifted: Vec<String> = change.modified.iter().map(ToString::to_string).collect();
        assert_eq!(shifted, vec!["2", "3"]);
    }

    #[test]
    fn test_insert_many_is_contiguous() {
        let mut list = list(&[1, 2]);
        let change = list.insert_many(Some(1), vec!["a".into(), "b".into(), "c".into()]);

        assert_eq!(change.inserted.len(), 3);
        let contents: Vec<&str> = list.blocks().iter().map(|b| b.content.as_str()).collect();
        assert_eq!(contents, vec!["block 1", "a", "b", "c", "block 2"]);
        assert_dense(&list);
    }

    #[test]
    fn test_update_keeps_order() {
        let mut list = list(&[1, 2]);
        let id = BlockId::from(2u64);
        list.update(&id, "edited").unwrap();
        assert_eq!(list.get(&id).unwrap().content, "edited");
        assert_eq!(list.position(&id), Some(1));
        assert!(list.update(&BlockId::from("nope"), "x").is_err());
    }

    #[test]
    fn test_delete_reindexes() {
        let mut list = list(&[1, 2, 3, 4]);
        let change = list.delete(&BlockId::from(2u64)).unwrap();

        assert_eq!(list.len(), 3);
        assert_eq!(ids(&list), vec!["1", "3", "4"]);
        assert_dense(&list);
        assert_eq!(change.removed, vec![BlockId::from(2u64)]);
        assert_eq!(change.modified.len(), 2);
    }

    #[test]
    fn test_from_blocks_normalises_orders() {
        let blocks = vec![
            Block::with_id("c", "c").at(7),
            Block::with_id("a", "a").at(2),
            Block::with_id("b", "b").at(2),
        ];
        let list = BlockList::from_blocks(blocks);
        assert_eq!(ids(&list), vec!["a", "b", "c"]);
        assert_dense(&list);
    }

    #[test]
    fn test_mixed_operations_stay_dense() {
        let mut list = BlockList::new();
        for i in 0..6 {
            list.insert(Some(i % 3), format!("n{i}"));
        }
        let first = list.blocks()[0].id.clone();
        let last = list.blocks()[5].id.clone();
        list.move_block(&first, Direction::Down).unwrap();
        list.delete(&last).unwrap();
        list.insert(Some(2), "late");
        let third = list.blocks()[3].id.clone();
        list.move_block(&third, Direction::Up).unwrap();
        list.delete(&first).unwrap();

        assert_eq!(list.len(), 5);
        assert_dense(&list);
        let mut seen: Vec<usize> = list.blocks().iter().map(|b| b.order).collect();
        seen.dedup();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_toc_follows_sequence() {
        let mut list = BlockList::new();
        list.insert(None, "## Second");
        list.insert(Some(0), "# First");
        let toc = list.toc();
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].text, "First");
        assert_eq!(toc[1].level, 2);
    }
}
