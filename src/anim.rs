//! Compaction animation: blocks sliding from their old row to their new one.

use crate::board::{BlockColor, BlockFall};
use std::collections::BTreeSet;

/// Progress added per frame (20 frames per slide).
pub const PROGRESS_PER_FRAME: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallAnimation {
    pub column: usize,
    pub from_row: i32,
    pub to_row: usize,
    pub color: BlockColor,
    /// 0.0 ..= 1.0
    pub progress: f32,
}

impl FallAnimation {
    /// Current (fractional) row for drawing.
    pub fn row_position(&self) -> f32 {
        let from = self.from_row as f32;
        from + (self.to_row as f32 - from) * self.progress
    }

    pub fn is_done(&self) -> bool {
        self.progress >= 1.0
    }
}

impl From<BlockFall> for FallAnimation {
    fn from(fall: BlockFall) -> Self {
        Self {
            column: fall.column,
            from_row: fall.from_row,
            to_row: fall.to_row,
            color: fall.color,
            progress: 0.0,
        }
    }
}

/// All slides in flight. Purely visual; the board already holds the final layout.
#[derive(Debug, Clone, Default)]
pub struct Animations {
    active: Vec<FallAnimation>,
}

impl Animations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, falls: impl IntoIterator<Item = BlockFall>) {
        for fall in falls {
            // A block re-moved by a cascade before its previous slide ended.
            self.active
                .retain(|a| !(a.column == fall.column && a.to_row as i32 == fall.from_row));
            self.active.push(fall.into());
        }
    }

    /// Drop slides heading for cells that were just emptied.
    pub fn cancel(&mut self, cells: &BTreeSet<(usize, usize)>) {
        self.active.retain(|a| !cells.contains(&(a.column, a.to_row)));
    }

    /// Advance every slide by `step`; finished ones are clamped and dropped.
    /// Returns how many finished.
    pub fn tick(&mut self, step: f32) -> usize {
        let before = self.active.len();
        self.active.retain_mut(|a| {
            a.progress = (a.progress + step).min(1.0);
            !a.is_done()
        });
        before - self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FallAnimation> {
        self.active.iter()
    }

    /// True if a slide is still heading for (column, row); the board cell is hidden meanwhile.
    pub fn targets(&self, column: usize, row: usize) -> bool {
        self.active
            .iter()
            .any(|a| a.column == column && a.to_row == row)
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}
