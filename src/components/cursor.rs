//! Logical swap cursor, as positioned by input handling.

use bevy_ecs::prelude::Component;

/// Logical swap cursor, written by input handling.
///
/// The cursor covers the cell at (`row`, `col`) and its right neighbour.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub row: i32,
    pub col: i32,
}

impl Cursor {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn cell(&self) -> (i32, i32) {
        (self.row, self.col)
    }
}
