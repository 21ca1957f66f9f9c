//! Logical tile state as published by the match/physics simulation.
//!
//! The simulation owns [`Block`] and rewrites it once per tick before the
//! animation schedule runs. Nothing in this crate writes it.

use bevy_ecs::prelude::Component;
use glam::Vec3;
use serde::Serialize;

/// Logical state of a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum BlockState {
    #[default]
    Normal,
    /// Hovering in place before dropping.
    Floating,
    SwappingLeft,
    SwappingRight,
    Exploding,
    /// Part of a match that has not started clearing yet.
    Matched,
}

impl BlockState {
    pub fn swap_direction(self) -> Option<SwapDirection> {
        match self {
            BlockState::SwappingLeft => Some(SwapDirection::Left),
            BlockState::SwappingRight => Some(SwapDirection::Right),
            _ => None,
        }
    }
}

/// Horizontal swap direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum SwapDirection {
    Left,
    Right,
}

impl SwapDirection {
    /// -1 for left, +1 for right.
    pub fn sign(self) -> f32 {
        match self {
            SwapDirection::Left => -1.0,
            SwapDirection::Right => 1.0,
        }
    }
}

/// Explosion clock in simulation ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExplosionTimer {
    pub total: u32,
    pub elapsed: u32,
}

impl ExplosionTimer {
    pub fn new(total: u32) -> Self {
        Self { total, elapsed: 0 }
    }

    pub fn remaining(&self) -> u32 {
        self.total.saturating_sub(self.elapsed)
    }
}

/// A tile on the board.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Block {
    pub state: BlockState,
    pub row: i32,
    pub col: i32,
    pub explosion: ExplosionTimer,
    /// Where a swap must end when the simulation knows better than the
    /// handle's current position (e.g. the partner tile is mid-animation).
    pub swap_destination: Option<Vec3>,
}

impl Block {
    pub fn new(row: i32, col: i32) -> Self {
        Self {
            row,
            col,
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: BlockState) -> Self {
        self.state = state;
        self
    }

    pub fn with_explosion(mut self, total: u32) -> Self {
        self.explosion = ExplosionTimer::new(total);
        self
    }
}
