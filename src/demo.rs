//! Scripted stand-in for the match simulation.
//!
//! [`DemoBoard`] plays the part of the simulation and of the renderer's
//! handle pool so the animation layer can be run headless: it swaps tiles
//! under the cursor, clears random horizontal triples, drops the tiles above a
//! cleared cell, drops fresh tiles in from above and periodically raises the
//! stack. Handles taken from cleared tiles are reset and handed to the next
//! fresh tile. Random choices come from a seeded [`fastrand::Rng`], so a given
//! seed always replays the same session.

use bevy_ecs::prelude::*;
use log::{debug, info};
use serde::Serialize;

use crate::animworld::AnimationWorld;
use crate::components::block::{Block, BlockState, ExplosionTimer};
use crate::components::cursor::Cursor;
use crate::components::visual::{Position, VisualHandle};
use crate::resources::animconfig::AnimationConfig;
use crate::resources::boardlayout::BoardLayout;

const EXPLOSION_TICKS: u32 = 45;
const HANG_TICKS: u64 = 12;
const RISE_EVERY: u64 = 240;
const FILLED_ROWS_SHARE: f32 = 0.8;
const PANIC_SHARE: f32 = 0.75;
const REFILL_CHANCE: f32 = 0.03;

/// Running totals of what the demo did.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DemoStats {
    pub ticks: u64,
    pub cursor_moves: u32,
    pub swaps: u32,
    pub matches: u32,
    pub cleared: u32,
    pub falls: u32,
    pub rises: u32,
    pub spawned: u32,
    pub reused_handles: u32,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    /// Swap finished: the two tiles trade cells.
    FinishSwap { left: Entity, right: Entity },
    /// Hang time over: drop the tile to its new row.
    Land { block: Entity, to_row: i32 },
}

pub struct DemoBoard {
    rng: fastrand::Rng,
    cols: i32,
    rows: i32,
    grid: Vec<Option<Entity>>,
    pool: Vec<VisualHandle>,
    cursor: Entity,
    layout: BoardLayout,
    swap_ticks: u64,
    actions: Vec<(u64, Action)>,
    stats: DemoStats,
}

impl DemoBoard {
    /// Fill the lower part of a `cols` x `rows` board and bind a handle to
    /// every tile and to the cursor.
    pub fn new(world: &mut World, cols: i32, rows: i32, seed: u64) -> Self {
        let cols = cols.max(3);
        let rows = rows.max(2);
        let (layout, swap_ticks) = world
            .get_resource::<AnimationConfig>()
            .map_or((BoardLayout::default(), 3), |c| (c.layout, c.block.swap_ticks));

        let cursor = world.spawn(Cursor::new(0, 0)).id();
        let cursor_handle = VisualHandle::spawn(world, layout.cell_to_world(0, 0));
        world.register_cursor_handle(cursor_handle);

        let mut board = Self {
            rng: fastrand::Rng::with_seed(seed),
            cols,
            rows,
            grid: vec![None; (cols * rows) as usize],
            pool: Vec::new(),
            cursor,
            layout,
            swap_ticks,
            actions: Vec::new(),
            stats: DemoStats::default(),
        };
        let filled = ((rows as f32 * FILLED_ROWS_SHARE).ceil() as i32).max(1);
        for row in 0..filled {
            for col in 0..cols {
                board.spawn_block(world, row, col);
            }
        }
        info!("demo board {}x{} with {} tiles, seed {}", cols, rows, filled * cols, seed);
        board
    }

    pub fn stats(&self) -> DemoStats {
        self.stats
    }

    /// Handles taken back from cleared tiles and not yet handed out again.
    pub fn released_handles(&self) -> usize {
        self.pool.len()
    }

    pub fn tile_count(&self) -> usize {
        self.grid.iter().flatten().count()
    }

    fn index(&self, row: i32, col: i32) -> Option<usize> {
        (row >= 0 && row < self.rows && col >= 0 && col < self.cols)
            .then(|| (row * self.cols + col) as usize)
    }

    fn at(&self, row: i32, col: i32) -> Option<Entity> {
        self.index(row, col).and_then(|i| self.grid[i])
    }

    fn put(&mut self, row: i32, col: i32, block: Option<Entity>) {
        if let Some(i) = self.index(row, col) {
            self.grid[i] = block;
        }
    }

    /// Put a new tile at (`row`, `col`), drawn with a pooled handle if one is free.
    fn spawn_block(&mut self, world: &mut World, row: i32, col: i32) -> Entity {
        let position = self.layout.cell_to_world(row, col);
        let handle = match self.pool.pop() {
            Some(handle) => {
                if let Some(mut p) = world.get_mut::<Position>(handle.node) {
                    p.0 = position;
                }
                self.stats.reused_handles += 1;
                handle
            }
            None => VisualHandle::spawn(world, position),
        };
        let block = world.spawn(Block::new(row, col)).id();
        world.register_handle(block, handle);
        self.put(row, col, Some(block));
        block
    }

    fn is_normal(world: &World, block: Option<Entity>) -> bool {
        block
            .and_then(|b| world.get::<Block>(b))
            .is_some_and(|b| b.state == BlockState::Normal)
    }

    /// Advance the stand-in simulation by one tick. Call before
    /// [`AnimationWorld::tick_animations`].
    pub fn step(&mut self, world: &mut World) {
        self.stats.ticks += 1;
        let now = self.stats.ticks;

        self.run_due_actions(world, now);
        self.advance_explosions(world, now);

        if self.rng.f32() < 0.2 {
            self.move_cursor(world);
        }
        if self.rng.f32() < 0.1 {
            self.swap_at_cursor(world, now);
        }
        if self.rng.f32() < 0.04 {
            self.match_random_triple(world);
        }
        if self.rng.f32() < REFILL_CHANCE {
            self.drop_in_tile(world);
        }
        if now % RISE_EVERY == 0 && world.start_stack_rise(None) {
            self.stats.rises += 1;
        }

        let fill = self.tile_count() as f32 / self.grid.len() as f32;
        world.set_panic_mode(fill >= PANIC_SHARE);
    }

    fn run_due_actions(&mut self, world: &mut World, now: u64) {
        let (due, pending): (Vec<_>, Vec<_>) =
            self.actions.drain(..).partition(|(at, _)| *at <= now);
        self.actions = pending;
        for (_, action) in due {
            match action {
                Action::FinishSwap { left, right } => self.finish_swap(world, left, right),
                Action::Land { block, to_row } => self.land(world, block, to_row),
            }
        }
    }

    fn move_cursor(&mut self, world: &mut World) {
        if let Some(mut cursor) = world.get_mut::<Cursor>(self.cursor) {
            let row = (cursor.row + self.rng.i32(-1..=1)).clamp(0, self.rows - 1);
            let col = (cursor.col + self.rng.i32(-1..=1)).clamp(0, self.cols - 2);
            if (row, col) != cursor.cell() {
                cursor.row = row;
                cursor.col = col;
                self.stats.cursor_moves += 1;
            }
        }
    }

    fn swap_at_cursor(&mut self, world: &mut World, now: u64) {
        let Some((row, col)) = world.get::<Cursor>(self.cursor).map(Cursor::cell) else {
            return;
        };
        let (left, right) = (self.at(row, col), self.at(row, col + 1));
        if !(Self::is_normal(world, left) && Self::is_normal(world, right)) {
            return;
        }
        let (Some(left), Some(right)) = (left, right) else {
            return;
        };
        let left_cell = self.layout.cell_to_world(row, col);
        let right_cell = self.layout.cell_to_world(row, col + 1);
        if let Some(mut block) = world.get_mut::<Block>(left) {
            block.state = BlockState::SwappingRight;
            block.swap_destination = Some(right_cell);
        }
        if let Some(mut block) = world.get_mut::<Block>(right) {
            block.state = BlockState::SwappingLeft;
            block.swap_destination = Some(left_cell);
        }
        world.trigger_swap_feedback();
        self.actions
            .push((now + self.swap_ticks + 1, Action::FinishSwap { left, right }));
        self.stats.swaps += 1;
    }

    fn finish_swap(&mut self, world: &mut World, left: Entity, right: Entity) {
        let cells = [left, right].map(|b| world.get::<Block>(b).map(|b| (b.row, b.col)));
        let [Some((row, col)), Some((_, right_col))] = cells else {
            return;
        };
        for (block, new_col) in [(left, right_col), (right, col)] {
            if let Some(mut b) = world.get_mut::<Block>(block) {
                b.col = new_col;
                b.state = BlockState::Normal;
                b.swap_destination = None;
            }
            self.put(row, new_col, Some(block));
        }
    }

    fn match_random_triple(&mut self, world: &mut World) {
        let row = self.rng.i32(0..self.rows);
        let col = self.rng.i32(0..=self.cols - 3);
        let triple = [self.at(row, col), self.at(row, col + 1), self.at(row, col + 2)];
        if !triple.iter().all(|b| Self::is_normal(world, *b)) {
            return;
        }
        for block in triple.into_iter().flatten() {
            if let Some(mut b) = world.get_mut::<Block>(block) {
                b.state = BlockState::Exploding;
                b.explosion = ExplosionTimer::new(EXPLOSION_TICKS);
            }
        }
        self.stats.matches += 1;
        debug!("match at row {} cols {}..{}", row, col, col + 2);
    }

    fn advance_explosions(&mut self, world: &mut World, now: u64) {
        let mut finished = Vec::new();
        let mut query = world.query::<(Entity, &mut Block)>();
        for (entity, mut block) in query.iter_mut(world) {
            if block.state != BlockState::Exploding {
                continue;
            }
            block.explosion.elapsed += 1;
            if block.explosion.remaining() == 0 {
                finished.push((entity, block.row, block.col));
            }
        }
        finished.sort();
        for (entity, row, col) in finished {
            self.clear_cell(world, entity, row, col, now);
        }
    }

    fn clear_cell(&mut self, world: &mut World, block: Entity, row: i32, col: i32, now: u64) {
        if let Some(handle) = world.unregister_handle(block) {
            world.reset_handle(handle);
            self.pool.push(handle);
        }
        world.despawn(block);
        self.put(row, col, None);
        self.stats.cleared += 1;

        // everything resting above the hole hangs, then drops one row
        let mut above = row + 1;
        while let Some(upper) = self.at(above, col) {
            if !Self::is_normal(world, Some(upper)) {
                break;
            }
            if let Some(mut b) = world.get_mut::<Block>(upper) {
                b.state = BlockState::Floating;
            }
            self.put(above, col, None);
            self.put(above - 1, col, Some(upper));
            self.actions.push((
                now + HANG_TICKS,
                Action::Land {
                    block: upper,
                    to_row: above - 1,
                },
            ));
            above += 1;
        }
    }

    /// Drop a fresh tile from above the board onto a random column.
    fn drop_in_tile(&mut self, world: &mut World) {
        let col = self.rng.i32(0..self.cols);
        if self.at(self.rows - 1, col).is_some() {
            return;
        }
        let mut row = self.rows - 1;
        while row > 0 && self.at(row - 1, col).is_none() {
            row -= 1;
        }
        if row > 0 && !Self::is_normal(world, self.at(row - 1, col)) {
            return;
        }
        let block = self.spawn_block(world, row, col);
        if world.trigger_fall(block, self.rows, row, None) {
            self.stats.falls += 1;
        }
        self.stats.spawned += 1;
        debug!("tile dropped into column {} row {}", col, row);
    }

    fn land(&mut self, world: &mut World, block: Entity, to_row: i32) {
        let Some(from_row) = world.get::<Block>(block).map(|b| b.row) else {
            return;
        };
        if let Some(mut b) = world.get_mut::<Block>(block) {
            b.row = to_row;
            b.state = BlockState::Normal;
        }
        if world.trigger_fall(block, from_row, to_row, None) {
            self.stats.falls += 1;
        }
    }
}
