//! Per-tile animation controller.
//!
//! [`BlockAnimator`] keeps one [`BlockAnimState`] per logical tile and turns
//! domain events into tweens on the tile's [`VisualHandle`]:
//!
//! - [`start_fall`](BlockAnimator::start_fall) – ease-in drop between two rows
//! - [`start_swap`](BlockAnimator::start_swap) /
//!   [`start_swap_to_position`](BlockAnimator::start_swap_to_position) – short
//!   horizontal slide, relative or to an absolute destination
//! - [`start_explosion`](BlockAnimator::start_explosion) – grow, then grow
//!   further while fading out and turning 90° about Y
//! - [`start_float`](BlockAnimator::start_float) – self-sustaining vertical bob
//!
//! # State machine
//!
//! ```text
//! Idle -> Falling   -> Idle
//! Idle -> Swapping  -> Idle
//! Idle -> Exploding -> Idle
//! Idle <-> Floating
//! ```
//!
//! Entering Falling, Swapping, Exploding or Floating first cancels whatever
//! the tile was doing, so at most one flag is ever set.
//!
//! Entries whose flags are all false are dropped on the next [`tick`](BlockAnimator::tick).

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::debug;
use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::SmallVec;
use std::f32::consts::FRAC_PI_2;

use crate::components::block::{ExplosionTimer, SwapDirection};
use crate::components::visual::{Pose, VisualHandle};
use crate::resources::animconfig::BlockTiming;
use crate::resources::boardlayout::BoardLayout;
use crate::resources::tween::{
    Callback, Easing, PropertySet, Tick, TweenConfig, TweenId, TweenScheduler,
};

const EXPLOSION_GROW_SHARE: f32 = 0.2;
const EXPLOSION_GROW_SCALE: f32 = 1.2;
const EXPLOSION_BURST_SCALE: f32 = 1.8;

/// Who drives the 90° turn of an explosion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExplosionRotation {
    /// The turn is part of phase 2 and its completion ends the explosion.
    Inline,
    /// The coordinator starts the turn in unison for the whole cohort via
    /// [`BlockAnimator::start_explosion_rotation`].
    Cohort,
}

/// Animation bookkeeping for one tile.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BlockAnimState {
    pub is_falling: bool,
    pub is_swapping: bool,
    pub is_exploding: bool,
    pub is_floating: bool,
    /// (from_row, to_row) of the fall in progress.
    pub fall_rows: Option<(i32, i32)>,
    pub swap_direction: Option<SwapDirection>,
    /// Current tween of the bob loop.
    pub float_tween: Option<TweenId>,
    /// Where the handle rests while floating.
    pub float_rest: Option<Vec3>,
    /// Direction of the current bob tween.
    pub float_rising: bool,
    /// Bob tweens scheduled so far, the first one included.
    pub float_generations: u32,
    pub rotation_tween: Option<TweenId>,
    #[serde(skip)]
    float_epoch: u32,
    #[serde(skip)]
    owned: SmallVec<[TweenId; 4]>,
}

impl BlockAnimState {
    pub fn is_idle(&self) -> bool {
        !(self.is_falling || self.is_swapping || self.is_exploding || self.is_floating)
    }

    /// Number of animation flags currently set.
    pub fn active_flags(&self) -> usize {
        [
            self.is_falling,
            self.is_swapping,
            self.is_exploding,
            self.is_floating,
        ]
        .iter()
        .filter(|f| **f)
        .count()
    }
}

#[derive(Clone, Copy)]
enum Settle {
    Fall,
    Swap,
    Explosion,
}

/// Everything the bob loop needs to reschedule itself.
#[derive(Clone, Copy)]
struct BobLoop {
    block: Entity,
    node: Entity,
    rest: Vec3,
    amplitude: f32,
    cycle: Tick,
    epoch: u32,
}

/// Block animation controller resource.
#[derive(Resource, Default)]
pub struct BlockAnimator {
    states: FxHashMap<Entity, BlockAnimState>,
    timing: BlockTiming,
    layout: BoardLayout,
    next_epoch: u32,
}

impl BlockAnimator {
    pub fn new(timing: BlockTiming, layout: BoardLayout) -> Self {
        Self {
            states: FxHashMap::default(),
            timing,
            layout,
            next_epoch: 0,
        }
    }

    pub fn timing(&self) -> &BlockTiming {
        &self.timing
    }

    pub fn state(&self, block: Entity) -> Option<&BlockAnimState> {
        self.states.get(&block)
    }

    pub fn is_animating(&self, block: Entity) -> bool {
        self.states.get(&block).is_some_and(|s| !s.is_idle())
    }

    pub fn is_floating(&self, block: Entity) -> bool {
        self.states.get(&block).is_some_and(|s| s.is_floating)
    }

    pub fn float_rest(&self, block: Entity) -> Option<Vec3> {
        self.states.get(&block).and_then(|s| s.float_rest)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &BlockAnimState)> {
        self.states.iter().map(|(e, s)| (*e, s))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop entries with no animation running.
    pub fn tick(&mut self) {
        self.states.retain(|_, s| !s.is_idle());
    }

    /// Cancel what `block` is doing and hand back a clean entry.
    ///
    /// The cohort rotation tween is left running.
    fn reset(&mut self, scheduler: &mut TweenScheduler, block: Entity) -> &mut BlockAnimState {
        let state = self.states.entry(block).or_default();
        for id in state.owned.drain(..) {
            scheduler.cancel(id);
        }
        if let Some(id) = state.float_tween.take() {
            scheduler.cancel(id);
        }
        let rotation_tween = state.rotation_tween;
        *state = BlockAnimState {
            rotation_tween,
            ..Default::default()
        };
        state
    }

    fn settle(&mut self, block: Entity, what: Settle) {
        let Some(state) = self.states.get_mut(&block) else {
            return;
        };
        match what {
            Settle::Fall => {
                state.is_falling = false;
                state.fall_rows = None;
            }
            Settle::Swap => {
                state.is_swapping = false;
                state.swap_direction = None;
            }
            Settle::Explosion => {
                state.is_exploding = false;
            }
        }
        state.owned.clear();
    }

    /// Drop `block` from `from_row` to `to_row` in column `col`.
    pub fn start_fall(
        &mut self,
        scheduler: &mut TweenScheduler,
        block: Entity,
        handle: VisualHandle,
        col: i32,
        from_row: i32,
        to_row: i32,
        on_complete: Option<Callback>,
    ) -> TweenId {
        let from = self.layout.cell_to_world(from_row, col);
        let to = self.layout.cell_to_world(to_row, col);
        let duration = self.timing.fall_ticks;

        let state = self.reset(scheduler, block);
        state.is_falling = true;
        state.fall_rows = Some((from_row, to_row));

        let id = scheduler.create(
            TweenConfig::new(handle.node, duration)
                .from(PropertySet::new().position(from))
                .to(PropertySet::new().position(to))
                .with_easing(Easing::QuadIn)
                .on_complete(settle_then(block, Settle::Fall, on_complete)),
        );
        state.owned.push(id);
        debug!("block {:?} falling {} -> {}", block, from_row, to_row);
        id
    }

    /// Slide one tile width in `direction` from `current`.
    ///
    /// Only correct when `current` is where the handle rests; prefer
    /// [`start_swap_to_position`](Self::start_swap_to_position) when the
    /// simulation supplies a destination.
    pub fn start_swap(
        &mut self,
        scheduler: &mut TweenScheduler,
        block: Entity,
        handle: VisualHandle,
        current: Vec3,
        direction: SwapDirection,
        on_complete: Option<Callback>,
    ) -> TweenId {
        let target = current + Vec3::X * (direction.sign() * self.layout.tile_size);
        self.begin_swap(
            scheduler,
            block,
            handle,
            current,
            target,
            Some(direction),
            on_complete,
        )
    }

    /// Slide from `current` to exactly `target`.
    pub fn start_swap_to_position(
        &mut self,
        scheduler: &mut TweenScheduler,
        block: Entity,
        handle: VisualHandle,
        current: Vec3,
        target: Vec3,
        on_complete: Option<Callback>,
    ) -> TweenId {
        self.begin_swap(scheduler, block, handle, current, target, None, on_complete)
    }

    #[allow(clippy::too_many_arguments)]
    fn begin_swap(
        &mut self,
        scheduler: &mut TweenScheduler,
        block: Entity,
        handle: VisualHandle,
        from: Vec3,
        to: Vec3,
        direction: Option<SwapDirection>,
        on_complete: Option<Callback>,
    ) -> TweenId {
        let duration = self.timing.swap_ticks;
        let state = self.reset(scheduler, block);
        state.is_swapping = true;
        state.swap_direction = direction;

        let id = scheduler.create(
            TweenConfig::new(handle.node, duration)
                .from(PropertySet::new().position(from))
                .to(PropertySet::new().position(to))
                .with_easing(Easing::QuadInOut)
                .on_complete(settle_then(block, Settle::Swap, on_complete)),
        );
        state.owned.push(id);
        id
    }

    /// Two-phase explosion sized to `timer.total`, picked up at `timer.elapsed`.
    ///
    /// Phase 1 (first 20%) scales `pose.scale` up by 1.2. Phase 2 scales on to
    /// 1.8, fades the material out and, in [`ExplosionRotation::Inline`] mode,
    /// turns 90° about Y from `pose.rotation`. `pose` is the handle's resting
    /// pose; ticks already elapsed are skipped, so a handle bound mid-explosion
    /// only plays what is left.
    ///
    /// The handle is left scaled, transparent and rotated; reset it before
    /// binding it to another tile.
    #[allow(clippy::too_many_arguments)]
    pub fn start_explosion(
        &mut self,
        scheduler: &mut TweenScheduler,
        block: Entity,
        handle: VisualHandle,
        pose: Pose,
        timer: ExplosionTimer,
        rotation: ExplosionRotation,
        on_complete: Option<Callback>,
    ) {
        let total = (timer.total as Tick).max(1);
        let elapsed = (timer.elapsed as Tick).min(total - 1);
        let grow = ((total as f32 * EXPLOSION_GROW_SHARE).round() as Tick).max(1);
        let burst = total.saturating_sub(grow).max(1);
        let grown = pose.scale * EXPLOSION_GROW_SCALE;
        let burst_scale = pose.scale * EXPLOSION_BURST_SCALE;
        let turned = pose.rotation + Vec3::Y * FRAC_PI_2;

        let state = self.reset(scheduler, block);
        state.is_exploding = true;

        let mut done: Option<Callback> =
            Some(Box::new(settle_then(block, Settle::Explosion, on_complete)));

        // phase 2 start: delay, length left, and how far into it we already are
        let (delay, burst_left, into_burst) = if elapsed < grow {
            let grow_left = grow - elapsed;
            let from = pose.scale.lerp(grown, elapsed as f32 / grow as f32);
            let grow_id = scheduler.create(
                TweenConfig::new(handle.node, grow_left)
                    .from(PropertySet::new().scale(from))
                    .to(PropertySet::new().scale(grown))
                    .with_easing(Easing::QuadOut),
            );
            state.owned.push(grow_id);
            (grow_left, burst, 0.0)
        } else {
            let into = (elapsed - grow).min(burst - 1);
            (0, burst - into, into as f32 / burst as f32)
        };

        let burst_id = scheduler.create(
            TweenConfig::new(handle.node, burst_left)
                .with_delay(delay)
                .from(PropertySet::new().scale(grown.lerp(burst_scale, into_burst)))
                .to(PropertySet::new().scale(burst_scale))
                .with_easing(Easing::QuadIn)
                .on_complete_boxed(match rotation {
                    ExplosionRotation::Cohort => done.take(),
                    ExplosionRotation::Inline => None,
                }),
        );
        let fade_id = scheduler.create(
            TweenConfig::new(handle.material, burst_left)
                .with_delay(delay)
                .from(PropertySet::new().opacity(1.0 - into_burst))
                .to(PropertySet::new().opacity(0.0)),
        );
        state.owned.extend([burst_id, fade_id]);

        if rotation == ExplosionRotation::Inline {
            let spin_id = scheduler.create(
                TweenConfig::new(handle.node, burst_left)
                    .with_delay(delay)
                    .from(PropertySet::new().rotation(pose.rotation.lerp(turned, into_burst)))
                    .to(PropertySet::new().rotation(turned))
                    .with_easing(Easing::QuadInOut)
                    .on_complete_boxed(done.take()),
            );
            state.owned.push(spin_id);
        }
        debug!(
            "block {:?} exploding over {} ticks from tick {} ({:?})",
            block, total, elapsed, rotation
        );
    }

    /// Start the 90° explosion turn on its own, finishing in `ticks`.
    ///
    /// Replaces a previous turn for the same tile, if any.
    pub fn start_explosion_rotation(
        &mut self,
        scheduler: &mut TweenScheduler,
        block: Entity,
        handle: VisualHandle,
        current_rotation: Vec3,
        ticks: Tick,
    ) -> TweenId {
        let state = self.states.entry(block).or_default();
        if let Some(previous) = state.rotation_tween.take() {
            scheduler.cancel(previous);
        }
        let id = scheduler.create(
            TweenConfig::new(handle.node, ticks.max(1))
                .from(PropertySet::new().rotation(current_rotation))
                .to(PropertySet::new().rotation(current_rotation + Vec3::Y * FRAC_PI_2))
                .with_easing(Easing::QuadInOut)
                .on_complete(move |world: &mut World| {
                    if let Some(mut animator) = world.get_resource_mut::<BlockAnimator>() {
                        if let Some(state) = animator.states.get_mut(&block) {
                            state.rotation_tween = None;
                        }
                    }
                }),
        );
        state.rotation_tween = Some(id);
        id
    }

    /// Start bobbing around `rest`. No-op (returns `None`) if already floating.
    pub fn start_float(
        &mut self,
        scheduler: &mut TweenScheduler,
        block: Entity,
        handle: VisualHandle,
        rest: Vec3,
    ) -> Option<TweenId> {
        if self.is_floating(block) {
            return None;
        }
        self.next_epoch = self.next_epoch.wrapping_add(1);
        let bob = BobLoop {
            block,
            node: handle.node,
            rest,
            amplitude: self.timing.float_amplitude,
            cycle: self.timing.float_cycle_ticks,
            epoch: self.next_epoch,
        };

        let state = self.reset(scheduler, block);
        state.is_floating = true;
        state.float_rest = Some(rest);
        state.float_epoch = bob.epoch;
        state.float_rising = true;
        state.float_generations = 1;
        let id = bob_tween(scheduler, bob, true);
        state.float_tween = Some(id);
        Some(id)
    }

    /// Stop the bob loop and delete the entry for `block`.
    ///
    /// Returns the removed entry so callers can restore the resting position.
    pub fn stop(&mut self, scheduler: &mut TweenScheduler, block: Entity) -> Option<BlockAnimState> {
        let mut state = self.states.remove(&block)?;
        if let Some(id) = state.float_tween.take() {
            scheduler.cancel(id);
        }
        Some(state)
    }

    /// Delete the entry for `block` without touching the scheduler.
    ///
    /// Used after the handle's tweens were already cancelled wholesale.
    pub fn forget(&mut self, block: Entity) -> Option<BlockAnimState> {
        self.states.remove(&block)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.states.clear();
    }
}

/// Completion that settles `what` on `block`, then runs the caller's callback.
fn settle_then(
    block: Entity,
    what: Settle,
    on_complete: Option<Callback>,
) -> impl FnOnce(&mut World) + Send + Sync + 'static {
    move |world: &mut World| {
        if let Some(mut animator) = world.get_resource_mut::<BlockAnimator>() {
            animator.settle(block, what);
        }
        if let Some(callback) = on_complete {
            callback(world);
        }
    }
}

fn bob_tween(scheduler: &mut TweenScheduler, bob: BobLoop, rising: bool) -> TweenId {
    let low = bob.rest - Vec3::Y * bob.amplitude;
    let high = bob.rest + Vec3::Y * bob.amplitude;
    let (from, to) = if rising { (low, high) } else { (high, low) };
    scheduler.create(
        TweenConfig::new(bob.node, bob.cycle)
            .from(PropertySet::new().position(from))
            .to(PropertySet::new().position(to))
            .with_easing(Easing::QuadInOut)
            .on_complete(move |world: &mut World| continue_bob(world, bob, !rising)),
    )
}

/// Schedule the next half-cycle, unless the loop was stopped or replaced.
fn continue_bob(world: &mut World, bob: BobLoop, rising: bool) {
    crate::resources::tween::with_scheduler(world, |animator: &mut BlockAnimator, scheduler| {
        let Some(state) = animator.states.get_mut(&bob.block) else {
            return;
        };
        if !state.is_floating || state.float_epoch != bob.epoch {
            return;
        }
        state.float_tween = Some(bob_tween(scheduler, bob, rising));
        state.float_rising = rising;
        state.float_generations += 1;
    });
}
