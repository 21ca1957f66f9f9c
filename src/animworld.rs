//! Entry point for collaborators.
//!
//! [`install_animations`] puts the scheduler, the three controllers, the
//! coordinator and the per-tick schedule into a [`World`]. The
//! [`AnimationWorld`] extension trait is what the simulation, the renderer
//! and input handling call afterwards.
//!
//! # Example
//!
//! ```no_run
//! use bevy_ecs::prelude::*;
//! use glam::Vec3;
//! use tilefx::animworld::{AnimationWorld, install_animations};
//! use tilefx::components::block::{Block, BlockState};
//! use tilefx::components::visual::VisualHandle;
//! use tilefx::resources::animconfig::AnimationConfig;
//!
//! let mut world = World::new();
//! install_animations(&mut world, AnimationConfig::new());
//!
//! let block = world.spawn(Block::new(0, 0)).id();
//! let handle = VisualHandle::spawn(&mut world, Vec3::ZERO);
//! world.register_handle(block, handle);
//!
//! world.get_mut::<Block>(block).unwrap().state = BlockState::Floating;
//! world.tick_animations();
//! ```

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::components::block::Block;
use crate::components::visual::{Material, Rotation, Scale, VisualHandle};
use crate::resources::animconfig::AnimationConfig;
use crate::resources::blockanimator::{BlockAnimState, BlockAnimator};
use crate::resources::boardlayout::BoardLayout;
use crate::resources::coordinator::{AnimationCoordinator, Binding};
use crate::resources::cursoranimator::CursorAnimator;
use crate::resources::stackrise::StackRise;
use crate::resources::tween::{Callback, Tick, TweenScheduler, with_scheduler};
use crate::systems::animation::{AnimationSchedule, build_animation_schedule};

/// Insert every animation resource and the animation schedule.
///
/// Calling it again replaces all animation state.
pub fn install_animations(world: &mut World, config: AnimationConfig) {
    world.insert_resource(TweenScheduler::new());
    insert_controllers(world, &config);
    world.add_schedule(build_animation_schedule());
    info!(
        "animations installed: tile_size={} fall={} swap={} rise={}",
        config.layout.tile_size, config.block.fall_ticks, config.block.swap_ticks, config.rise_steps
    );
    world.insert_resource(config);
}

fn insert_controllers(world: &mut World, config: &AnimationConfig) {
    world.insert_resource(config.layout);
    world.insert_resource(BlockAnimator::new(config.block, config.layout));
    world.insert_resource(CursorAnimator::new(config.cursor));
    world.insert_resource(StackRise::new(config.rise_steps));
    world.insert_resource(AnimationCoordinator::new(
        config.block.explosion_safety_ticks,
    ));
}

/// Animation state of one block, for debugging.
#[derive(Debug, Clone, Serialize)]
pub struct BlockSnapshot {
    /// `Entity::to_bits` of the block.
    pub entity: u64,
    pub handle_node: Option<u64>,
    pub animation: BlockAnimState,
    pub rotation_due_in: Option<u32>,
    pub rotation_started: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CursorSnapshot {
    pub attached: bool,
    pub moving: bool,
    pub pulsing: bool,
    pub panic: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StackSnapshot {
    pub rising: bool,
    pub progress: f32,
    pub offset: f32,
    pub rises_completed: u32,
}

/// Serializable view of the whole animation layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnimationSnapshot {
    pub tick: Tick,
    pub tweens: usize,
    pub handles: usize,
    pub cohort_pending: usize,
    pub cohort_started: usize,
    pub blocks: Vec<BlockSnapshot>,
    pub cursor: CursorSnapshot,
    pub stack: StackSnapshot,
}

/// Animation operations on a [`World`] prepared by [`install_animations`].
pub trait AnimationWorld {
    /// Run the animation schedule once. Call exactly once per simulation tick,
    /// after the simulation and before the renderer samples handles.
    fn tick_animations(&mut self);

    /// Bind `handle` to `block`, cancelling every tween on it first.
    ///
    /// Registering the handle a block already has is a no-op, so running
    /// effects are left alone.
    fn register_handle(&mut self, block: Entity, handle: VisualHandle);

    /// Release the handle bound to `block`, cancelling its tweens.
    fn unregister_handle(&mut self, block: Entity) -> Option<VisualHandle>;

    fn register_cursor_handle(&mut self, handle: VisualHandle);

    /// Animate `block` dropping from `from_row` to `to_row` in its column.
    ///
    /// Returns `false` if the block has no handle or no [`Block`] component.
    fn trigger_fall(
        &mut self,
        block: Entity,
        from_row: i32,
        to_row: i32,
        on_complete: Option<Callback>,
    ) -> bool;

    fn trigger_swap_feedback(&mut self);

    fn set_panic_mode(&mut self, panic: bool);

    /// Returns `false` if a rise is already running.
    fn start_stack_rise(&mut self, on_complete: Option<Callback>) -> bool;

    fn stop_stack_rise(&mut self);

    fn is_animating(&self, block: Entity) -> bool;

    /// One-line summary for logs and overlays.
    fn animation_debug_info(&self) -> String;

    fn animation_snapshot(&self) -> Option<AnimationSnapshot>;

    fn snapshot_json(&self) -> Result<String, String>;

    /// Cancel tweens on `handle` and restore identity scale, zero rotation and
    /// full opacity, as needed after an explosion.
    fn reset_handle(&mut self, handle: VisualHandle);

    /// Cancel every tween and drop all controller and coordinator state.
    fn teardown_animations(&mut self);
}

impl AnimationWorld for World {
    fn tick_animations(&mut self) {
        if let Err(e) = self.try_run_schedule(AnimationSchedule) {
            warn!("animation schedule not run: {}", e);
        }
    }

    fn register_handle(&mut self, block: Entity, handle: VisualHandle) {
        let Some(binding) = self
            .get_resource_mut::<AnimationCoordinator>()
            .map(|mut coordinator| coordinator.bind(block, handle))
        else {
            warn!("register_handle called before install_animations");
            return;
        };
        let Binding::Rebound {
            previous_handle,
            previous_owner,
        } = binding
        else {
            trace!("handle {:?} already bound to {:?}", handle.node, block);
            return;
        };
        with_scheduler(self, |animator: &mut BlockAnimator, scheduler| {
            let mut cancelled = 0;
            for target in handle.targets() {
                cancelled += scheduler.cancel_all_for_target(target);
            }
            if let Some(old) = previous_handle {
                for target in old.targets() {
                    cancelled += scheduler.cancel_all_for_target(target);
                }
            }
            if let Some(owner) = previous_owner {
                animator.forget(owner);
            }
            animator.forget(block);
            debug!(
                "handle {:?} bound to {:?} ({} tweens cancelled, evicted {:?})",
                handle.node,
                block,
                cancelled,
                previous_owner
            );
        });
    }

    fn unregister_handle(&mut self, block: Entity) -> Option<VisualHandle> {
        let handle = self
            .get_resource_mut::<AnimationCoordinator>()?
            .unbind(block)?;
        with_scheduler(self, |animator: &mut BlockAnimator, scheduler| {
            for target in handle.targets() {
                scheduler.cancel_all_for_target(target);
            }
            animator.forget(block);
        });
        Some(handle)
    }

    fn register_cursor_handle(&mut self, handle: VisualHandle) {
        with_scheduler(self, |cursor: &mut CursorAnimator, scheduler| {
            cursor.attach(scheduler, handle)
        });
    }

    fn trigger_fall(
        &mut self,
        block: Entity,
        from_row: i32,
        to_row: i32,
        on_complete: Option<Callback>,
    ) -> bool {
        let Some(col) = self.get::<Block>(block).map(|b| b.col) else {
            warn!("trigger_fall on {:?} which is not a block", block);
            return false;
        };
        let Some(handle) = self
            .get_resource::<AnimationCoordinator>()
            .and_then(|c| c.handle(block))
        else {
            warn!("trigger_fall on {:?} which has no handle", block);
            return false;
        };
        with_scheduler(self, |animator: &mut BlockAnimator, scheduler| {
            animator.start_fall(scheduler, block, handle, col, from_row, to_row, on_complete);
        })
        .is_some()
    }

    fn trigger_swap_feedback(&mut self) {
        with_scheduler(self, |cursor: &mut CursorAnimator, scheduler| {
            cursor.trigger_feedback(scheduler, Vec3::ONE)
        });
    }

    fn set_panic_mode(&mut self, panic: bool) {
        with_scheduler(self, |cursor: &mut CursorAnimator, scheduler| {
            cursor.set_panic_mode(scheduler, panic)
        });
    }

    fn start_stack_rise(&mut self, on_complete: Option<Callback>) -> bool {
        let tile_height = self
            .get_resource::<BoardLayout>()
            .map_or(1.0, |layout| layout.tile_size);
        with_scheduler(self, |rise: &mut StackRise, scheduler| {
            rise.start(scheduler, tile_height, on_complete)
        })
        .unwrap_or(false)
    }

    fn stop_stack_rise(&mut self) {
        with_scheduler(self, |rise: &mut StackRise, scheduler| rise.stop(scheduler));
    }

    fn is_animating(&self, block: Entity) -> bool {
        self.get_resource::<BlockAnimator>()
            .is_some_and(|animator| animator.is_animating(block))
    }

    fn animation_debug_info(&self) -> String {
        let Some(snapshot) = self.animation_snapshot() else {
            return "animations not installed".to_string();
        };
        let animating = snapshot
            .blocks
            .iter()
            .filter(|b| !b.animation.is_idle())
            .count();
        format!(
            "tick={} tweens={} animating={} handles={} cohort={}/{} cursor[moving={} panic={}] rise[{} {:.2}]",
            snapshot.tick,
            snapshot.tweens,
            animating,
            snapshot.handles,
            snapshot.cohort_pending,
            snapshot.cohort_started,
            snapshot.cursor.moving,
            snapshot.cursor.panic,
            if snapshot.stack.rising { "rising" } else { "idle" },
            snapshot.stack.progress,
        )
    }

    fn animation_snapshot(&self) -> Option<AnimationSnapshot> {
        let scheduler = self.get_resource::<TweenScheduler>()?;
        let animator = self.get_resource::<BlockAnimator>()?;
        let coordinator = self.get_resource::<AnimationCoordinator>()?;
        let cursor = self.get_resource::<CursorAnimator>()?;
        let rise = self.get_resource::<StackRise>()?;

        let mut blocks: Vec<BlockSnapshot> = animator
            .iter()
            .map(|(entity, state)| BlockSnapshot {
                entity: entity.to_bits(),
                handle_node: coordinator.handle(entity).map(|h| h.node.to_bits()),
                animation: state.clone(),
                rotation_due_in: coordinator.cohort.remaining(entity),
                rotation_started: coordinator.cohort.is_started(entity),
            })
            .collect();
        blocks.sort_by_key(|b| b.entity);

        Some(AnimationSnapshot {
            tick: scheduler.current_tick(),
            tweens: scheduler.len(),
            handles: coordinator.handle_count(),
            cohort_pending: coordinator.cohort.pending_len(),
            cohort_started: coordinator.cohort.started_len(),
            blocks,
            cursor: CursorSnapshot {
                attached: cursor.handle().is_some(),
                moving: cursor.is_moving(),
                pulsing: cursor.is_pulsing(),
                panic: cursor.is_panicking(),
            },
            stack: StackSnapshot {
                rising: rise.is_rising(),
                progress: rise.progress(),
                offset: rise.offset(),
                rises_completed: rise.rises_completed(),
            },
        })
    }

    fn snapshot_json(&self) -> Result<String, String> {
        let snapshot = self
            .animation_snapshot()
            .ok_or_else(|| "animations not installed".to_string())?;
        serde_json::to_string_pretty(&snapshot)
            .map_err(|e| format!("Failed to serialize animation snapshot: {}", e))
    }

    fn reset_handle(&mut self, handle: VisualHandle) {
        if let Some(mut scheduler) = self.get_resource_mut::<TweenScheduler>() {
            for target in handle.targets() {
                scheduler.cancel_all_for_target(target);
            }
        }
        if let Some(mut scale) = self.get_mut::<Scale>(handle.node) {
            scale.0 = Vec3::ONE;
        }
        if let Some(mut rotation) = self.get_mut::<Rotation>(handle.node) {
            rotation.0 = Vec3::ZERO;
        }
        if let Some(mut material) = self.get_mut::<Material>(handle.material) {
            material.opacity = 1.0;
        }
    }

    fn teardown_animations(&mut self) {
        if let Some(mut scheduler) = self.get_resource_mut::<TweenScheduler>() {
            scheduler.clear_all();
        }
        let config = self
            .get_resource::<AnimationConfig>()
            .cloned()
            .unwrap_or_default();
        insert_controllers(self, &config);
        info!("animation state torn down");
    }
}
