//! Per-tick animation coordination.
//!
//! [`build_animation_schedule`] chains, in order:
//!
//! 1. [`update_tweens`] – advance the scheduler and write channel values
//! 2. [`tick_controllers`] – controller bookkeeping
//! 3. [`cohort_countdown_system`] – prune despawned blocks, count down and
//!    start the synchronized explosion turn
//! 4. [`block_dispatch_system`] – diff each block's [`BlockState`] against the
//!    last observed one and start the matching animation
//! 5. [`cursor_dispatch_system`] and [`cursor_follow_system`] – cursor moves
//!
//! Tweens started by steps 3-5 are first advanced on the next tick.
//!
//! # Dispatch table
//!
//! | Transition | Controller call |
//! |---|---|
//! | `-> Floating` | [`BlockAnimator::start_float`] |
//! | `-> SwappingLeft/Right` | [`BlockAnimator::start_swap_to_position`] with a destination, else [`BlockAnimator::start_swap`] |
//! | `-> Exploding` | [`BlockAnimator::start_explosion`] in cohort mode |
//! | `Floating -> Normal` | [`BlockAnimator::stop`], handle back to its resting position |
//!
//! Blocks without a registered handle are skipped and left unobserved, so
//! their transition is dispatched on the first tick a handle exists.

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ScheduleLabel;
use glam::Vec3;
use log::{debug, trace};
use rustc_hash::FxHashSet;

use crate::components::block::{Block, BlockState};
use crate::components::visual::{Pose, Position, Rotation, Scale, VisualHandle};
use crate::resources::blockanimator::{BlockAnimator, ExplosionRotation};
use crate::resources::coordinator::AnimationCoordinator;
use crate::resources::cursoranimator::CursorAnimator;
use crate::resources::stackrise::StackRise;
use crate::resources::tween::{Tick, TweenScheduler};
use crate::systems::cursor::{cursor_dispatch_system, cursor_follow_system};
use crate::systems::tween::update_tweens;

/// Label of the schedule run by
/// [`AnimationWorld::tick_animations`](crate::animworld::AnimationWorld::tick_animations).
#[derive(ScheduleLabel, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnimationSchedule;

/// Build the once-per-tick animation schedule.
pub fn build_animation_schedule() -> Schedule {
    let mut schedule = Schedule::new(AnimationSchedule);
    schedule.add_systems(
        (
            update_tweens,
            tick_controllers,
            cohort_countdown_system,
            block_dispatch_system,
            cursor_dispatch_system,
            cursor_follow_system,
        )
            .chain(),
    );
    schedule
}

/// Controller bookkeeping: collect idle block entries, drop stale cursor ids,
/// recover a stack rise whose driver vanished.
pub fn tick_controllers(
    scheduler: Res<TweenScheduler>,
    mut blocks: ResMut<BlockAnimator>,
    mut cursor: ResMut<CursorAnimator>,
    mut rise: ResMut<StackRise>,
) {
    blocks.tick();
    cursor.tick(&scheduler);
    rise.tick(&scheduler);
}

type NodeQuery<'w, 's> =
    Query<'w, 's, (&'static mut Position, Option<&'static Rotation>, Option<&'static Scale>)>;

fn pose_of(nodes: &NodeQuery, node: Entity) -> Pose {
    let mut pose = Pose::default();
    if let Ok((position, rotation, scale)) = nodes.get(node) {
        pose.position = position.0;
        if let Some(rotation) = rotation {
            pose.rotation = rotation.0;
        }
        if let Some(scale) = scale {
            pose.scale = scale.0;
        }
    }
    pose
}

/// Prune despawned blocks, then run the cohort rotation countdown.
///
/// Each tick every pending entry counts down by one; new `Exploding` blocks
/// are seeded; blocks that left `Exploding` are forgotten. A due entry starts
/// the turn if the block has a handle, otherwise it waits at zero.
pub fn cohort_countdown_system(
    blocks: Query<(Entity, &Block)>,
    rotations: Query<&Rotation>,
    mut coordinator: ResMut<AnimationCoordinator>,
    mut animator: ResMut<BlockAnimator>,
    mut scheduler: ResMut<TweenScheduler>,
) {
    let live: FxHashSet<Entity> = blocks.iter().map(|(entity, _)| entity).collect();
    let mut stale = coordinator.stale_blocks(&live);
    stale.extend(
        animator
            .iter()
            .map(|(entity, _)| entity)
            .filter(|entity| !live.contains(entity)),
    );
    for block in stale {
        if let Some(handle) = coordinator.forget_block(block) {
            for target in handle.targets() {
                scheduler.cancel_all_for_target(target);
            }
        }
        animator.stop(&mut scheduler, block);
        trace!("pruned despawned block {:?}", block);
    }

    coordinator.cohort.advance();
    let safety = coordinator.safety_ticks();
    for (entity, block) in blocks.iter() {
        if block.state == BlockState::Exploding {
            if coordinator.cohort.seed(entity, block.explosion, safety) {
                debug!(
                    "block {:?} joins rotation cohort, due in {:?} ticks",
                    entity,
                    coordinator.cohort.remaining(entity)
                );
            }
        } else if coordinator.cohort.is_pending(entity) || coordinator.cohort.is_started(entity) {
            coordinator.cohort.forget(entity);
        }
    }

    for entity in coordinator.cohort.due() {
        let Some(handle) = coordinator.handle(entity) else {
            trace!("block {:?} rotation due, waiting for a handle", entity);
            continue;
        };
        let Ok((_, block)) = blocks.get(entity) else {
            continue;
        };
        let ticks = block.explosion.remaining().max(1) as Tick;
        let rotation = rotations.get(handle.node).map_or(Vec3::ZERO, |r| r.0);
        animator.start_explosion_rotation(&mut scheduler, entity, handle, rotation, ticks);
        coordinator.cohort.mark_started(entity);
        debug!("block {:?} rotation started over {} ticks", entity, ticks);
    }
}

/// Start animations for blocks whose state changed since last tick.
pub fn block_dispatch_system(
    blocks: Query<(Entity, &Block)>,
    mut nodes: NodeQuery,
    mut coordinator: ResMut<AnimationCoordinator>,
    mut animator: ResMut<BlockAnimator>,
    mut scheduler: ResMut<TweenScheduler>,
) {
    let mut ordered: Vec<(Entity, Block)> = blocks.iter().map(|(e, b)| (e, *b)).collect();
    ordered.sort_by_key(|(entity, _)| *entity);

    for (entity, block) in ordered {
        let Some(handle) = coordinator.handle(entity) else {
            continue;
        };
        let previous = coordinator.observed(entity);
        if previous == Some(block.state) {
            // a floating block must always have a live bob loop
            if block.state == BlockState::Floating && !animator.is_floating(entity) {
                let rest = pose_of(&nodes, handle.node).position;
                animator.start_float(&mut scheduler, entity, handle, rest);
            }
            continue;
        }
        dispatch(
            &mut animator,
            &mut scheduler,
            &mut nodes,
            entity,
            handle,
            previous,
            &block,
        );
        coordinator.set_observed(entity, block.state);
    }
}

fn dispatch(
    animator: &mut BlockAnimator,
    scheduler: &mut TweenScheduler,
    nodes: &mut NodeQuery,
    entity: Entity,
    handle: VisualHandle,
    previous: Option<BlockState>,
    block: &Block,
) {
    let pose = pose_of(nodes, handle.node);
    match block.state {
        BlockState::Floating => {
            animator.start_float(scheduler, entity, handle, pose.position);
        }
        BlockState::SwappingLeft | BlockState::SwappingRight => {
            match (block.swap_destination, block.state.swap_direction()) {
                (Some(destination), _) => {
                    animator.start_swap_to_position(
                        scheduler,
                        entity,
                        handle,
                        pose.position,
                        destination,
                        None,
                    );
                }
                (None, Some(direction)) => {
                    animator.start_swap(scheduler, entity, handle, pose.position, direction, None);
                }
                (None, None) => {}
            }
        }
        BlockState::Exploding => {
            animator.start_explosion(
                scheduler,
                entity,
                handle,
                pose,
                block.explosion,
                ExplosionRotation::Cohort,
                None,
            );
        }
        BlockState::Normal if previous == Some(BlockState::Floating) => {
            if !animator.is_floating(entity) {
                return;
            }
            let rest = animator.float_rest(entity);
            animator.stop(scheduler, entity);
            if let (Some(rest), Ok((mut position, _, _))) = (rest, nodes.get_mut(handle.node)) {
                position.0 = rest;
            }
        }
        BlockState::Normal | BlockState::Matched => {}
    }
}
