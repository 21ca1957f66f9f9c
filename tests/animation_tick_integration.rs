//! Animation tick integration tests: cohort rotation, stack rise, swaps,
//! float loops and handle rebinding, driven through the full schedule.

use std::f32::consts::FRAC_PI_2;

use bevy_ecs::prelude::*;
use glam::Vec3;
use rustc_hash::FxHashMap;

use tilefx::animworld::{AnimationWorld, install_animations};
use tilefx::components::block::{Block, BlockState};
use tilefx::components::visual::{Material, Position, Rotation, Scale, VisualHandle};
use tilefx::resources::animconfig::AnimationConfig;
use tilefx::resources::blockanimator::BlockAnimator;
use tilefx::resources::coordinator::AnimationCoordinator;
use tilefx::resources::stackrise::StackRise;
use tilefx::resources::tween::{TweenConfig, TweenId, TweenScheduler};

const EPSILON: f32 = 1e-5;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

#[derive(Resource, Default)]
struct Fired(u32);

fn make_world() -> World {
    let mut world = World::new();
    install_animations(&mut world, AnimationConfig::new());
    world.init_resource::<Fired>();
    world
}

fn fire() -> Option<tilefx::resources::tween::Callback> {
    Some(Box::new(|world: &mut World| world.resource_mut::<Fired>().0 += 1))
}

fn rotation_tweens(world: &World, node: Entity) -> Vec<TweenId> {
    world
        .resource::<TweenScheduler>()
        .iter()
        .filter(|t| t.target() == Some(node) && t.channels().rotation.is_some())
        .map(|t| t.id())
        .collect()
}

fn advance_explosions(world: &mut World) {
    let mut query = world.query::<&mut Block>();
    for mut block in query.iter_mut(world) {
        if block.state == BlockState::Exploding {
            block.explosion.elapsed += 1;
        }
    }
}

// ==================== COHORT ROTATION ====================

#[test]
fn cohort_rotates_once_per_block_despite_staggered_handles() {
    let mut world = make_world();
    let blocks: Vec<Entity> = (0..3)
        .map(|col| {
            world
                .spawn(
                    Block::new(0, col)
                        .with_state(BlockState::Exploding)
                        .with_explosion(60),
                )
                .id()
        })
        .collect();
    // handles arrive on ticks T, T+2 and T+5
    let arrivals = [38u64, 40, 43];
    let mut handles: FxHashMap<Entity, VisualHandle> = FxHashMap::default();
    let mut seen: FxHashMap<Entity, Vec<TweenId>> = FxHashMap::default();

    for tick in 1..=60u64 {
        advance_explosions(&mut world);
        for (block, at) in blocks.iter().zip(arrivals) {
            if tick == at {
                let position = Vec3::new(handles.len() as f32, 0.0, 0.0);
                let handle = VisualHandle::spawn(&mut world, position);
                world.register_handle(*block, handle);
                handles.insert(*block, handle);
            }
        }
        world.tick_animations();

        for (block, handle) in &handles {
            let live = rotation_tweens(&world, handle.node);
            assert!(live.len() <= 1, "two rotation tweens on one handle");
            let ids = seen.entry(*block).or_default();
            for id in live {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        if tick == 40 {
            // the first two share the same start tick
            assert_eq!(rotation_tweens(&world, handles[&blocks[0]].node).len(), 1);
            assert_eq!(rotation_tweens(&world, handles[&blocks[1]].node).len(), 1);
        }
    }

    let coordinator = world.resource::<AnimationCoordinator>();
    assert_eq!(coordinator.cohort.started_len(), 3);
    assert_eq!(coordinator.cohort.pending_len(), 0);
    for block in &blocks {
        assert_eq!(seen[block].len(), 1, "rotation started more than once");
        let rotation = world.get::<Rotation>(handles[block].node).unwrap().0;
        assert!(approx_eq(rotation.y, FRAC_PI_2), "rotation unfinished at explosion end");
    }
}

#[test]
fn rebinding_after_rotation_does_not_restart_it() {
    let mut world = make_world();
    let block = world
        .spawn(
            Block::new(0, 0)
                .with_state(BlockState::Exploding)
                .with_explosion(30),
        )
        .id();
    let first = VisualHandle::spawn(&mut world, Vec3::ZERO);
    world.register_handle(block, first);

    for _ in 0..12 {
        advance_explosions(&mut world);
        world.tick_animations();
    }
    assert!(world.resource::<AnimationCoordinator>().cohort.is_started(block));

    let second = VisualHandle::spawn(&mut world, Vec3::ZERO);
    world.register_handle(block, second);
    assert!(rotation_tweens(&world, first.node).is_empty());

    for _ in 0..18 {
        advance_explosions(&mut world);
        world.tick_animations();
        assert!(rotation_tweens(&world, second.node).is_empty());
    }
    assert_eq!(world.resource::<AnimationCoordinator>().cohort.started_len(), 1);
    // explosion was re-dispatched onto the new handle
    assert!(!world.resource::<TweenScheduler>().iter().any(|t| t.target() == Some(first.node)));
}

#[test]
fn registering_the_same_handle_mid_explosion_changes_nothing() {
    let mut world = make_world();
    let block = world
        .spawn(
            Block::new(0, 0)
                .with_state(BlockState::Exploding)
                .with_explosion(30),
        )
        .id();
    let handle = VisualHandle::spawn(&mut world, Vec3::ZERO);
    world.register_handle(block, handle);

    let mut max_scale: f32 = 0.0;
    for tick in 1..=30u64 {
        advance_explosions(&mut world);
        if tick == 15 {
            let before = world.resource::<TweenScheduler>().count_for_target(handle.node);
            world.register_handle(block, handle);
            assert_eq!(
                world.resource::<TweenScheduler>().count_for_target(handle.node),
                before
            );
            assert_eq!(
                world.resource::<AnimationCoordinator>().observed(block),
                Some(BlockState::Exploding)
            );
        }
        world.tick_animations();
        max_scale = max_scale.max(world.get::<Scale>(handle.node).unwrap().0.x);
    }

    assert!(max_scale <= 1.8 + EPSILON, "scale compounded to {}", max_scale);
    let rotation = world.get::<Rotation>(handle.node).unwrap().0;
    assert!(approx_eq(rotation.y, FRAC_PI_2), "turn stopped at {}", rotation.y);
    assert_eq!(world.get::<Material>(handle.material).unwrap().opacity, 0.0);
}

#[test]
fn new_handle_mid_explosion_picks_up_where_it_was() {
    let mut world = make_world();
    let block = world
        .spawn(
            Block::new(0, 0)
                .with_state(BlockState::Exploding)
                .with_explosion(30),
        )
        .id();
    let first = VisualHandle::spawn(&mut world, Vec3::ZERO);
    world.register_handle(block, first);

    let second = VisualHandle::spawn(&mut world, Vec3::ZERO);
    let mut second_scales = Vec::new();
    for tick in 1..=30u64 {
        advance_explosions(&mut world);
        if tick == 15 {
            world.register_handle(block, second);
        }
        world.tick_animations();
        if tick > 15 {
            second_scales.push(world.get::<Scale>(second.node).unwrap().0.x);
        }
    }

    // phase 1 is not replayed on the new handle
    assert!(second_scales[0] > 1.2, "restarted from {}", second_scales[0]);
    assert!(second_scales.windows(2).all(|w| w[1] >= w[0]));
    assert!(approx_eq(*second_scales.last().unwrap(), 1.8));
    assert_eq!(world.get::<Material>(second.material).unwrap().opacity, 0.0);
    assert_eq!(world.resource::<TweenScheduler>().count_for_target(first.node), 0);
}

#[test]
fn short_explosion_rotates_on_first_tick_with_handle() {
    let mut world = make_world();
    let block = world
        .spawn(
            Block::new(0, 0)
                .with_state(BlockState::Exploding)
                .with_explosion(10),
        )
        .id();
    advance_explosions(&mut world);
    world.tick_animations();
    advance_explosions(&mut world);
    world.tick_animations();
    assert_eq!(world.resource::<AnimationCoordinator>().cohort.remaining(block), Some(0));

    let handle = VisualHandle::spawn(&mut world, Vec3::ZERO);
    world.register_handle(block, handle);
    advance_explosions(&mut world);
    world.tick_animations();
    assert_eq!(rotation_tweens(&world, handle.node).len(), 1);
    assert!(world.resource::<AnimationCoordinator>().cohort.is_started(block));
}

#[test]
fn leaving_exploding_forgets_the_countdown() {
    let mut world = make_world();
    let block = world
        .spawn(
            Block::new(0, 0)
                .with_state(BlockState::Exploding)
                .with_explosion(60),
        )
        .id();
    world.tick_animations();
    assert!(world.resource::<AnimationCoordinator>().cohort.is_pending(block));

    world.get_mut::<Block>(block).unwrap().state = BlockState::Normal;
    world.tick_animations();
    assert!(!world.resource::<AnimationCoordinator>().cohort.is_pending(block));
}

// ==================== STACK RISE ====================

#[test]
fn stack_rise_runs_once_over_its_steps() {
    let mut world = make_world();
    assert!(world.start_stack_rise(fire()));
    assert_eq!(world.resource::<StackRise>().progress(), 0.0);
    assert!(!world.start_stack_rise(fire()));
    assert_eq!(world.resource::<TweenScheduler>().len(), 1);

    for tick in 1..=32 {
        world.tick_animations();
        if tick < 32 {
            assert!(world.resource::<StackRise>().is_rising());
            assert!(!world.start_stack_rise(fire()));
        }
    }
    let rise = world.resource::<StackRise>();
    assert_eq!(rise.progress(), 1.0);
    assert_eq!(rise.offset(), 0.0);
    assert!(!rise.is_rising());
    assert_eq!(world.resource::<Fired>().0, 1);

    for _ in 0..40 {
        world.tick_animations();
    }
    assert_eq!(world.resource::<Fired>().0, 1);
}

#[test]
fn stopped_rise_never_fires() {
    let mut world = make_world();
    world.start_stack_rise(fire());
    for _ in 0..10 {
        world.tick_animations();
    }
    world.stop_stack_rise();
    for _ in 0..40 {
        world.tick_animations();
    }
    assert_eq!(world.resource::<Fired>().0, 0);
    assert_eq!(world.resource::<StackRise>().progress(), 1.0);
    assert!(world.start_stack_rise(None));
}

// ==================== SWAP & FALL ====================

#[test]
fn swap_during_fall_lands_on_supplied_destination() {
    let mut world = make_world();
    let block = world.spawn(Block::new(5, 2)).id();
    let handle = VisualHandle::spawn(&mut world, Vec3::new(2.0, 5.0, 0.0));
    world.register_handle(block, handle);
    world.tick_animations();

    assert!(world.trigger_fall(block, 5, 1, fire()));
    for _ in 0..6 {
        world.tick_animations();
    }
    let mid = world.get::<Position>(handle.node).unwrap().0;
    assert!(mid.y < 5.0 && mid.y > 1.0);

    let destination = Vec3::new(3.0, 1.0, 0.0);
    {
        let mut b = world.get_mut::<Block>(block).unwrap();
        b.state = BlockState::SwappingRight;
        b.swap_destination = Some(destination);
    }
    for _ in 0..4 {
        world.tick_animations();
    }
    assert_eq!(world.get::<Position>(handle.node).unwrap().0, destination);

    let state = world.resource::<BlockAnimator>().state(block).cloned().unwrap_or_default();
    assert!(!state.is_falling);
    for _ in 0..20 {
        world.tick_animations();
    }
    assert_eq!(world.resource::<Fired>().0, 0);
}

// ==================== FLOAT ====================

#[test]
fn float_loop_keeps_alternating_until_normal() {
    let mut world = make_world();
    let block = world
        .spawn(Block::new(4, 0).with_state(BlockState::Floating))
        .id();
    let handle = VisualHandle::spawn(&mut world, Vec3::new(0.0, 4.0, 0.0));
    world.register_handle(block, handle);

    let mut flips = Vec::new();
    let mut last = None;
    for _ in 0..(20 * 5 + 1) {
        world.tick_animations();
        let rising = world
            .resource::<BlockAnimator>()
            .state(block)
            .map(|s| s.float_rising);
        if rising != last {
            flips.push(rising);
            last = rising;
        }
    }
    assert!(flips.len() >= 5, "expected at least 4 direction changes, got {:?}", flips);
    for pair in flips.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }

    world.get_mut::<Block>(block).unwrap().state = BlockState::Normal;
    world.tick_animations();
    assert_eq!(world.get::<Position>(handle.node).unwrap().0, Vec3::new(0.0, 4.0, 0.0));
    for _ in 0..60 {
        world.tick_animations();
    }
    assert_eq!(world.resource::<TweenScheduler>().count_for_target(handle.node), 0);
}

// ==================== SCHEDULER ====================

#[test]
fn cancel_all_for_target_is_scoped_to_that_target() {
    let mut world = make_world();
    let a = VisualHandle::spawn(&mut world, Vec3::ZERO);
    let b = VisualHandle::spawn(&mut world, Vec3::ZERO);
    {
        let mut scheduler = world.resource_mut::<TweenScheduler>();
        for target in [a.node, a.material, b.node] {
            scheduler.create(TweenConfig::new(target, 10));
            scheduler.create(TweenConfig::new(target, 20));
        }
        assert_eq!(scheduler.cancel_all_for_target(a.node), 2);
        assert_eq!(scheduler.count_for_target(a.node), 0);
        assert_eq!(scheduler.count_for_target(a.material), 2);
        assert_eq!(scheduler.count_for_target(b.node), 2);
    }
}

// ==================== CONFIG ====================

#[test]
fn config_timings_reach_the_controllers() {
    let mut config = AnimationConfig::new();
    config
        .load_from_str("[block]\nfall_ticks = 5\n[board]\ntile_size = 2.0\n")
        .unwrap();
    let mut world = World::new();
    install_animations(&mut world, config);

    let block = world.spawn(Block::new(3, 1)).id();
    let handle = VisualHandle::spawn(&mut world, Vec3::new(2.0, 6.0, 0.0));
    world.register_handle(block, handle);
    assert!(world.trigger_fall(block, 3, 0, None));
    for _ in 0..5 {
        world.tick_animations();
    }
    assert_eq!(world.get::<Position>(handle.node).unwrap().0, Vec3::new(2.0, 0.0, 0.0));
    assert!(!world.is_animating(block));
}
