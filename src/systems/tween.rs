//! Tween advancement system.
//!
//! [`update_tweens`] is the scheduler's per-tick entry point. It runs in two
//! stages so that callbacks may freely touch the scheduler:
//!
//! 1. with the [`TweenScheduler`] checked out of the world: advance the tick
//!    counter, activate due tweens, and write interpolated channel values onto
//!    their targets ([`Position`], [`Scale`], [`Rotation`], [`Material`])
//! 2. with the scheduler back in the world: in creation order, run each
//!    stepped tween's step callback, then remove completed tweens and run
//!    their completion callbacks
//!
//! A tween created from a callback starts at the current tick and is first
//! advanced on the next one.

use crate::components::visual::{Material, Position, Rotation, Scale};
use crate::resources::tween::{Easing, PropertySet, TweenId, TweenScheduler};
use bevy_ecs::prelude::*;
use glam::{Vec3, Vec4};
use smallvec::SmallVec;
use std::f32::consts::PI;

/// Apply an easing function to a normalized progress value.
///
/// The input `t` is clamped to [0.0, 1.0]. Every curve returns exactly 0.0 at
/// `t = 0` and exactly 1.0 at `t = 1`.
pub fn ease(e: Easing, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t >= 1.0 {
        return 1.0;
    }
    match e {
        Easing::Linear => t,
        Easing::QuadIn => t * t,
        Easing::QuadOut => t * (2.0 - t),
        Easing::QuadInOut => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                -1.0 + (4.0 - 2.0 * t) * t
            }
        }
        Easing::BounceOut => bounce_out(t),
        Easing::ElasticOut => {
            if t <= 0.0 {
                0.0
            } else {
                let c4 = (2.0 * PI) / 3.0;
                2.0_f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
            }
        }
    }
}

fn bounce_out(t: f32) -> f32 {
    const N1: f32 = 7.5625;
    const D1: f32 = 2.75;
    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

/// Linearly interpolate between two floats. `t == 1` yields `b` exactly.
pub(crate) fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    if t == 1.0 { b } else { a + (b - a) * t }
}

/// Component-wise interpolation of two 3D vectors. `t == 1` yields `b` exactly.
pub(crate) fn lerp_v3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    if t == 1.0 { b } else { a + (b - a) * t }
}

/// Component-wise interpolation of two 4D vectors. `t == 1` yields `b` exactly.
pub(crate) fn lerp_v4(a: Vec4, b: Vec4, t: f32) -> Vec4 {
    if t == 1.0 { b } else { a + (b - a) * t }
}

/// Write every channel present in both `from` and `to` onto `target`.
///
/// Missing entities or components are skipped silently.
fn apply_channels(world: &mut World, target: Entity, from: &PropertySet, to: &PropertySet, t: f32) {
    if let (Some(a), Some(b)) = (from.position, to.position) {
        if let Some(mut position) = world.get_mut::<Position>(target) {
            position.0 = lerp_v3(a, b, t);
        }
    }
    if let (Some(a), Some(b)) = (from.scale, to.scale) {
        if let Some(mut scale) = world.get_mut::<Scale>(target) {
            scale.0 = lerp_v3(a, b, t);
        }
    }
    if let (Some(a), Some(b)) = (from.rotation, to.rotation) {
        if let Some(mut rotation) = world.get_mut::<Rotation>(target) {
            rotation.0 = lerp_v3(a, b, t);
        }
    }
    if let (Some(a), Some(b)) = (from.opacity, to.opacity) {
        if let Some(mut material) = world.get_mut::<Material>(target) {
            material.opacity = lerp_f32(a, b, t);
        }
    }
    if let (Some(a), Some(b)) = (from.color, to.color) {
        if let Some(mut material) = world.get_mut::<Material>(target) {
            material.color = lerp_v4(a, b, t);
        }
    }
}

/// A tween that was advanced during the write stage.
struct Stepped {
    id: TweenId,
    eased: f32,
    done: bool,
}

/// Write stage: advance the tick counter and apply channel values.
fn write_pass(scheduler: &mut TweenScheduler, world: &mut World) -> SmallVec<[Stepped; 16]> {
    let now = scheduler.begin_tick();
    let mut stepped = SmallVec::new();
    for tween in scheduler.tweens_mut() {
        if !tween.active && now >= tween.start_tick {
            tween.active = true;
        }
        if !tween.active || tween.completed {
            continue;
        }
        let progress = tween.progress_at(now);
        let eased = ease(tween.easing, progress);
        if let Some(target) = tween.target {
            apply_channels(world, target, &tween.from, &tween.to, eased);
        }
        let done = progress >= 1.0;
        if done {
            tween.completed = true;
        }
        stepped.push(Stepped {
            id: tween.id,
            eased,
            done,
        });
    }
    stepped
}

/// Advance the [`TweenScheduler`] by one tick.
pub fn update_tweens(world: &mut World) {
    if !world.contains_resource::<TweenScheduler>() {
        return;
    }
    let stepped = world.resource_scope(|world, mut scheduler: Mut<TweenScheduler>| {
        write_pass(&mut scheduler, world)
    });

    for step in stepped {
        let callback = world
            .resource_mut::<TweenScheduler>()
            .take_step_callback(step.id);
        if let Some(mut callback) = callback {
            callback(world, step.eased);
            world
                .resource_mut::<TweenScheduler>()
                .restore_step_callback(step.id, callback);
        }

        if step.done {
            // Absent if an earlier callback in this pass cancelled it.
            let finished = world.resource_mut::<TweenScheduler>().finish(step.id);
            if let Some(on_complete) = finished.and_then(|t| t.on_complete) {
                on_complete(world);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::tween::TweenConfig;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    const ALL_EASINGS: [Easing; 6] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::QuadInOut,
        Easing::BounceOut,
        Easing::ElasticOut,
    ];

    #[derive(Resource, Default)]
    struct Fired(u32);

    #[derive(Resource, Default)]
    struct Seen(Vec<f32>);

    fn make_world() -> World {
        let mut world = World::new();
        world.init_resource::<TweenScheduler>();
        world.init_resource::<Fired>();
        world.init_resource::<Seen>();
        world
    }

    fn spawn_node(world: &mut World) -> Entity {
        world
            .spawn((
                Position(Vec3::ZERO),
                Rotation::default(),
                Scale::default(),
                Material::default(),
            ))
            .id()
    }

    fn create(world: &mut World, config: TweenConfig) -> TweenId {
        world.resource_mut::<TweenScheduler>().create(config)
    }

    // ==================== EASING FUNCTION TESTS ====================

    #[test]
    fn test_ease_all_types_at_zero() {
        for easing in ALL_EASINGS {
            assert!(
                approx_eq(ease(easing, 0.0), 0.0),
                "{:?} at t=0.0 should be 0.0",
                easing
            );
        }
    }

    #[test]
    fn test_ease_all_types_exactly_one_at_end() {
        for easing in ALL_EASINGS {
            assert_eq!(ease(easing, 1.0), 1.0, "{:?} at t=1.0", easing);
            assert_eq!(ease(easing, 1.5), 1.0, "{:?} at t=1.5", easing);
        }
    }

    #[test]
    fn test_ease_clamps_negative_input() {
        for easing in ALL_EASINGS {
            assert!(approx_eq(ease(easing, -0.5), 0.0), "{:?}", easing);
        }
    }

    #[test]
    fn test_ease_quad_values() {
        assert!(approx_eq(ease(Easing::QuadIn, 0.5), 0.25));
        assert!(approx_eq(ease(Easing::QuadOut, 0.5), 0.75));
        assert!(approx_eq(ease(Easing::QuadInOut, 0.25), 0.125));
        assert!(approx_eq(ease(Easing::QuadInOut, 0.5), 0.5));
        assert!(approx_eq(ease(Easing::QuadInOut, 0.75), 0.875));
    }

    #[test]
    fn test_ease_bounce_segments() {
        // first segment is a plain parabola
        assert!(approx_eq(ease(Easing::BounceOut, 0.2), 7.5625 * 0.04));
        // segment joins land on the floor of each bounce
        assert!(approx_eq(ease(Easing::BounceOut, 1.0 / 2.75), 1.0));
        let v = ease(Easing::BounceOut, 0.9);
        assert!(v > 0.95 && v <= 1.0);
    }

    #[test]
    fn test_ease_elastic_overshoots() {
        let peak = (1..100)
            .map(|i| ease(Easing::ElasticOut, i as f32 / 100.0))
            .fold(f32::MIN, f32::max);
        assert!(peak > 1.0);
        assert!((ease(Easing::ElasticOut, 0.99) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_ease_quadratic_monotonicity() {
        for easing in [
            Easing::Linear,
            Easing::QuadIn,
            Easing::QuadOut,
            Easing::QuadInOut,
        ] {
            let mut prev = ease(easing, 0.0);
            for i in 1..=100 {
                let curr = ease(easing, i as f32 / 100.0);
                assert!(curr >= prev - EPSILON, "{:?} not monotonic at {}", easing, i);
                prev = curr;
            }
        }
    }

    // ==================== INTERPOLATION FUNCTION TESTS ====================

    #[test]
    fn test_lerp_f32_basic() {
        assert!(approx_eq(lerp_f32(0.0, 10.0, 0.5), 5.0));
        assert!(approx_eq(lerp_f32(-10.0, 10.0, 0.25), -5.0));
        assert!(approx_eq(lerp_f32(0.0, 10.0, 1.5), 15.0));
    }

    #[test]
    fn test_lerp_exact_at_one() {
        let a = Vec3::new(0.1, 0.7, 0.3);
        let b = Vec3::new(1.3, -2.9, 0.0001);
        assert_eq!(lerp_v3(a, b, 1.0), b);
        assert_eq!(lerp_f32(0.1, 0.3, 1.0), 0.3);
        assert_eq!(lerp_v4(Vec4::ZERO, Vec4::splat(0.7), 1.0), Vec4::splat(0.7));
    }

    #[test]
    fn test_lerp_v3_component_independence() {
        let r = lerp_v3(Vec3::new(0.0, 100.0, 4.0), Vec3::new(100.0, 0.0, 4.0), 0.25);
        assert!(approx_eq(r.x, 25.0));
        assert!(approx_eq(r.y, 75.0));
        assert!(approx_eq(r.z, 4.0));
    }

    // ==================== SCHEDULER TICK TESTS ====================

    #[test]
    fn progress_is_monotonic_and_hits_one_at_duration() {
        let mut world = make_world();
        let node = spawn_node(&mut world);
        let id = create(
            &mut world,
            TweenConfig::new(node, 5)
                .from(PropertySet::new().position(Vec3::ZERO))
                .to(PropertySet::new().position(Vec3::new(10.0, 0.0, 0.0)))
                .on_step(|world, eased| world.resource_mut::<Seen>().0.push(eased)),
        );

        let mut last = 0.0;
        for tick in 1..=4 {
            update_tweens(&mut world);
            let p = world.resource::<TweenScheduler>().progress(id).unwrap();
            assert!(p >= last);
            assert!(p < 1.0, "tick {} reached 1 early", tick);
            last = p;
        }
        update_tweens(&mut world);
        assert!(!world.resource::<TweenScheduler>().contains(id));
        let seen = &world.resource::<Seen>().0;
        assert_eq!(seen.len(), 5);
        assert_eq!(*seen.last().unwrap(), 1.0);
        assert!(seen.iter().all(|p| *p <= 1.0));
        assert_eq!(
            world.get::<Position>(node).unwrap().0,
            Vec3::new(10.0, 0.0, 0.0)
        );
    }

    #[test]
    fn delayed_tween_waits_for_start_tick() {
        let mut world = make_world();
        let node = spawn_node(&mut world);
        create(
            &mut world,
            TweenConfig::new(node, 2)
                .with_delay(3)
                .from(PropertySet::new().opacity(1.0))
                .to(PropertySet::new().opacity(0.0)),
        );
        update_tweens(&mut world);
        update_tweens(&mut world);
        assert_eq!(world.get::<Material>(node).unwrap().opacity, 1.0);
        update_tweens(&mut world); // tick 3: active, elapsed 0
        assert_eq!(world.get::<Material>(node).unwrap().opacity, 1.0);
        update_tweens(&mut world);
        assert!(approx_eq(world.get::<Material>(node).unwrap().opacity, 0.5));
        update_tweens(&mut world);
        assert_eq!(world.get::<Material>(node).unwrap().opacity, 0.0);
        assert!(world.resource::<TweenScheduler>().is_empty());
    }

    #[test]
    fn completion_fires_exactly_once() {
        let mut world = make_world();
        create(
            &mut world,
            TweenConfig::detached(2).on_complete(|world| world.resource_mut::<Fired>().0 += 1),
        );
        for _ in 0..6 {
            update_tweens(&mut world);
        }
        assert_eq!(world.resource::<Fired>().0, 1);
    }

    #[test]
    fn cancel_before_completion_never_fires() {
        let mut world = make_world();
        let id = create(
            &mut world,
            TweenConfig::detached(3).on_complete(|world| world.resource_mut::<Fired>().0 += 1),
        );
        update_tweens(&mut world);
        assert!(world.resource_mut::<TweenScheduler>().cancel(id));
        for _ in 0..5 {
            update_tweens(&mut world);
        }
        assert_eq!(world.resource::<Fired>().0, 0);
    }

    #[test]
    fn cancel_after_completion_returns_false() {
        let mut world = make_world();
        let id = create(&mut world, TweenConfig::detached(1));
        update_tweens(&mut world);
        assert!(!world.resource_mut::<TweenScheduler>().cancel(id));
    }

    #[test]
    fn zero_channel_tween_still_completes() {
        let mut world = make_world();
        let node = spawn_node(&mut world);
        create(
            &mut world,
            TweenConfig::new(node, 2).on_complete(|world| world.resource_mut::<Fired>().0 += 1),
        );
        update_tweens(&mut world);
        update_tweens(&mut world);
        assert_eq!(world.resource::<Fired>().0, 1);
        assert_eq!(world.get::<Position>(node).unwrap().0, Vec3::ZERO);
    }

    #[test]
    fn tween_spawned_from_completion_starts_next_tick() {
        let mut world = make_world();
        let node = spawn_node(&mut world);
        create(
            &mut world,
            TweenConfig::detached(1).on_complete(move |world| {
                world.resource_mut::<TweenScheduler>().create(
                    TweenConfig::new(node, 2)
                        .from(PropertySet::new().scale(Vec3::ONE))
                        .to(PropertySet::new().scale(Vec3::splat(3.0))),
                );
            }),
        );
        update_tweens(&mut world);
        // spawned this tick but not advanced yet
        let scheduler = world.resource::<TweenScheduler>();
        assert_eq!(scheduler.len(), 1);
        assert!(!scheduler.iter().next().unwrap().is_active());
        assert_eq!(world.get::<Scale>(node).unwrap().0, Vec3::ONE);

        update_tweens(&mut world);
        assert!(approx_eq(world.get::<Scale>(node).unwrap().0.x, 2.0));
    }

    #[test]
    fn later_tween_wins_on_shared_channel() {
        let mut world = make_world();
        let node = spawn_node(&mut world);
        create(
            &mut world,
            TweenConfig::new(node, 2)
                .from(PropertySet::new().position(Vec3::ZERO))
                .to(PropertySet::new().position(Vec3::X)),
        );
        create(
            &mut world,
            TweenConfig::new(node, 2)
                .from(PropertySet::new().position(Vec3::ZERO))
                .to(PropertySet::new().position(Vec3::Y)),
        );
        update_tweens(&mut world);
        assert_eq!(world.get::<Position>(node).unwrap().0, Vec3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn despawned_target_is_tolerated() {
        let mut world = make_world();
        let node = spawn_node(&mut world);
        create(
            &mut world,
            TweenConfig::new(node, 2)
                .from(PropertySet::new().position(Vec3::ZERO))
                .to(PropertySet::new().position(Vec3::ONE))
                .on_complete(|world| world.resource_mut::<Fired>().0 += 1),
        );
        world.despawn(node);
        update_tweens(&mut world);
        update_tweens(&mut world);
        assert_eq!(world.resource::<Fired>().0, 1);
    }

    #[test]
    fn color_channel_interpolates_component_wise() {
        let mut world = make_world();
        let node = spawn_node(&mut world);
        create(
            &mut world,
            TweenConfig::new(node, 4)
                .from(PropertySet::new().color(Vec4::new(0.0, 0.0, 0.0, 1.0)))
                .to(PropertySet::new().color(Vec4::new(1.0, 0.5, 0.0, 1.0))),
        );
        update_tweens(&mut world);
        update_tweens(&mut world);
        let c = world.get::<Material>(node).unwrap().color;
        assert!(approx_eq(c.x, 0.5));
        assert!(approx_eq(c.y, 0.25));
        assert!(approx_eq(c.w, 1.0));
    }

    #[derive(Resource)]
    struct Victim(TweenId);

    #[test]
    fn callback_cancelling_sibling_suppresses_its_completion() {
        let mut world = make_world();
        create(
            &mut world,
            TweenConfig::detached(1).on_complete(|world| {
                let victim = world.resource::<Victim>().0;
                world.resource_mut::<TweenScheduler>().cancel(victim);
            }),
        );
        let victim = create(
            &mut world,
            TweenConfig::detached(1).on_complete(|world| world.resource_mut::<Fired>().0 += 1),
        );
        world.insert_resource(Victim(victim));
        update_tweens(&mut world);
        assert_eq!(world.resource::<Fired>().0, 0);
        assert!(world.resource::<TweenScheduler>().is_empty());
    }

    #[test]
    fn scheduler_missing_is_a_no_op() {
        let mut world = World::new();
        update_tweens(&mut world);
    }
}
