//! Cursor animation controller.
//!
//! There is one cursor, so [`CursorAnimator`] keeps plain fields instead of a
//! per-entity map. It drives four effects on the attached [`VisualHandle`]:
//!
//! - an endless opacity pulse on the material (ping-pong between two bounds)
//! - a panic variant of that pulse, faster and deeper
//! - a short ease-out move between two cells, cancelling any move in flight
//! - a one-shot scale "feedback" bump used when the player swaps
//!
//! While no move is in flight the handle position belongs to
//! [`cursor_follow_system`](crate::systems::cursor::cursor_follow_system).

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::{debug, info};
use smallvec::SmallVec;

use crate::components::visual::VisualHandle;
use crate::resources::animconfig::CursorTiming;
use crate::resources::tween::{
    Easing, PropertySet, Tick, TweenConfig, TweenId, TweenScheduler, with_scheduler,
};

#[derive(Clone, Copy)]
struct PulseLoop {
    material: Entity,
    low: f32,
    high: f32,
    cycle: Tick,
    epoch: u32,
}

/// Cursor animation controller resource.
#[derive(Resource, Default)]
pub struct CursorAnimator {
    handle: Option<VisualHandle>,
    timing: CursorTiming,
    pulsing: bool,
    panic: bool,
    pulse_epoch: u32,
    pulse_tween: Option<TweenId>,
    pulse_generations: u32,
    move_tween: Option<TweenId>,
    move_epoch: u32,
    feedback: SmallVec<[TweenId; 2]>,
}

impl CursorAnimator {
    pub fn new(timing: CursorTiming) -> Self {
        Self {
            timing,
            ..Default::default()
        }
    }

    pub fn handle(&self) -> Option<VisualHandle> {
        self.handle
    }

    pub fn is_moving(&self) -> bool {
        self.move_tween.is_some()
    }

    pub fn is_pulsing(&self) -> bool {
        self.pulsing
    }

    pub fn is_panicking(&self) -> bool {
        self.panic
    }

    /// Pulse half-cycles scheduled since the current pulse started.
    pub fn pulse_generations(&self) -> u32 {
        self.pulse_generations
    }

    /// Bind the cursor to `handle` and start pulsing it.
    ///
    /// Every tween on the previous and the new handle is cancelled first.
    pub fn attach(&mut self, scheduler: &mut TweenScheduler, handle: VisualHandle) {
        if let Some(previous) = self.handle.take() {
            for target in previous.targets() {
                scheduler.cancel_all_for_target(target);
            }
        }
        for target in handle.targets() {
            scheduler.cancel_all_for_target(target);
        }
        self.move_tween = None;
        self.feedback.clear();
        self.pulse_tween = None;
        self.pulsing = false;
        self.handle = Some(handle);
        debug!("cursor attached to {:?}", handle.node);
        self.start_pulse(scheduler);
    }

    /// Cancel everything on the handle and release it.
    pub fn detach(&mut self, scheduler: &mut TweenScheduler) -> Option<VisualHandle> {
        let handle = self.handle.take()?;
        for target in handle.targets() {
            scheduler.cancel_all_for_target(target);
        }
        self.move_tween = None;
        self.feedback.clear();
        self.pulse_tween = None;
        self.pulsing = false;
        Some(handle)
    }

    /// Start the pulse for the current mode. No-op if already pulsing or detached.
    pub fn start_pulse(&mut self, scheduler: &mut TweenScheduler) {
        if self.pulsing {
            return;
        }
        let Some(handle) = self.handle else {
            return;
        };
        let (low, cycle) = if self.panic {
            (self.timing.panic_pulse_min, self.timing.panic_pulse_ticks)
        } else {
            (self.timing.pulse_min, self.timing.pulse_ticks)
        };
        self.pulse_epoch = self.pulse_epoch.wrapping_add(1);
        let pulse = PulseLoop {
            material: handle.material,
            low,
            high: self.timing.pulse_max,
            cycle,
            epoch: self.pulse_epoch,
        };
        self.pulsing = true;
        self.pulse_generations = 1;
        self.pulse_tween = Some(pulse_tween(scheduler, pulse, false));
    }

    /// Stop the pulse; the material keeps whatever opacity it reached.
    pub fn stop_pulse(&mut self, scheduler: &mut TweenScheduler) {
        self.pulsing = false;
        if let Some(id) = self.pulse_tween.take() {
            scheduler.cancel(id);
        }
    }

    /// Switch between the normal and the panic pulse.
    pub fn set_panic_mode(&mut self, scheduler: &mut TweenScheduler, panic: bool) {
        if self.panic == panic {
            return;
        }
        info!("cursor panic mode {}", if panic { "on" } else { "off" });
        self.stop_pulse(scheduler);
        self.panic = panic;
        self.start_pulse(scheduler);
    }

    pub fn stop_panic_mode(&mut self, scheduler: &mut TweenScheduler) {
        self.set_panic_mode(scheduler, false);
    }

    /// Ease the handle from `from` to `to`, replacing any move in flight.
    pub fn move_to(&mut self, scheduler: &mut TweenScheduler, from: Vec3, to: Vec3) -> Option<TweenId> {
        let handle = self.handle?;
        if let Some(previous) = self.move_tween.take() {
            scheduler.cancel(previous);
        }
        self.move_epoch = self.move_epoch.wrapping_add(1);
        let epoch = self.move_epoch;
        let id = scheduler.create(
            TweenConfig::new(handle.node, self.timing.move_ticks)
                .from(PropertySet::new().position(from))
                .to(PropertySet::new().position(to))
                .with_easing(Easing::QuadOut)
                .on_complete(move |world: &mut World| {
                    if let Some(mut cursor) = world.get_resource_mut::<CursorAnimator>() {
                        if cursor.move_epoch == epoch {
                            cursor.move_tween = None;
                        }
                    }
                }),
        );
        self.move_tween = Some(id);
        Some(id)
    }

    /// Bump the handle's scale from `base_scale` up and back down.
    pub fn trigger_feedback(&mut self, scheduler: &mut TweenScheduler, base_scale: Vec3) {
        let Some(handle) = self.handle else {
            return;
        };
        for id in self.feedback.drain(..) {
            scheduler.cancel(id);
        }
        let ticks = self.timing.feedback_ticks;
        let peak = base_scale * self.timing.feedback_scale;
        let up = scheduler.create(
            TweenConfig::new(handle.node, ticks)
                .from(PropertySet::new().scale(base_scale))
                .to(PropertySet::new().scale(peak))
                .with_easing(Easing::QuadOut),
        );
        let down = scheduler.create(
            TweenConfig::new(handle.node, ticks)
                .with_delay(ticks)
                .from(PropertySet::new().scale(peak))
                .to(PropertySet::new().scale(base_scale))
                .with_easing(Easing::QuadIn),
        );
        self.feedback.extend([up, down]);
    }

    /// Drop ids of tweens the scheduler no longer holds.
    pub fn tick(&mut self, scheduler: &TweenScheduler) {
        self.feedback.retain(|id| scheduler.contains(*id));
        if self.move_tween.is_some_and(|id| !scheduler.contains(id)) {
            self.move_tween = None;
        }
    }
}

fn pulse_tween(scheduler: &mut TweenScheduler, pulse: PulseLoop, rising: bool) -> TweenId {
    let (from, to) = if rising {
        (pulse.low, pulse.high)
    } else {
        (pulse.high, pulse.low)
    };
    scheduler.create(
        TweenConfig::new(pulse.material, pulse.cycle)
            .from(PropertySet::new().opacity(from))
            .to(PropertySet::new().opacity(to))
            .with_easing(Easing::QuadInOut)
            .on_complete(move |world: &mut World| continue_pulse(world, pulse, !rising)),
    )
}

fn continue_pulse(world: &mut World, pulse: PulseLoop, rising: bool) {
    with_scheduler(world, |cursor: &mut CursorAnimator, scheduler| {
        if !cursor.pulsing || cursor.pulse_epoch != pulse.epoch {
            return;
        }
        cursor.pulse_tween = Some(pulse_tween(scheduler, pulse, rising));
        cursor.pulse_generations += 1;
    });
}
