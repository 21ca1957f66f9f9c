//! Tick-indexed tween scheduler.
//!
//! [`TweenScheduler`] owns every active [`Tween`]. A tween interpolates one or
//! more property channels ([`PropertySet`]) on a target entity over a fixed
//! number of ticks. The scheduler is advanced exactly once per simulation
//! tick by [`update_tweens`](crate::systems::tween::update_tweens).
//!
//! # Lifecycle
//!
//! 1. [`TweenScheduler::create`] registers the tween with
//!    `start_tick = current_tick + delay`
//! 2. on the first tick where `current_tick >= start_tick` it becomes active
//! 3. every tick after that it writes `from + (to - from) * eased` onto the target
//! 4. on the tick where `elapsed == duration` it completes, is removed, and its
//!    completion callback fires exactly once
//!
//! Cancelling ([`cancel`](TweenScheduler::cancel),
//! [`cancel_all_for_target`](TweenScheduler::cancel_all_for_target),
//! [`clear_all`](TweenScheduler::clear_all)) never fires completion.
//!
//! The scheduler does not arbitrate between two tweens writing the same
//! channel of the same target: the one created last is applied last. Callers
//! cancel the previous owner of a target before starting a replacement.

use bevy_ecs::prelude::*;
use glam::{Vec3, Vec4};
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One discrete simulation step.
pub type Tick = u64;

/// Per-step callback, receives the eased progress of the tween.
pub type StepCallback = Box<dyn FnMut(&mut World, f32) + Send + Sync>;

/// One-shot callback, used for completion.
pub type Callback = Box<dyn FnOnce(&mut World) + Send + Sync>;

/// Handle to a scheduled tween. Only good for cancellation and queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TweenId(u64);

impl TweenId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Easing functions for non-uniform motion.
///
/// Evaluated by [`ease`](crate::systems::tween::ease) on a progress value
/// clamped to `[0.0, 1.0]`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Easing {
    /// Constant speed (no easing).
    #[default]
    Linear,
    /// Starts slow, accelerates (quadratic).
    QuadIn,
    /// Starts fast, decelerates (quadratic).
    QuadOut,
    /// Slow start and end (quadratic).
    QuadInOut,
    /// Four-segment piecewise quadratic bounce settling at 1.
    BounceOut,
    /// Exponentially decaying sine overshooting around 1.
    ElasticOut,
}

/// Snapshot of the property channels a tween reads or writes.
///
/// Only channels present in both `from` and `to` are interpolated.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PropertySet {
    pub position: Option<Vec3>,
    pub scale: Option<Vec3>,
    pub rotation: Option<Vec3>,
    pub opacity: Option<f32>,
    pub color: Option<Vec4>,
    /// Abstract progress channel; never written to a component.
    pub value: Option<f32>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn position(mut self, position: Vec3) -> Self {
        self.position = Some(position);
        self
    }
    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }
    pub fn rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = Some(rotation);
        self
    }
    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }
    pub fn color(mut self, color: Vec4) -> Self {
        self.color = Some(color);
        self
    }
    pub fn value(mut self, value: f32) -> Self {
        self.value = Some(value);
        self
    }

    /// Channels present in both sets.
    pub fn shared_with(&self, other: &PropertySet) -> PropertySet {
        PropertySet {
            position: self.position.and(other.position),
            scale: self.scale.and(other.scale),
            rotation: self.rotation.and(other.rotation),
            opacity: self.opacity.and(other.opacity),
            color: self.color.and(other.color),
            value: self.value.and(other.value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.scale.is_none()
            && self.rotation.is_none()
            && self.opacity.is_none()
            && self.color.is_none()
            && self.value.is_none()
    }
}

/// Everything needed to create a tween.
pub struct TweenConfig {
    pub target: Option<Entity>,
    pub duration: Tick,
    pub delay: Tick,
    pub from: PropertySet,
    pub to: PropertySet,
    pub easing: Easing,
    pub on_step: Option<StepCallback>,
    pub on_complete: Option<Callback>,
}

impl TweenConfig {
    /// Tween writing onto `target` over `duration` ticks.
    pub fn new(target: Entity, duration: Tick) -> Self {
        Self {
            target: Some(target),
            ..Self::detached(duration)
        }
    }

    /// Tween with no target, for driving progress through `on_step`.
    pub fn detached(duration: Tick) -> Self {
        Self {
            target: None,
            duration,
            delay: 0,
            from: PropertySet::default(),
            to: PropertySet::default(),
            easing: Easing::Linear,
            on_step: None,
            on_complete: None,
        }
    }

    pub fn from(mut self, from: PropertySet) -> Self {
        self.from = from;
        self
    }
    pub fn to(mut self, to: PropertySet) -> Self {
        self.to = to;
        self
    }
    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }
    pub fn with_delay(mut self, delay: Tick) -> Self {
        self.delay = delay;
        self
    }
    pub fn on_step(mut self, f: impl FnMut(&mut World, f32) + Send + Sync + 'static) -> Self {
        self.on_step = Some(Box::new(f));
        self
    }
    pub fn on_complete(mut self, f: impl FnOnce(&mut World) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
    /// Attach an already boxed completion callback, if any.
    pub fn on_complete_boxed(mut self, f: Option<Callback>) -> Self {
        self.on_complete = f;
        self
    }
}

/// A scheduled interpolation.
pub struct Tween {
    pub(crate) id: TweenId,
    pub(crate) target: Option<Entity>,
    pub(crate) start_tick: Tick,
    pub(crate) duration: Tick,
    pub(crate) from: PropertySet,
    pub(crate) to: PropertySet,
    pub(crate) easing: Easing,
    pub(crate) on_step: Option<StepCallback>,
    pub(crate) on_complete: Option<Callback>,
    pub(crate) active: bool,
    pub(crate) completed: bool,
}

impl Tween {
    pub fn id(&self) -> TweenId {
        self.id
    }
    pub fn target(&self) -> Option<Entity> {
        self.target
    }
    pub fn start_tick(&self) -> Tick {
        self.start_tick
    }
    pub fn duration(&self) -> Tick {
        self.duration
    }
    pub fn easing(&self) -> Easing {
        self.easing
    }
    pub fn from_values(&self) -> &PropertySet {
        &self.from
    }
    pub fn to_values(&self) -> &PropertySet {
        &self.to
    }
    /// Channels this tween actually writes.
    pub fn channels(&self) -> PropertySet {
        self.from.shared_with(&self.to)
    }
    pub fn is_active(&self) -> bool {
        self.active
    }
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Linear progress at tick `now`, clamped to `[0, 1]`.
    pub fn progress_at(&self, now: Tick) -> f32 {
        if !self.active {
            return 0.0;
        }
        let elapsed = now.saturating_sub(self.start_tick);
        (elapsed as f32 / self.duration as f32).clamp(0.0, 1.0)
    }
}

/// Owner of all tweens and of the scheduler's tick counter.
#[derive(Resource, Default)]
pub struct TweenScheduler {
    current_tick: Tick,
    next_id: u64,
    // Ordered by id, so iteration follows creation order.
    tweens: BTreeMap<TweenId, Tween>,
}

impl TweenScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tween and return its id.
    pub fn create(&mut self, config: TweenConfig) -> TweenId {
        let id = TweenId(self.next_id);
        self.next_id += 1;

        let duration = if config.duration == 0 {
            warn!("tween {:?} created with zero duration, using 1 tick", id);
            1
        } else {
            config.duration
        };

        let tween = Tween {
            id,
            target: config.target,
            start_tick: self.current_tick + config.delay,
            duration,
            from: config.from,
            to: config.to,
            easing: config.easing,
            on_step: config.on_step,
            on_complete: config.on_complete,
            active: false,
            completed: false,
        };
        trace!(
            "tween {:?} created: target={:?} start={} duration={}",
            id, tween.target, tween.start_tick, duration
        );
        self.tweens.insert(id, tween);
        id
    }

    /// Remove a tween whether or not it has started. Returns true if it existed.
    pub fn cancel(&mut self, id: TweenId) -> bool {
        self.tweens.remove(&id).is_some()
    }

    /// Remove every tween registered against `target`. Returns how many were removed.
    pub fn cancel_all_for_target(&mut self, target: Entity) -> usize {
        let before = self.tweens.len();
        self.tweens.retain(|_, t| t.target != Some(target));
        let removed = before - self.tweens.len();
        if removed > 0 {
            trace!("cancelled {} tween(s) for {:?}", removed, target);
        }
        removed
    }

    /// Drop every tween.
    pub fn clear_all(&mut self) {
        self.tweens.clear();
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn contains(&self, id: TweenId) -> bool {
        self.tweens.contains_key(&id)
    }

    pub fn get(&self, id: TweenId) -> Option<&Tween> {
        self.tweens.get(&id)
    }

    /// Current linear progress of a registered tween.
    pub fn progress(&self, id: TweenId) -> Option<f32> {
        self.tweens
            .get(&id)
            .map(|t| t.progress_at(self.current_tick))
    }

    /// Tweens in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Tween> {
        self.tweens.values()
    }

    /// Number of tweens registered against `target`.
    pub fn count_for_target(&self, target: Entity) -> usize {
        self.tweens
            .values()
            .filter(|t| t.target == Some(target))
            .count()
    }

    pub(crate) fn begin_tick(&mut self) -> Tick {
        self.current_tick += 1;
        self.current_tick
    }

    pub(crate) fn tweens_mut(&mut self) -> impl Iterator<Item = &mut Tween> {
        self.tweens.values_mut()
    }

    pub(crate) fn take_step_callback(&mut self, id: TweenId) -> Option<StepCallback> {
        self.tweens.get_mut(&id).and_then(|t| t.on_step.take())
    }

    pub(crate) fn restore_step_callback(&mut self, id: TweenId, callback: StepCallback) {
        if let Some(tween) = self.tweens.get_mut(&id) {
            tween.on_step = Some(callback);
        }
    }

    /// Remove a completed tween so its completion callback can be run.
    pub(crate) fn finish(&mut self, id: TweenId) -> Option<Tween> {
        match self.tweens.get(&id) {
            Some(t) if t.completed => self.tweens.remove(&id),
            _ => None,
        }
    }
}

/// Run `f` with a controller resource and the scheduler borrowed together.
///
/// Returns `None` when either resource is missing from the world.
pub fn with_scheduler<C: Resource, R>(
    world: &mut World,
    f: impl FnOnce(&mut C, &mut TweenScheduler) -> R,
) -> Option<R> {
    if !world.contains_resource::<C>() || !world.contains_resource::<TweenScheduler>() {
        return None;
    }
    Some(world.resource_scope(|world, mut controller: Mut<C>| {
        let mut scheduler = world.resource_mut::<TweenScheduler>();
        f(&mut *controller, &mut *scheduler)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(world: &mut World) -> (Entity, Entity) {
        (world.spawn_empty().id(), world.spawn_empty().id())
    }

    #[test]
    fn create_assigns_increasing_ids() {
        let mut s = TweenScheduler::new();
        let a = s.create(TweenConfig::detached(5));
        let b = s.create(TweenConfig::detached(5));
        assert!(a < b);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn zero_duration_is_clamped() {
        let mut s = TweenScheduler::new();
        let id = s.create(TweenConfig::detached(0));
        assert_eq!(s.get(id).unwrap().duration(), 1);
    }

    #[test]
    fn delay_offsets_start_tick() {
        let mut s = TweenScheduler::new();
        s.begin_tick();
        s.begin_tick();
        let id = s.create(TweenConfig::detached(4).with_delay(3));
        assert_eq!(s.get(id).unwrap().start_tick(), 5);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut s = TweenScheduler::new();
        let id = s.create(TweenConfig::detached(4));
        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert!(s.is_empty());
    }

    #[test]
    fn cancel_all_for_target_spares_other_targets() {
        let mut world = World::new();
        let (a, b) = targets(&mut world);
        let mut s = TweenScheduler::new();
        s.create(TweenConfig::new(a, 4));
        s.create(TweenConfig::new(a, 8));
        let keep = s.create(TweenConfig::new(b, 4));
        let detached = s.create(TweenConfig::detached(4));

        assert_eq!(s.cancel_all_for_target(a), 2);
        assert_eq!(s.count_for_target(a), 0);
        assert!(s.contains(keep));
        assert!(s.contains(detached));
        assert_eq!(s.cancel_all_for_target(a), 0);
    }

    #[test]
    fn clear_all_drops_everything() {
        let mut s = TweenScheduler::new();
        s.create(TweenConfig::detached(4));
        s.create(TweenConfig::detached(4));
        s.clear_all();
        assert!(s.is_empty());
    }

    #[test]
    fn inactive_tween_reports_zero_progress() {
        let mut s = TweenScheduler::new();
        let id = s.create(TweenConfig::detached(4));
        assert_eq!(s.progress(id), Some(0.0));
    }

    #[test]
    fn channels_are_the_intersection() {
        let from = PropertySet::new()
            .position(Vec3::ZERO)
            .opacity(1.0)
            .value(0.0);
        let to = PropertySet::new().position(Vec3::ONE).scale(Vec3::ONE);
        let shared = from.shared_with(&to);
        assert!(shared.position.is_some());
        assert!(shared.opacity.is_none());
        assert!(shared.scale.is_none());
        assert!(shared.value.is_none());
        assert!(!shared.is_empty());
        assert!(PropertySet::new().is_empty());
    }

    #[test]
    fn finish_only_removes_completed() {
        let mut s = TweenScheduler::new();
        let id = s.create(TweenConfig::detached(4));
        assert!(s.finish(id).is_none());
        assert!(s.contains(id));
    }
}
