//! Stack-rise controller.
//!
//! The whole stack rising by one row is a single effect. Rather than one
//! tween per tile, [`StackRise`] runs one detached tween whose step callback
//! records progress; the renderer offsets every visible handle by
//! [`offset`](StackRise::offset) each tick.

use bevy_ecs::prelude::*;
use log::{debug, info, warn};

use crate::resources::tween::{Callback, Tick, TweenConfig, TweenId, TweenScheduler};

/// Stack-rise controller resource.
#[derive(Resource, Debug)]
pub struct StackRise {
    total_steps: u32,
    rising: bool,
    progress: f32,
    offset: f32,
    tile_height: f32,
    tween: Option<TweenId>,
    rises_completed: u32,
}

impl Default for StackRise {
    fn default() -> Self {
        Self::new(32)
    }
}

impl StackRise {
    pub fn new(total_steps: u32) -> Self {
        Self {
            total_steps: total_steps.max(1),
            rising: false,
            progress: 0.0,
            offset: 0.0,
            tile_height: 0.0,
            tween: None,
            rises_completed: 0,
        }
    }

    pub fn is_rising(&self) -> bool {
        self.rising
    }

    /// Fraction of the current rise done, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// How far every row is currently lifted, in world units.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    pub fn rises_completed(&self) -> u32 {
        self.rises_completed
    }

    /// Where a handle resting at `base_y` should be drawn this tick.
    pub fn handle_y(&self, base_y: f32) -> f32 {
        base_y + self.offset
    }

    /// Begin a one-row rise of `tile_height`.
    ///
    /// Returns `false` and does nothing if a rise is already running.
    pub fn start(
        &mut self,
        scheduler: &mut TweenScheduler,
        tile_height: f32,
        on_complete: Option<Callback>,
    ) -> bool {
        if self.rising {
            warn!("stack rise requested while one is in progress, ignoring");
            return false;
        }
        self.rising = true;
        self.progress = 0.0;
        self.offset = 0.0;
        self.tile_height = tile_height;

        let id = scheduler.create(
            TweenConfig::detached(self.total_steps as Tick)
                .on_step(|world: &mut World, progress: f32| {
                    if let Some(mut rise) = world.get_resource_mut::<StackRise>() {
                        rise.progress = progress;
                        rise.offset = rise.tile_height * progress;
                    }
                })
                .on_complete(move |world: &mut World| {
                    if let Some(mut rise) = world.get_resource_mut::<StackRise>() {
                        rise.finish();
                        info!("stack rise #{} complete", rise.rises_completed);
                    }
                    if let Some(callback) = on_complete {
                        callback(world);
                    }
                }),
        );
        self.tween = Some(id);
        debug!("stack rise started over {} steps", self.total_steps);
        true
    }

    /// Abort the rise and snap to its end state. The completion callback is dropped.
    pub fn stop(&mut self, scheduler: &mut TweenScheduler) {
        let Some(id) = self.tween.take() else {
            return;
        };
        scheduler.cancel(id);
        self.finish();
    }

    /// Finish a rise whose driver tween vanished without completing.
    pub fn tick(&mut self, scheduler: &TweenScheduler) {
        if let Some(id) = self.tween {
            if !scheduler.contains(id) {
                warn!("stack rise driver {:?} disappeared, finishing rise", id);
                self.tween = None;
                self.finish();
            }
        }
    }

    fn finish(&mut self) {
        self.tween = None;
        self.rising = false;
        self.progress = 1.0;
        // rows have shifted by one, the visual lift starts over
        self.offset = 0.0;
        self.rises_completed += 1;
    }
}
