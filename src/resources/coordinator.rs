//! Coordinator state: handle registry, observed-state cache and the cohort
//! rotation countdown.
//!
//! The systems in [`crate::systems::animation`] read and write this resource
//! once per tick; collaborators reach it through
//! [`AnimationWorld`](crate::animworld::AnimationWorld).

use bevy_ecs::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::components::block::{BlockState, ExplosionTimer};
use crate::components::visual::VisualHandle;

/// Per-entity countdown to the synchronized explosion turn.
///
/// Keyed by the logical block, never by handle, so it survives the handle
/// being swapped out mid-explosion.
#[derive(Debug, Default)]
pub struct CohortCountdown {
    pending: FxHashMap<Entity, u32>,
    started: FxHashSet<Entity>,
}

impl CohortCountdown {
    /// Seed `block` if it is neither pending nor started.
    ///
    /// The turn is due `safety_ticks` before the explosion ends. A block
    /// whose explosion is shorter than that is due immediately.
    pub fn seed(&mut self, block: Entity, timer: ExplosionTimer, safety_ticks: u32) -> bool {
        if self.pending.contains_key(&block) || self.started.contains(&block) {
            return false;
        }
        let remaining = timer
            .total
            .saturating_sub(safety_ticks)
            .saturating_sub(timer.elapsed);
        self.pending.insert(block, remaining);
        true
    }

    /// Count every pending entry down by one tick, stopping at zero.
    pub fn advance(&mut self) {
        for remaining in self.pending.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Blocks whose countdown reached zero and whose turn has not started.
    pub fn due(&self) -> Vec<Entity> {
        let mut due: Vec<Entity> = self
            .pending
            .iter()
            .filter(|(_, remaining)| **remaining == 0)
            .map(|(block, _)| *block)
            .collect();
        due.sort();
        due
    }

    pub fn mark_started(&mut self, block: Entity) {
        self.pending.remove(&block);
        self.started.insert(block);
    }

    pub fn remaining(&self, block: Entity) -> Option<u32> {
        self.pending.get(&block).copied()
    }

    pub fn is_pending(&self, block: Entity) -> bool {
        self.pending.contains_key(&block)
    }

    pub fn is_started(&self, block: Entity) -> bool {
        self.started.contains(&block)
    }

    pub fn started_len(&self) -> usize {
        self.started.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn forget(&mut self, block: Entity) {
        self.pending.remove(&block);
        self.started.remove(&block);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.started.clear();
    }
}

/// Outcome of [`AnimationCoordinator::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Binding {
    /// The block already had this handle.
    Unchanged,
    /// The block's previous handle and the handle's previous owner, if any.
    Rebound {
        previous_handle: Option<VisualHandle>,
        previous_owner: Option<Entity>,
    },
}

/// Coordinator resource.
#[derive(Resource, Debug, Default)]
pub struct AnimationCoordinator {
    handles: FxHashMap<Entity, VisualHandle>,
    owners: FxHashMap<Entity, Entity>,
    observed: FxHashMap<Entity, BlockState>,
    pub cohort: CohortCountdown,
    pub(crate) cursor_observed: Option<(i32, i32)>,
    safety_ticks: u32,
}

impl AnimationCoordinator {
    pub fn new(safety_ticks: u32) -> Self {
        Self {
            safety_ticks,
            ..Default::default()
        }
    }

    pub fn safety_ticks(&self) -> u32 {
        self.safety_ticks
    }

    pub fn handle(&self, block: Entity) -> Option<VisualHandle> {
        self.handles.get(&block).copied()
    }

    /// Block currently drawn with the node `node`.
    pub fn owner(&self, node: Entity) -> Option<Entity> {
        self.owners.get(&node).copied()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    pub fn handles(&self) -> impl Iterator<Item = (Entity, VisualHandle)> + '_ {
        self.handles.iter().map(|(b, h)| (*b, *h))
    }

    pub fn observed(&self, block: Entity) -> Option<BlockState> {
        self.observed.get(&block).copied()
    }

    pub(crate) fn set_observed(&mut self, block: Entity, state: BlockState) {
        self.observed.insert(block, state);
    }

    /// Bind `handle` to `block`.
    ///
    /// Binding a block to the handle it already has changes nothing. Any
    /// other binding clears the observed state of `block` so it is
    /// dispatched again, and reports what the caller must clean up.
    pub(crate) fn bind(&mut self, block: Entity, handle: VisualHandle) -> Binding {
        if self.handles.get(&block) == Some(&handle) {
            return Binding::Unchanged;
        }
        let previous_owner = self
            .owners
            .remove(&handle.node)
            .filter(|owner| *owner != block);
        if let Some(owner) = previous_owner {
            self.handles.remove(&owner);
            self.observed.remove(&owner);
        }
        let previous_handle = self.handles.insert(block, handle);
        if let Some(old) = previous_handle {
            self.owners.remove(&old.node);
        }
        self.owners.insert(handle.node, block);
        self.observed.remove(&block);
        Binding::Rebound {
            previous_handle,
            previous_owner,
        }
    }

    /// Unbind whatever handle `block` has.
    pub(crate) fn unbind(&mut self, block: Entity) -> Option<VisualHandle> {
        let handle = self.handles.remove(&block)?;
        self.owners.remove(&handle.node);
        self.observed.remove(&block);
        Some(handle)
    }

    /// Drop everything known about `block`.
    pub(crate) fn forget_block(&mut self, block: Entity) -> Option<VisualHandle> {
        self.cohort.forget(block);
        self.unbind(block)
    }

    /// Blocks this coordinator knows about that are not in `live`.
    pub(crate) fn stale_blocks(&self, live: &FxHashSet<Entity>) -> Vec<Entity> {
        let mut stale: Vec<Entity> = self
            .handles
            .keys()
            .chain(self.observed.keys())
            .chain(self.cohort.pending.keys())
            .chain(self.cohort.started.iter())
            .filter(|block| !live.contains(*block))
            .copied()
            .collect();
        stale.sort();
        stale.dedup();
        stale
    }

    pub(crate) fn clear(&mut self) {
        self.handles.clear();
        self.owners.clear();
        self.observed.clear();
        self.cohort.clear();
        self.cursor_observed = None;
    }
}
