//! Cursor systems.
//!
//! - [`cursor_dispatch_system`] starts a move tween when the logical
//!   [`Cursor`] changes cell
//! - [`cursor_follow_system`] pins the handle to the cursor's cell whenever no
//!   move is in flight, so the handle is never stale

use bevy_ecs::prelude::*;
use glam::Vec3;

use crate::components::cursor::Cursor;
use crate::components::visual::Position;
use crate::resources::boardlayout::BoardLayout;
use crate::resources::coordinator::AnimationCoordinator;
use crate::resources::cursoranimator::CursorAnimator;
use crate::resources::stackrise::StackRise;
use crate::resources::tween::TweenScheduler;

/// World position of the cursor's cell, lifted with the stack.
pub fn cursor_world_position(layout: &BoardLayout, rise: Option<&StackRise>, cursor: &Cursor) -> Vec3 {
    let lift = rise.map_or(0.0, StackRise::offset);
    layout.cell_to_world(cursor.row, cursor.col) + Vec3::Y * lift
}

/// Ease the cursor handle towards the logical cursor after it moved.
///
/// The first observed cell is not animated; the follow system places the
/// handle there directly.
pub fn cursor_dispatch_system(
    cursors: Query<&Cursor>,
    positions: Query<&Position>,
    layout: Res<BoardLayout>,
    rise: Option<Res<StackRise>>,
    mut coordinator: ResMut<AnimationCoordinator>,
    mut animator: ResMut<CursorAnimator>,
    mut scheduler: ResMut<TweenScheduler>,
) {
    let Some(cursor) = cursors.iter().next() else {
        return;
    };
    let cell = cursor.cell();
    let previous = coordinator.cursor_observed.replace(cell);
    if previous.is_none() || previous == Some(cell) {
        return;
    }
    let Some(handle) = animator.handle() else {
        return;
    };
    let Ok(from) = positions.get(handle.node).map(|p| p.0) else {
        return;
    };
    let to = cursor_world_position(&layout, rise.as_deref(), cursor);
    animator.move_to(&mut scheduler, from, to);
}

/// Snap the cursor handle onto the logical cursor while it is not moving.
pub fn cursor_follow_system(
    cursors: Query<&Cursor>,
    mut positions: Query<&mut Position>,
    layout: Res<BoardLayout>,
    rise: Option<Res<StackRise>>,
    animator: Res<CursorAnimator>,
) {
    if animator.is_moving() {
        return;
    }
    let (Some(handle), Some(cursor)) = (animator.handle(), cursors.iter().next()) else {
        return;
    };
    if let Ok(mut position) = positions.get_mut(handle.node) {
        let target = cursor_world_position(&layout, rise.as_deref(), cursor);
        if position.0 != target {
            position.0 = target;
        }
    }
}
