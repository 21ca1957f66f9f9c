//! Renderable handle components.
//!
//! A visual handle is a pair of entities owned by the renderer:
//! - a *node* carrying [`Position`], [`Rotation`] and [`Scale`]
//! - a *material* carrying a [`Material`] (opacity and tint)
//!
//! Tweens write into these components; the renderer reads them back after
//! the animation tick. Handles are pooled by the renderer and rebound to
//! different blocks over time, see
//! [`AnimationWorld::register_handle`](crate::animworld::AnimationWorld::register_handle).

use bevy_ecs::prelude::*;
use glam::{Vec3, Vec4};

/// World-space position of a node handle.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Position(pub Vec3);

/// Euler rotation in radians (x, y, z) of a node handle.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Rotation(pub Vec3);

/// Per-axis scale of a node handle.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Scale(pub Vec3);

impl Default for Scale {
    fn default() -> Self {
        Self(Vec3::ONE)
    }
}

/// Material-like property bag attached to the material handle.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub opacity: f32,
    /// Tint as stored by the renderer (no gamma handling here).
    pub color: Vec4,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            color: Vec4::ONE,
        }
    }
}

/// The node/material pair a logical entity is currently drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VisualHandle {
    pub node: Entity,
    pub material: Entity,
}

impl VisualHandle {
    pub fn new(node: Entity, material: Entity) -> Self {
        Self { node, material }
    }

    /// Spawn a fresh node + material pair at `position` with identity pose.
    pub fn spawn(world: &mut World, position: Vec3) -> Self {
        let node = world
            .spawn((Position(position), Rotation::default(), Scale::default()))
            .id();
        let material = world.spawn(Material::default()).id();
        Self { node, material }
    }

    /// Both targets, node first.
    pub fn targets(&self) -> [Entity; 2] {
        [self.node, self.material]
    }
}

/// Snapshot of a node's transform used to seed relative tweens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Pose {
    /// Read the current pose of `node`; missing components fall back to identity.
    pub fn read(world: &World, node: Entity) -> Self {
        let default = Self::default();
        Self {
            position: world.get::<Position>(node).map_or(default.position, |p| p.0),
            rotation: world.get::<Rotation>(node).map_or(default.rotation, |r| r.0),
            scale: world.get::<Scale>(node).map_or(default.scale, |s| s.0),
        }
    }
}
