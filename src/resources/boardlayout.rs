use bevy_ecs::prelude::Resource;
use glam::Vec3;

/// Board-to-world mapping.
///
/// Row 0 is the bottom row; rows grow upwards along +Y, columns along +X.
/// Mirrors the renderer's own mapping so controllers can derive tween
/// endpoints from board coordinates.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct BoardLayout {
    /// World position of the centre of cell (0, 0).
    pub origin: Vec3,
    /// Edge length of one cell in world units.
    pub tile_size: f32,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 1.0)
    }
}

impl BoardLayout {
    pub fn new(origin: Vec3, tile_size: f32) -> Self {
        Self { origin, tile_size }
    }

    /// Centre of the cell at (`row`, `col`).
    pub fn cell_to_world(&self, row: i32, col: i32) -> Vec3 {
        self.origin + Vec3::new(col as f32 * self.tile_size, row as f32 * self.tile_size, 0.0)
    }
}
