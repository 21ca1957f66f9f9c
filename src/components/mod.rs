//! ECS components.
//!
//! Submodules overview:
//! - [`block`] – logical tile state published by the simulation
//! - [`cursor`] – logical swap cursor position
//! - [`visual`] – renderable node/material handles that tweens write into

pub mod block;
pub mod cursor;
pub mod visual;
