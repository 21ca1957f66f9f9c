//! tilefx library.
//!
//! Tick-driven tween scheduler and the block, cursor and stack-rise animation
//! controllers of a tile-matching puzzle game, built on `bevy_ecs`.
//!
//! - [`animworld`] – installation and the [`AnimationWorld`](animworld::AnimationWorld) entry point
//! - [`components`] – visual handles, logical tiles and the cursor
//! - [`resources`] – scheduler, controllers, coordinator and configuration
//! - [`systems`] – the per-tick animation schedule
//! - [`demo`] – scripted stand-in simulation used by the demo binary

pub mod animworld;
pub mod components;
pub mod demo;
pub mod resources;
pub mod systems;
