//! Animation systems.
//!
//! Submodules overview
//! - [`animation`] – the chained per-tick schedule, cohort countdown and block dispatch
//! - [`cursor`] – cursor move dispatch and handle follow
//! - [`tween`] – easing curves and scheduler advancement

pub mod animation;
pub mod cursor;
pub mod tween;
