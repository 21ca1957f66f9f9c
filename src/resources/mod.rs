//! ECS resources made available to systems.
//!
//! Each animation `World` owns exactly one of each. Controllers never reach
//! the scheduler through the world on their own; callers hand it over
//! explicitly (see [`tween::with_scheduler`]).
//!
//! Overview
//! - `animconfig` – timings and board geometry loaded from INI
//! - `blockanimator` – per-tile fall/swap/explosion/float controller
//! - `boardlayout` – board cell to world position mapping
//! - `coordinator` – handle registry, observed states and cohort countdown
//! - `cursoranimator` – cursor pulse, move, feedback and panic mode
//! - `stackrise` – single synchronized one-row stack rise
//! - `tween` – the tick-indexed tween scheduler
pub mod animconfig;
pub mod blockanimator;
pub mod boardlayout;
pub mod coordinator;
pub mod cursoranimator;
pub mod stackrise;
pub mod tween;
