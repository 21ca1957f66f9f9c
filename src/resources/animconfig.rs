//! Animation configuration resource.
//!
//! Timing and geometry knobs loaded from an INI file. Every value has a safe
//! default so the animation layer runs without a file present.
//!
//! # Configuration File Format
//!
//! ```ini
//! [board]
//! tile_size = 1.0
//! origin_x = 0.0
//! origin_y = 0.0
//! origin_z = 0.0
//!
//! [block]
//! fall_ticks = 15
//! swap_ticks = 3
//! float_cycle_ticks = 20
//! float_amplitude = 0.05
//! explosion_safety_ticks = 20
//!
//! [cursor]
//! move_ticks = 4
//! pulse_ticks = 30
//! pulse_min = 0.55
//! pulse_max = 1.0
//! panic_pulse_ticks = 10
//! panic_pulse_min = 0.2
//! feedback_ticks = 3
//! feedback_scale = 1.15
//!
//! [stack]
//! rise_steps = 32
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use glam::Vec3;
use log::info;
use std::path::PathBuf;

use crate::resources::boardlayout::BoardLayout;

/// Default safe values for startup
const DEFAULT_TILE_SIZE: f32 = 1.0;
const DEFAULT_FALL_TICKS: u64 = 15;
const DEFAULT_SWAP_TICKS: u64 = 3;
const DEFAULT_FLOAT_CYCLE_TICKS: u64 = 20;
const DEFAULT_FLOAT_AMPLITUDE: f32 = 0.05;
const DEFAULT_EXPLOSION_SAFETY_TICKS: u32 = 20;
const DEFAULT_CURSOR_MOVE_TICKS: u64 = 4;
const DEFAULT_PULSE_TICKS: u64 = 30;
const DEFAULT_PULSE_MIN: f32 = 0.55;
const DEFAULT_PULSE_MAX: f32 = 1.0;
const DEFAULT_PANIC_PULSE_TICKS: u64 = 10;
const DEFAULT_PANIC_PULSE_MIN: f32 = 0.2;
const DEFAULT_FEEDBACK_TICKS: u64 = 3;
const DEFAULT_FEEDBACK_SCALE: f32 = 1.15;
const DEFAULT_RISE_STEPS: u32 = 32;
const DEFAULT_CONFIG_PATH: &str = "./animation.ini";

/// Block controller timings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockTiming {
    pub fall_ticks: u64,
    pub swap_ticks: u64,
    pub float_cycle_ticks: u64,
    pub float_amplitude: f32,
    /// Ticks before the end of an explosion at which the cohort rotation starts.
    pub explosion_safety_ticks: u32,
}

impl Default for BlockTiming {
    fn default() -> Self {
        Self {
            fall_ticks: DEFAULT_FALL_TICKS,
            swap_ticks: DEFAULT_SWAP_TICKS,
            float_cycle_ticks: DEFAULT_FLOAT_CYCLE_TICKS,
            float_amplitude: DEFAULT_FLOAT_AMPLITUDE,
            explosion_safety_ticks: DEFAULT_EXPLOSION_SAFETY_TICKS,
        }
    }
}

/// Cursor controller timings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorTiming {
    pub move_ticks: u64,
    pub pulse_ticks: u64,
    pub pulse_min: f32,
    pub pulse_max: f32,
    pub panic_pulse_ticks: u64,
    pub panic_pulse_min: f32,
    pub feedback_ticks: u64,
    pub feedback_scale: f32,
}

impl Default for CursorTiming {
    fn default() -> Self {
        Self {
            move_ticks: DEFAULT_CURSOR_MOVE_TICKS,
            pulse_ticks: DEFAULT_PULSE_TICKS,
            pulse_min: DEFAULT_PULSE_MIN,
            pulse_max: DEFAULT_PULSE_MAX,
            panic_pulse_ticks: DEFAULT_PANIC_PULSE_TICKS,
            panic_pulse_min: DEFAULT_PANIC_PULSE_MIN,
            feedback_ticks: DEFAULT_FEEDBACK_TICKS,
            feedback_scale: DEFAULT_FEEDBACK_SCALE,
        }
    }
}

/// Animation configuration resource.
///
/// Read once by [`install_animations`](crate::animworld::install_animations)
/// to build the controllers; later edits only affect controllers built after.
#[derive(Resource, Debug, Clone)]
pub struct AnimationConfig {
    pub layout: BoardLayout,
    pub block: BlockTiming,
    pub cursor: CursorTiming,
    /// Ticks a full one-row stack rise takes.
    pub rise_steps: u32,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            layout: BoardLayout::new(Vec3::ZERO, DEFAULT_TILE_SIZE),
            block: BlockTiming::default(),
            cursor: CursorTiming::default(),
            rise_steps: DEFAULT_RISE_STEPS,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;
        self.apply(&config);
        Ok(())
    }

    /// Load configuration from INI text.
    pub fn load_from_str(&mut self, text: &str) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .read(text.to_string())
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        self.apply(&config);
        Ok(())
    }

    fn apply(&mut self, config: &Ini) {
        let float = |section: &str, key: &str| config.getfloat(section, key).ok().flatten();
        let uint = |section: &str, key: &str| config.getuint(section, key).ok().flatten();

        // [board] section
        if let Some(size) = float("board", "tile_size") {
            self.layout.tile_size = size as f32;
        }
        if let Some(x) = float("board", "origin_x") {
            self.layout.origin.x = x as f32;
        }
        if let Some(y) = float("board", "origin_y") {
            self.layout.origin.y = y as f32;
        }
        if let Some(z) = float("board", "origin_z") {
            self.layout.origin.z = z as f32;
        }

        // [block] section
        if let Some(ticks) = uint("block", "fall_ticks") {
            self.block.fall_ticks = ticks;
        }
        if let Some(ticks) = uint("block", "swap_ticks") {
            self.block.swap_ticks = ticks;
        }
        if let Some(ticks) = uint("block", "float_cycle_ticks") {
            self.block.float_cycle_ticks = ticks;
        }
        if let Some(amplitude) = float("block", "float_amplitude") {
            self.block.float_amplitude = amplitude as f32;
        }
        if let Some(ticks) = uint("block", "explosion_safety_ticks") {
            self.block.explosion_safety_ticks = ticks as u32;
        }

        // [cursor] section
        if let Some(ticks) = uint("cursor", "move_ticks") {
            self.cursor.move_ticks = ticks;
        }
        if let Some(ticks) = uint("cursor", "pulse_ticks") {
            self.cursor.pulse_ticks = ticks;
        }
        if let Some(v) = float("cursor", "pulse_min") {
            self.cursor.pulse_min = v as f32;
        }
        if let Some(v) = float("cursor", "pulse_max") {
            self.cursor.pulse_max = v as f32;
        }
        if let Some(ticks) = uint("cursor", "panic_pulse_ticks") {
            self.cursor.panic_pulse_ticks = ticks;
        }
        if let Some(v) = float("cursor", "panic_pulse_min") {
            self.cursor.panic_pulse_min = v as f32;
        }
        if let Some(ticks) = uint("cursor", "feedback_ticks") {
            self.cursor.feedback_ticks = ticks;
        }
        if let Some(v) = float("cursor", "feedback_scale") {
            self.cursor.feedback_scale = v as f32;
        }

        // [stack] section
        if let Some(steps) = uint("stack", "rise_steps") {
            self.rise_steps = steps as u32;
        }

        info!(
            "Loaded animation config: tile={} fall={} swap={} float={} safety={} rise={}",
            self.layout.tile_size,
            self.block.fall_ticks,
            self.block.swap_ticks,
            self.block.float_cycle_ticks,
            self.block.explosion_safety_ticks,
            self.rise_steps
        );
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        // [board] section
        config.set("board", "tile_size", Some(self.layout.tile_size.to_string()));
        config.set("board", "origin_x", Some(self.layout.origin.x.to_string()));
        config.set("board", "origin_y", Some(self.layout.origin.y.to_string()));
        config.set("board", "origin_z", Some(self.layout.origin.z.to_string()));

        // [block] section
        config.set("block", "fall_ticks", Some(self.block.fall_ticks.to_string()));
        config.set("block", "swap_ticks", Some(self.block.swap_ticks.to_string()));
        config.set(
            "block",
            "float_cycle_ticks",
            Some(self.block.float_cycle_ticks.to_string()),
        );
        config.set(
            "block",
            "float_amplitude",
            Some(self.block.float_amplitude.to_string()),
        );
        config.set(
            "block",
            "explosion_safety_ticks",
            Some(self.block.explosion_safety_ticks.to_string()),
        );

        // [cursor] section
        config.set("cursor", "move_ticks", Some(self.cursor.move_ticks.to_string()));
        config.set("cursor", "pulse_ticks", Some(self.cursor.pulse_ticks.to_string()));
        config.set("cursor", "pulse_min", Some(self.cursor.pulse_min.to_string()));
        config.set("cursor", "pulse_max", Some(self.cursor.pulse_max.to_string()));
        config.set(
            "cursor",
            "panic_pulse_ticks",
            Some(self.cursor.panic_pulse_ticks.to_string()),
        );
        config.set(
            "cursor",
            "panic_pulse_min",
            Some(self.cursor.panic_pulse_min.to_string()),
        );
        config.set(
            "cursor",
            "feedback_ticks",
            Some(self.cursor.feedback_ticks.to_string()),
        );
        config.set(
            "cursor",
            "feedback_scale",
            Some(self.cursor.feedback_scale.to_string()),
        );

        // [stack] section
        config.set("stack", "rise_steps", Some(self.rise_steps.to_string()));

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved animation config to {:?}", self.config_path);

        Ok(())
    }
}
