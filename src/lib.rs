#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod error;
mod export;
mod grain;
mod message;
mod parameters;
mod renderer;
mod sample;
mod scheduler;
mod settings;

// public, flat re-exports
pub use error::Error;

pub use export::{render_take, ExportOptions, RenderedTake};
pub use grain::GrainEvent;
pub use message::{RendererMessage, RendererMessageQueue, SchedulerMessage};
pub use parameters::{
    apply_guard_rules, cap_amplitude_variance, limit_small_grain_density, map_settings,
    raise_highpass_floor, EngineParameters, GuardRules,
};
pub use renderer::{GrainRenderer, RendererStats};
pub use sample::SourceBuffer;
pub use scheduler::{GrainScheduler, SchedulerConfig, SchedulerState, SchedulerThread};
pub use settings::{EngineMode, EngineSettings, SettingsRanges};

pub use utils::{
    time::SampleTime,
    window::{GrainWindow, GrainWindowMode},
};

// public mods
pub mod utils;
