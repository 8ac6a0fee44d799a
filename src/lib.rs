//! Button driven light switch and dimmer
//!
//! Turns edges on one button input into duty cycles for one PWM output:
//! debouncing, press/release policies, long press dimming, perceptual
//! brightness correction and a flash backed memory of the last dim level.
#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible in the other modules
mod fmt;

pub mod classifier;
pub mod config;
pub mod controller;
pub mod curve;
pub mod debounce;
pub mod edge;
pub mod engine;
pub mod store;

pub use classifier::{ButtonEvent, ButtonEventClassifier};
pub use config::{ConfigError, DimConfig, DimMode, Direction, EventPolicy, PullMode};
pub use controller::{Controller, DutySink};
pub use curve::{curve, BrightnessCurve};
pub use debounce::DebounceFilter;
pub use edge::{Edge, EdgeSource, PinEdge};
pub use engine::{DimEngine, LightState, Transition};
pub use store::{flush_pending, persist_levels, restore_level, FlashLevelStore, LevelStore, StoreError};
