//! Dimming state machine
//!
//! Owns the light state and decides, for every classified button event, the
//! next state and the duty cycle to drive. The engine performs no I/O: level
//! changes that must survive a restart are handed back to the caller in the
//! [`Transition`].

use crate::{
    classifier::ButtonEvent,
    config::{ConfigError, DimConfig, DimMode, Direction},
    curve::BrightnessCurve,
};

/// Current light output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LightState {
    pub is_on: bool,
    /// Dim level between 0 and `level_count`. Dim mode 2 keeps the last
    /// level while off.
    pub level_index: u8,
}

impl LightState {
    pub const OFF: Self = Self {
        is_on: false,
        level_index: 0,
    };
}

/// Result of an event that changed the light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: LightState,
    /// Duty cycle between 0.0 and 1.0
    pub duty: f32,
    /// Level to write to the persistent store
    pub persist: Option<u8>,
}

pub struct DimEngine {
    mode: DimMode,
    level_count: u8,
    direction: Direction,
    curve: BrightnessCurve,
    state: LightState,
    ignored: u32,
}

impl DimEngine {
    /// Start with the light off. In dim mode 2 `restored_level` (clamped to
    /// `level_count`) becomes the level the next short press switches to.
    pub fn new(config: &DimConfig, restored_level: u8) -> Result<Self, ConfigError> {
        config.validate()?;
        let curve = BrightnessCurve::new(config.brightness_exponent)?;
        let level_index = match config.dim_mode {
            DimMode::Hold => restored_level.min(config.level_count),
            DimMode::Switch | DimMode::Cycle => 0,
        };
        Ok(Self {
            mode: config.dim_mode,
            level_count: config.level_count,
            direction: config.direction,
            curve,
            state: LightState {
                is_on: false,
                level_index,
            },
            ignored: 0,
        })
    }

    pub fn state(&self) -> LightState {
        self.state
    }

    /// Duty cycle for the current state.
    pub fn duty(&self) -> f32 {
        if !self.state.is_on {
            return 0.0;
        }
        match self.mode {
            DimMode::Switch => self.curve.apply(1.0),
            DimMode::Cycle | DimMode::Hold => self.curve.duty(self.state.level_index, self.level_count),
        }
    }

    /// Events that did not apply to the current mode.
    pub fn ignored(&self) -> u32 {
        self.ignored
    }

    /// Apply one event. Returns `None` when the event does not apply to the
    /// configured mode; the light is left untouched then.
    pub fn transition(&mut self, event: ButtonEvent) -> Option<Transition> {
        let previous = self.state;
        let next = match (self.mode, event) {
            (_, ButtonEvent::LongPress(_)) if self.mode != DimMode::Hold => None,
            (DimMode::Switch, _) => Some(self.toggle()),
            (DimMode::Cycle, _) => Some(self.cycle()),
            (DimMode::Hold, ButtonEvent::LongPress(_)) => Some(self.dim_step()),
            (DimMode::Hold, _) => Some(self.short_press()),
        };
        let Some(state) = next else {
            self.ignored = self.ignored.saturating_add(1);
            debug!("Ignoring {:?} in {:?}", event, self.mode);
            return None;
        };

        self.state = state;
        let persist = (self.mode == DimMode::Hold && state.level_index != previous.level_index)
            .then_some(state.level_index);
        let duty = self.duty();
        info!(
            "Light {} at level {} (duty {})",
            if state.is_on { "on" } else { "off" },
            state.level_index,
            duty
        );
        Some(Transition {
            state,
            duty,
            persist,
        })
    }

    fn toggle(&self) -> LightState {
        if self.state.is_on {
            LightState::OFF
        } else {
            LightState {
                is_on: true,
                level_index: self.level_count,
            }
        }
    }

    fn cycle(&self) -> LightState {
        let (first, last) = self.ends();
        match self.state {
            LightState { is_on: false, .. } => LightState {
                is_on: true,
                level_index: first,
            },
            LightState { level_index, .. } if level_index == last => LightState::OFF,
            LightState { level_index, .. } => LightState {
                is_on: true,
                level_index: self.step_from(level_index),
            },
        }
    }

    fn short_press(&self) -> LightState {
        if self.state.is_on {
            // Keep the level for the next switch on
            LightState {
                is_on: false,
                level_index: self.state.level_index,
            }
        } else {
            LightState {
                is_on: true,
                level_index: self.state.level_index.max(1),
            }
        }
    }

    fn dim_step(&self) -> LightState {
        LightState {
            is_on: true,
            level_index: self.step_from(self.state.level_index),
        }
    }

    /// Next level in the configured direction, saturating in `1..=level_count`.
    fn step_from(&self, level: u8) -> u8 {
        let next = match self.direction {
            Direction::Up => level.saturating_add(1),
            Direction::Down => level.saturating_sub(1),
        };
        next.clamp(1, self.level_count)
    }

    /// First and last level when walking in the configured direction.
    fn ends(&self) -> (u8, u8) {
        match self.direction {
            Direction::Up => (1, self.level_count),
            Direction::Down => (self.level_count, 1),
        }
    }
}
