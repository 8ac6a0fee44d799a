//! Light switch configuration

use core::{fmt, str::FromStr};

use embassy_time::Duration;

use crate::edge::Edge;

/// How button events map onto brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DimMode {
    /// Plain on/off switch (mode 0)
    Switch,
    /// Every trigger steps one level further, past the last level back to off
    /// (mode 1)
    Cycle,
    /// Short press toggles, holding the button dims; the last level survives
    /// restarts (mode 2)
    Hold,
}

impl TryFrom<u8> for DimMode {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Switch),
            1 => Ok(Self::Cycle),
            2 => Ok(Self::Hold),
            other => Err(ConfigError::UnknownDimMode(other)),
        }
    }
}

impl FromStr for DimMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u8>() {
            Ok(value) => Self::try_from(value),
            Err(_) => Err(ConfigError::UnknownDimMode(u8::MAX)),
        }
    }
}

/// Which way the dim level moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("up") {
            Ok(Self::Up)
        } else if s.eq_ignore_ascii_case("down") || s.eq_ignore_ascii_case("dn") {
            Ok(Self::Down)
        } else {
            Err(ConfigError::UnknownDirection)
        }
    }
}

/// Which button edges switch the light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventPolicy {
    /// Every press triggers
    Press,
    /// Every release triggers
    Release,
    /// On at a press, off at the release of the following press
    PressRelease,
    /// On at a release, off at the following press
    ReleasePress,
}

impl FromStr for EventPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [
            ("press", Self::Press),
            ("release", Self::Release),
            ("press_release", Self::PressRelease),
            ("release_press", Self::ReleasePress),
        ]
        .into_iter()
        .find(|(name, _)| s.eq_ignore_ascii_case(name))
        .map(|(_, policy)| policy)
        .ok_or(ConfigError::UnknownPolicy)
    }
}

/// Pull resistor wiring of the button input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PullMode {
    /// Internal pull-up, button shorts to ground
    Up,
    /// Internal pull-down, button shorts to supply
    Down,
    /// External pull-up
    UpExternal,
    /// External pull-down
    DownExternal,
}

impl PullMode {
    /// Edge seen on the pin when the button goes down.
    pub fn pressed_edge(self) -> Edge {
        match self {
            Self::Up | Self::UpExternal => Edge::Falling,
            Self::Down | Self::DownExternal => Edge::Rising,
        }
    }

    /// Internal resistor to enable: `Some(true)` pull-up, `Some(false)`
    /// pull-down, `None` when the board provides one.
    pub fn internal_pull(self) -> Option<bool> {
        match self {
            Self::Up => Some(true),
            Self::Down => Some(false),
            Self::UpExternal | Self::DownExternal => None,
        }
    }
}

impl FromStr for PullMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [
            ("up", Self::Up),
            ("dn", Self::Down),
            ("upex", Self::UpExternal),
            ("dnex", Self::DownExternal),
        ]
        .into_iter()
        .find(|(name, _)| s.eq_ignore_ascii_case(name))
        .map(|(_, pull)| pull)
        .ok_or(ConfigError::UnknownPull)
    }
}

/// Validated settings the controller runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimConfig {
    pub dim_mode: DimMode,
    /// Number of brightness steps above off
    pub level_count: u8,
    pub direction: Direction,
    /// Hold time after which a press counts as long, and the interval of
    /// further dim steps while the button stays down
    pub long_press_threshold: Duration,
    /// `None` keeps the brightness curve linear
    pub brightness_exponent: Option<f32>,
    /// Quiet time after an accepted edge; zero disables debouncing
    pub bounce_window: Duration,
    pub event_policy: EventPolicy,
    pub pull: PullMode,
}

impl Default for DimConfig {
    fn default() -> Self {
        Self {
            dim_mode: DimMode::Switch,
            level_count: 1,
            direction: Direction::Up,
            long_press_threshold: Duration::from_millis(1500),
            brightness_exponent: None,
            bounce_window: Duration::from_ticks(0),
            event_policy: EventPolicy::Press,
            pull: PullMode::Up,
        }
    }
}

impl DimConfig {
    /// Check the values the event loop cannot recover from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level_count == 0 {
            return Err(ConfigError::NoLevels);
        }
        if let Some(exponent) = self.brightness_exponent {
            if !exponent.is_finite() || exponent <= 0.0 {
                return Err(ConfigError::InvalidExponent);
            }
        }
        if self.dim_mode == DimMode::Hold && self.long_press_threshold.as_ticks() == 0 {
            return Err(ConfigError::ZeroLongPress);
        }
        Ok(())
    }
}

/// Configuration rejected before the event loop starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Brightness exponent is not a positive finite number
    InvalidExponent,
    /// `level_count` is zero
    NoLevels,
    /// Dim mode 2 needs a long press threshold above zero
    ZeroLongPress,
    UnknownDimMode(u8),
    UnknownDirection,
    UnknownPolicy,
    UnknownPull,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidExponent => f.write_str("brightness exponent must be positive"),
            Self::NoLevels => f.write_str("at least one dim level is required"),
            Self::ZeroLongPress => f.write_str("long press threshold must not be zero in dim mode 2"),
            Self::UnknownDimMode(mode) => write!(f, "unknown dim mode {}", mode),
            Self::UnknownDirection => f.write_str("direction must be 'up' or 'down'"),
            Self::UnknownPolicy => {
                f.write_str("event must be 'press', 'release', 'press_release' or 'release_press'")
            }
            Self::UnknownPull => f.write_str("resistor must be 'up', 'dn', 'upex' or 'dnex'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(DimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_exponent() {
        for exponent in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = DimConfig {
                brightness_exponent: Some(exponent),
                ..DimConfig::default()
            };
            assert_eq!(config.validate(), Err(ConfigError::InvalidExponent));
        }
    }

    #[test]
    fn rejects_zero_levels() {
        let config = DimConfig {
            level_count: 0,
            ..DimConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoLevels));
    }

    #[test]
    fn zero_long_press_only_matters_in_hold_mode() {
        let mut config = DimConfig {
            long_press_threshold: Duration::from_ticks(0),
            ..DimConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
        config.dim_mode = DimMode::Hold;
        assert_eq!(config.validate(), Err(ConfigError::ZeroLongPress));
    }

    #[test]
    fn parses_button_notation() {
        assert_eq!("UP".parse(), Ok(PullMode::Up));
        assert_eq!("dnex".parse(), Ok(PullMode::DownExternal));
        assert_eq!("Release".parse(), Ok(EventPolicy::Release));
        assert_eq!("press_release".parse(), Ok(EventPolicy::PressRelease));
        assert_eq!(" 2 ".parse(), Ok(DimMode::Hold));
        assert_eq!("down".parse(), Ok(Direction::Down));
        assert_eq!("sideways".parse::<PullMode>(), Err(ConfigError::UnknownPull));
        assert_eq!("3".parse::<DimMode>(), Err(ConfigError::UnknownDimMode(3)));
    }

    #[test]
    fn pull_wiring_decides_pressed_edge() {
        assert_eq!(PullMode::Up.pressed_edge(), Edge::Falling);
        assert_eq!(PullMode::UpExternal.pressed_edge(), Edge::Falling);
        assert_eq!(PullMode::Down.pressed_edge(), Edge::Rising);
        assert_eq!(PullMode::DownExternal.pressed_edge(), Edge::Rising);
        assert_eq!(PullMode::UpExternal.internal_pull(), None);
    }
}
