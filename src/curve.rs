//! Perceptual brightness correction
//!
//! LEDs look much brighter at low duty cycles than the duty itself suggests.
//! Raising the linear dim fraction to a power above one spreads the visible
//! steps more evenly.

use crate::config::ConfigError;

/// Map a dim fraction to a duty cycle: `clamp(fraction, 0, 1) ^ exponent`.
///
/// A fraction of zero (or below) always yields exactly `0.0`.
pub fn curve(fraction: f32, exponent: f32) -> Result<f32, ConfigError> {
    if !exponent.is_finite() || exponent <= 0.0 {
        return Err(ConfigError::InvalidExponent);
    }
    Ok(correct(fraction, Some(exponent)))
}

fn correct(fraction: f32, exponent: Option<f32>) -> f32 {
    // NaN falls through to zero as well
    if !(fraction > 0.0) {
        return 0.0;
    }
    let fraction = fraction.min(1.0);
    match exponent {
        Some(exponent) => libm::powf(fraction, exponent).clamp(0.0, 1.0),
        None => fraction,
    }
}

/// Brightness curve with a checked exponent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessCurve {
    exponent: Option<f32>,
}

impl BrightnessCurve {
    /// Identity curve
    pub const LINEAR: Self = Self { exponent: None };

    pub fn new(exponent: Option<f32>) -> Result<Self, ConfigError> {
        if let Some(exponent) = exponent {
            curve(0.0, exponent)?;
        }
        Ok(Self { exponent })
    }

    /// Duty cycle for `level` out of `level_count` steps.
    pub fn duty(&self, level: u8, level_count: u8) -> f32 {
        if level == 0 || level_count == 0 {
            return 0.0;
        }
        self.apply(f32::from(level) / f32::from(level_count))
    }

    pub fn apply(&self, fraction: f32) -> f32 {
        correct(fraction, self.exponent)
    }
}
