//! Light output
//!
//! One PWM channel drives the light FET. Duty cycles from the light switch
//! core are scaled to the PWM counter range.

use embassy_nrf::{
    peripherals::PWM0,
    pwm::{Prescaler, SimplePwm},
};
use lightswitch::DutySink;

/// PWM driven light.
pub struct Light<'a> {
    pwm: SimplePwm<'a, PWM0>,
    /// Light is on while the pin is low
    active_low: bool,
}

impl<'a> Light<'a> {
    /// Initialize the light switched off.
    pub fn init(pwm: SimplePwm<'a, PWM0>, max_duty: u16, active_low: bool) -> Self {
        pwm.set_prescaler(Prescaler::Div1);
        pwm.set_max_duty(max_duty);
        let mut light = Self { pwm, active_low };
        light.set_duty(0.0);
        light
    }
}

impl DutySink for Light<'_> {
    fn set_duty(&mut self, duty: f32) {
        let duty = duty.clamp(0.0, 1.0);
        let max = self.pwm.max_duty();
        let on_counts = (duty * f32::from(max) + 0.5) as u16;
        // The nRF PWM holds the pin low for the programmed count
        let counts = if self.active_low {
            on_counts
        } else {
            max - on_counts
        };
        defmt::debug!("Setting light duty to {} ({} counts)", duty, counts);
        self.pwm.set_duty(0, counts);
    }
}
