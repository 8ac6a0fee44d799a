//! Button control module for PineTime

use debouncr::{debounce_2, Debouncer, Edge as LevelChange, Repeat2};
use embassy_nrf::gpio::{AnyPin, Input, Output};
use embassy_time::{Duration, Instant, Timer};
use lightswitch::{Edge, EdgeSource, PinEdge};

/// Time between two samples of the button pin
const POLL_INTERVAL: Duration = Duration::from_millis(1);

struct ButtonConfig<'a> {
    /// Button detection pin (high/low)
    pin_button: Input<'a, AnyPin>,
    /// Button enable pin
    pin_enable: Output<'a, AnyPin>,
    /// Glitch filter, an edge needs two equal samples in a row
    debouncer: Debouncer<u8, Repeat2>,
}

pub struct Button {
    /// Button configuration
    config: ButtonConfig<'static>,
}

impl Button {
    /// Configure button on boot. `idle_high` is the pin level while the
    /// button is up.
    pub fn init(button_pin: Input<'static, AnyPin>, enable_pin: Output<'static, AnyPin>, idle_high: bool) -> Self {
        Self {
            config: ButtonConfig {
                pin_button: button_pin,
                pin_enable: enable_pin,
                debouncer: debounce_2(idle_high),
            },
        }
    }

    /// Sample the pin once and report a level change.
    async fn sample(&mut self) -> Option<Edge> {
        let config = &mut self.config;

        // Enable button
        config.pin_enable.set_high();
        // The button needs a short time to give stable outputs
        Timer::after(Duration::from_nanos(1)).await;

        let change = config.debouncer.update(config.pin_button.is_high());

        // Button consumes around 34µA when P0.15 is left high.
        // To reduce current consumption, set it low most of the time.
        config.pin_enable.set_low();

        change.map(|change| match change {
            LevelChange::Rising => Edge::Rising,
            LevelChange::Falling => Edge::Falling,
        })
    }
}

impl EdgeSource for Button {
    async fn next_edge(&mut self) -> PinEdge {
        loop {
            if let Some(edge) = self.sample().await {
                return PinEdge::new(edge, Instant::now());
            }
            Timer::after(POLL_INTERVAL).await;
        }
    }
}
