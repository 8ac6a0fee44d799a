//! Button event classification
//!
//! Turns debounced pin edges into the events that drive the dimmer. Which
//! edges produce an event is decided by the [`EventPolicy`]. With a long
//! press threshold configured, every press is held back until it is known to
//! be short, and a held button produces one [`ButtonEvent::LongPress`] per
//! elapsed threshold.

use embassy_time::{Duration, Instant};

use crate::{
    config::EventPolicy,
    edge::{Edge, PinEdge},
};

/// Logical button event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    /// Trigger on a press edge
    Press,
    /// Trigger on a release edge
    Release,
    /// The button has been held for the given time
    LongPress(Duration),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Pressed,
    Released,
}

/// State of the button while it is down.
#[derive(Clone, Copy)]
struct Hold {
    since: Instant,
    /// Long press events fired during this hold
    steps: u32,
    /// Set at the press edge for the two phase policies: this press started
    /// while the light was latched on
    latched_at_press: bool,
}

pub struct ButtonEventClassifier {
    policy: EventPolicy,
    pressed_edge: Edge,
    long_press: Option<Duration>,
    hold: Option<Hold>,
    /// A two phase policy has switched on and waits for its off trigger
    latched: bool,
}

impl ButtonEventClassifier {
    /// `pressed_edge` is the edge the pin shows when the button goes down.
    /// `long_press` enables hold detection.
    pub fn new(policy: EventPolicy, pressed_edge: Edge, long_press: Option<Duration>) -> Self {
        Self {
            policy,
            pressed_edge,
            long_press: long_press.filter(|threshold| threshold.as_ticks() > 0),
            hold: None,
            latched: false,
        }
    }

    /// Instant at which [`Self::poll`] has the next long press to report.
    pub fn deadline(&self) -> Option<Instant> {
        let threshold = self.long_press?;
        let hold = self.hold?;
        Some(hold.since + threshold * (hold.steps + 1))
    }

    /// Feed one debounced edge.
    pub fn on_edge(&mut self, edge: PinEdge) -> Option<ButtonEvent> {
        let event = if edge.edge == self.pressed_edge {
            self.on_press(edge.at)
        } else {
            self.on_release(edge.at)
        };
        if let Some(event) = event {
            debug!("Button event {:?}", event);
        }
        event
    }

    /// Report a long press if the hold has reached the next threshold by
    /// `now`. Fires at most once per threshold interval.
    pub fn poll(&mut self, now: Instant) -> Option<ButtonEvent> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        let hold = self.hold.as_mut()?;
        hold.steps += 1;
        let held_for = deadline - hold.since;
        debug!("Long press step {}", hold.steps);
        Some(ButtonEvent::LongPress(held_for))
    }

    fn on_press(&mut self, at: Instant) -> Option<ButtonEvent> {
        if self.hold.take().is_some() {
            // The release edge never arrived, the hold starts over from here
            debug!("Press while held, restarting hold");
        }
        let mut hold = Hold {
            since: at,
            steps: 0,
            latched_at_press: false,
        };
        let event = match self.long_press {
            // Decided at release
            Some(_) => None,
            None => self.cycle(Stage::Pressed, &mut hold.latched_at_press),
        };
        self.hold = Some(hold);
        event
    }

    fn on_release(&mut self, at: Instant) -> Option<ButtonEvent> {
        let Some(mut hold) = self.hold.take() else {
            trace!("Release without press, ignored");
            return None;
        };
        let Some(threshold) = self.long_press else {
            return self.cycle(Stage::Released, &mut hold.latched_at_press);
        };
        if hold.steps > 0 {
            return None;
        }
        let held_for = at.checked_duration_since(hold.since).unwrap_or(Duration::from_ticks(0));
        if held_for >= threshold {
            // The hold timer never got to run; report the hold once
            return Some(ButtonEvent::LongPress(held_for));
        }
        let pressed = self.cycle(Stage::Pressed, &mut hold.latched_at_press);
        let released = self.cycle(Stage::Released, &mut hold.latched_at_press);
        pressed.or(released)
    }

    /// Advance the policy by one half of a press cycle.
    fn cycle(&mut self, stage: Stage, latched_at_press: &mut bool) -> Option<ButtonEvent> {
        match (self.policy, stage) {
            (EventPolicy::Press, Stage::Pressed) => Some(ButtonEvent::Press),
            (EventPolicy::Release, Stage::Released) => Some(ButtonEvent::Release),
            (EventPolicy::PressRelease, Stage::Pressed) => {
                *latched_at_press = self.latched;
                if self.latched {
                    None
                } else {
                    self.latched = true;
                    Some(ButtonEvent::Press)
                }
            }
            (EventPolicy::PressRelease, Stage::Released) => {
                if *latched_at_press {
                    self.latched = false;
                    Some(ButtonEvent::Release)
                } else {
                    None
                }
            }
            (EventPolicy::ReleasePress, Stage::Pressed) => {
                *latched_at_press = self.latched;
                if self.latched {
                    self.latched = false;
                    Some(ButtonEvent::Press)
                } else {
                    None
                }
            }
            (EventPolicy::ReleasePress, Stage::Released) => {
                if *latched_at_press {
                    // This press already switched off
                    None
                } else {
                    self.latched = true;
                    Some(ButtonEvent::Release)
                }
            }
            _ => None,
        }
    }
}
