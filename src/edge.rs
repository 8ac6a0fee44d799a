//! Raw input transitions

use embassy_time::Instant;

/// Direction of a level change on the input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
}

/// A transition on the button pin, stamped with a monotonic instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinEdge {
    pub edge: Edge,
    pub at: Instant,
}

impl PinEdge {
    pub fn new(edge: Edge, at: Instant) -> Self {
        Self { edge, at }
    }
}

/// Hardware source delivering pin transitions in arrival order.
#[allow(async_fn_in_trait)]
pub trait EdgeSource {
    /// Wait for the next transition.
    async fn next_edge(&mut self) -> PinEdge;
}
