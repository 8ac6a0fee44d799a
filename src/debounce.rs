//! Time based debouncing of pin edges

use embassy_time::{Duration, Instant};

use crate::edge::PinEdge;

/// Drops edges arriving within `window` of the last accepted edge on one pin.
pub struct DebounceFilter {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl DebounceFilter {
    /// A zero window lets every edge through.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// Check whether `edge` is genuine. Only accepted edges restart the
    /// quiet window.
    pub fn accept(&mut self, edge: &PinEdge) -> bool {
        let genuine = match self.last_accepted {
            Some(last) if self.window.as_ticks() > 0 => {
                edge.at.checked_duration_since(last).unwrap_or(Duration::from_ticks(0)) >= self.window
            }
            _ => true,
        };
        if genuine {
            self.last_accepted = Some(edge.at);
        } else {
            trace!("Bounce suppressed");
        }
        genuine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;

    fn edge(edge: Edge, ms: u64) -> PinEdge {
        PinEdge::new(edge, Instant::from_millis(ms))
    }

    #[test]
    fn first_edge_always_passes() {
        let mut filter = DebounceFilter::new(Duration::from_millis(100));
        assert!(filter.accept(&edge(Edge::Falling, 0)));
    }

    #[test]
    fn suppresses_edges_inside_window() {
        let mut filter = DebounceFilter::new(Duration::from_millis(100));
        assert!(filter.accept(&edge(Edge::Falling, 1_000)));
        assert!(!filter.accept(&edge(Edge::Rising, 1_040)));
        assert!(!filter.accept(&edge(Edge::Falling, 1_099)));
        assert!(filter.accept(&edge(Edge::Rising, 1_100)));
    }

    #[test]
    fn suppressed_edges_do_not_extend_window() {
        let mut filter = DebounceFilter::new(Duration::from_millis(50));
        assert!(filter.accept(&edge(Edge::Falling, 0)));
        assert!(!filter.accept(&edge(Edge::Rising, 30)));
        assert!(filter.accept(&edge(Edge::Rising, 55)));
    }

    #[test]
    fn zero_window_disables_filtering() {
        let mut filter = DebounceFilter::new(Duration::from_ticks(0));
        assert!(filter.accept(&edge(Edge::Falling, 5)));
        assert!(filter.accept(&edge(Edge::Rising, 5)));
        assert!(filter.accept(&edge(Edge::Falling, 6)));
    }
}
