//! Event loop tying the button to the light
//!
//! Every edge runs debounce, classification and the dim transition to
//! completion before the next one is looked at. Hold timing is driven by
//! [`ButtonEventClassifier::deadline`], so the pending wake-up always matches
//! the current button state.

use embassy_futures::select::{select, Either};
use embassy_sync::{blocking_mutex::raw::RawMutex, signal::Signal};
use embassy_time::{Instant, Timer};

use crate::{
    classifier::{ButtonEvent, ButtonEventClassifier},
    config::{ConfigError, DimConfig, DimMode},
    debounce::DebounceFilter,
    edge::{EdgeSource, PinEdge},
    engine::{DimEngine, LightState},
};

/// Output stage driving the light.
pub trait DutySink {
    /// Apply a duty cycle between 0.0 (off) and 1.0 (full). Must not block.
    fn set_duty(&mut self, duty: f32);
}

pub struct Controller<'a, M: RawMutex, P: DutySink> {
    debounce: DebounceFilter,
    classifier: ButtonEventClassifier,
    engine: DimEngine,
    sink: P,
    /// Levels waiting to be written by the store task
    pending: &'a Signal<M, u8>,
}

impl<'a, M: RawMutex, P: DutySink> Controller<'a, M, P> {
    /// Validate `config` and set the light off. `restored_level` is the level
    /// read from the store at startup, only used in dim mode 2.
    pub fn new(
        config: &DimConfig,
        restored_level: u8,
        mut sink: P,
        pending: &'a Signal<M, u8>,
    ) -> Result<Self, ConfigError> {
        let engine = match DimEngine::new(config, restored_level) {
            Ok(engine) => engine,
            Err(error) => {
                error!("Rejected light switch configuration: {:?}", error);
                return Err(error);
            }
        };
        let long_press = match config.dim_mode {
            DimMode::Hold => Some(config.long_press_threshold),
            DimMode::Switch | DimMode::Cycle => None,
        };
        let classifier = ButtonEventClassifier::new(
            config.event_policy,
            config.pull.pressed_edge(),
            long_press,
        );
        sink.set_duty(0.0);
        info!(
            "Light switch ready: mode {:?}, {} levels, {:?}",
            config.dim_mode, config.level_count, config.event_policy
        );
        Ok(Self {
            debounce: DebounceFilter::new(config.bounce_window),
            classifier,
            engine,
            sink,
            pending,
        })
    }

    pub fn state(&self) -> LightState {
        self.engine.state()
    }

    /// Events that did not apply to the configured dim mode.
    pub fn ignored_events(&self) -> u32 {
        self.engine.ignored()
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    /// Next instant [`Self::handle_timer`] must run, if a hold is in progress.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.classifier.deadline()
    }

    pub fn handle_edge(&mut self, edge: PinEdge) {
        if !self.debounce.accept(&edge) {
            return;
        }
        if let Some(event) = self.classifier.on_edge(edge) {
            self.apply(event);
        }
    }

    pub fn handle_timer(&mut self, now: Instant) {
        if let Some(event) = self.classifier.poll(now) {
            self.apply(event);
        }
    }

    /// Switch the light off, e.g. before the device stops.
    pub fn shutdown(&mut self) {
        info!("Switching light off");
        self.sink.set_duty(0.0);
    }

    /// Process edges from `input` forever.
    pub async fn run<E: EdgeSource>(&mut self, input: &mut E) -> ! {
        loop {
            match self.next_deadline() {
                Some(deadline) => match select(input.next_edge(), Timer::at(deadline)).await {
                    Either::First(edge) => self.handle_edge(edge),
                    Either::Second(()) => self.handle_timer(deadline),
                },
                None => {
                    let edge = input.next_edge().await;
                    self.handle_edge(edge);
                }
            }
        }
    }

    fn apply(&mut self, event: ButtonEvent) {
        let Some(transition) = self.engine.transition(event) else {
            return;
        };
        self.sink.set_duty(transition.duty);
        if let Some(level) = transition.persist {
            self.pending.signal(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{Direction, EventPolicy, PullMode},
        edge::Edge,
        store::{flush_pending, tests::RamFlash, FlashLevelStore, LevelStore},
    };
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_time::Duration;

    #[derive(Default)]
    struct Recorder {
        duties: Vec<f32>,
    }

    impl DutySink for Recorder {
        fn set_duty(&mut self, duty: f32) {
            self.duties.push(duty);
        }
    }

    fn hold_config() -> DimConfig {
        DimConfig {
            dim_mode: DimMode::Hold,
            level_count: 4,
            direction: Direction::Up,
            long_press_threshold: Duration::from_millis(1500),
            bounce_window: Duration::from_millis(50),
            event_policy: EventPolicy::Press,
            pull: PullMode::Up,
            ..DimConfig::default()
        }
    }

    fn at(edge: Edge, ms: u64) -> PinEdge {
        PinEdge::new(edge, Instant::from_millis(ms))
    }

    /// Plays back edges at fixed offsets from its creation, then goes quiet.
    struct ScriptedButton {
        start: Instant,
        script: Vec<(u64, Edge)>,
        next: usize,
    }

    impl ScriptedButton {
        fn new(script: &[(u64, Edge)]) -> Self {
            Self {
                start: Instant::now(),
                script: script.to_vec(),
                next: 0,
            }
        }
    }

    impl EdgeSource for ScriptedButton {
        async fn next_edge(&mut self) -> PinEdge {
            let Some(&(ms, edge)) = self.script.get(self.next) else {
                return core::future::pending::<PinEdge>().await;
            };
            // Only a delivered edge advances the script
            Timer::at(self.start + Duration::from_millis(ms)).await;
            self.next += 1;
            PinEdge::new(edge, Instant::now())
        }
    }

    fn run_for<E: EdgeSource>(
        controller: &mut Controller<'_, NoopRawMutex, Recorder>,
        button: &mut E,
        ms: u64,
    ) {
        block_on(select(controller.run(button), Timer::after(Duration::from_millis(ms))));
    }

    #[test]
    fn starts_dark() {
        let pending = Signal::<NoopRawMutex, u8>::new();
        let controller = Controller::new(&hold_config(), 2, Recorder::default(), &pending).unwrap();
        assert_eq!(controller.sink().duties, [0.0]);
        assert!(!controller.state().is_on);
        assert_eq!(controller.next_deadline(), None);
    }

    #[test]
    fn bounce_does_not_toggle_twice() {
        let pending = Signal::<NoopRawMutex, u8>::new();
        let config = DimConfig {
            bounce_window: Duration::from_millis(50),
            ..DimConfig::default()
        };
        let mut controller = Controller::new(&config, 0, Recorder::default(), &pending).unwrap();
        for (edge, ms) in [
            (Edge::Falling, 0),
            (Edge::Rising, 3),
            (Edge::Falling, 6),
            (Edge::Rising, 200),
        ] {
            controller.handle_edge(at(edge, ms));
        }
        assert!(controller.state().is_on);
        assert_eq!(controller.sink().duties, [0.0, 1.0]);
    }

    #[test]
    fn release_cancels_pending_dim_step() {
        let pending = Signal::<NoopRawMutex, u8>::new();
        let mut controller = Controller::new(&hold_config(), 2, Recorder::default(), &pending).unwrap();
        controller.handle_edge(at(Edge::Falling, 1_000));
        assert_eq!(controller.next_deadline(), Some(Instant::from_millis(2_500)));
        controller.handle_edge(at(Edge::Rising, 1_200));
        assert_eq!(controller.next_deadline(), None);
        // A timer that raced the release finds nothing to do
        controller.handle_timer(Instant::from_millis(2_500));
        assert_eq!(controller.state().level_index, 2);
        assert!(controller.state().is_on);
        assert!(!pending.signaled());
    }

    #[test]
    fn dim_steps_reach_the_store() {
        let pending = Signal::<NoopRawMutex, u8>::new();
        let mut store = FlashLevelStore::new(RamFlash::new(), 0).unwrap();
        let mut controller = Controller::new(&hold_config(), 2, Recorder::default(), &pending).unwrap();

        controller.handle_edge(at(Edge::Falling, 0));
        controller.handle_timer(Instant::from_millis(1_500));
        assert!(flush_pending(&pending, &mut store));
        controller.handle_timer(Instant::from_millis(3_000));
        controller.handle_edge(at(Edge::Rising, 3_100));

        assert_eq!(
            controller.state(),
            LightState {
                is_on: true,
                level_index: 4
            }
        );
        assert_eq!(controller.sink().duties, [0.0, 0.75, 1.0]);
        assert!(flush_pending(&pending, &mut store));
        assert_eq!(store.load(), Ok(4));
    }

    #[test]
    fn shutdown_switches_off() {
        let pending = Signal::<NoopRawMutex, u8>::new();
        let mut controller =
            Controller::new(&DimConfig::default(), 0, Recorder::default(), &pending).unwrap();
        controller.handle_edge(at(Edge::Falling, 0));
        controller.shutdown();
        assert_eq!(controller.sink().duties, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn invalid_config_is_rejected_before_any_output() {
        let pending = Signal::<NoopRawMutex, u8>::new();
        let config = DimConfig {
            level_count: 0,
            ..DimConfig::default()
        };
        let result = Controller::new(&config, 0, Recorder::default(), &pending);
        assert!(matches!(result, Err(ConfigError::NoLevels)));
    }

    #[test]
    fn lost_release_does_not_dim_on_its_own() {
        let pending = Signal::<NoopRawMutex, u8>::new();
        let config = DimConfig {
            bounce_window: Duration::from_millis(100),
            ..hold_config()
        };
        let mut controller = Controller::new(&config, 2, Recorder::default(), &pending).unwrap();
        controller.handle_edge(at(Edge::Falling, 0));
        // Swallowed by the bounce window
        controller.handle_edge(at(Edge::Rising, 60));
        controller.handle_edge(at(Edge::Falling, 400));
        assert_eq!(controller.next_deadline(), Some(Instant::from_millis(1_900)));
        controller.handle_edge(at(Edge::Rising, 500));
        assert_eq!(controller.next_deadline(), None);

        controller.handle_timer(Instant::from_millis(1_500));
        controller.handle_timer(Instant::from_millis(7_500));
        assert_eq!(
            controller.state(),
            LightState {
                is_on: true,
                level_index: 2
            }
        );
        assert_eq!(controller.sink().duties, [0.0, 0.5]);
        assert!(!pending.signaled());
    }

    #[test]
    fn run_drops_step_when_released_early() {
        let pending = Signal::<NoopRawMutex, u8>::new();
        let config = DimConfig {
            long_press_threshold: Duration::from_millis(300),
            ..hold_config()
        };
        let mut controller = Controller::new(&config, 2, Recorder::default(), &pending).unwrap();
        let mut button = ScriptedButton::new(&[(0, Edge::Falling), (100, Edge::Rising)]);
        run_for(&mut controller, &mut button, 700);
        assert_eq!(controller.state().level_index, 2);
        assert_eq!(controller.sink().duties, [0.0, 0.5]);
        assert!(!pending.signaled());
    }

    #[test]
    fn run_steps_while_held() {
        let pending = Signal::<NoopRawMutex, u8>::new();
        let config = DimConfig {
            long_press_threshold: Duration::from_millis(300),
            ..hold_config()
        };
        let mut controller = Controller::new(&config, 2, Recorder::default(), &pending).unwrap();
        let mut button = ScriptedButton::new(&[(0, Edge::Falling), (450, Edge::Rising)]);
        run_for(&mut controller, &mut button, 900);
        assert_eq!(
            controller.state(),
            LightState {
                is_on: true,
                level_index: 3
            }
        );
        assert_eq!(controller.sink().duties, [0.0, 0.75]);
        assert!(pending.signaled());
    }
}
