//! Autoplay clock: advances the timeline at a fixed rate between frames.
//!
//! `tick(dt)` is called once per frame with elapsed seconds. Scaled time is
//! accumulated and drained in whole steps, so a stalled frame with a large
//! `dt` catches up with several steps in one tick while regular frames
//! produce at most one.
//!
//! Steps are written to [`TimelineChannel`] like any other input; the clock
//! never touches the current value itself.

use super::channels::TimelineChannel;
use super::event_store::EventStore;
use super::timeline::{SharedState, TimelineConfig, lock};
use log::trace;

/// Slack for comparing the accumulator against the step size
const ACCUMULATOR_EPSILON: f64 = 1e-9;

#[derive(Clone)]
pub struct AutoplayClock {
    store: EventStore,
    config: TimelineConfig,
    state: SharedState,
}

impl AutoplayClock {
    pub(crate) fn new(store: EventStore, config: TimelineConfig, state: SharedState) -> Self {
        Self { store, config, state }
    }

    /// Advance by `dt` seconds. Returns the number of steps written.
    ///
    /// While paused or dragging the accumulator is held at zero, so resuming
    /// never jumps. Negative or non-finite `dt` counts as zero. Whole loops
    /// of the timeline are skipped, so one tick writes at most `positions()`
    /// steps however large `dt` is.
    pub fn tick(&self, dt: f64) -> usize {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let pending = {
            let mut state = lock(&self.state);
            if state.is_paused || state.is_dragging {
                state.autoplay_accumulator = 0.0;
                return 0;
            }
            let step = self.config.step;
            let acc = (state.autoplay_accumulator + dt * self.config.rate).min(f64::MAX);
            let due = ((acc + ACCUMULATOR_EPSILON) / step).floor();
            if due < 1.0 {
                state.autoplay_accumulator = acc;
                return 0;
            }
            state.autoplay_accumulator = (acc - due * step).clamp(0.0, step);
            self.steps_to_write(due)
        };

        let mut steps = 0;
        while steps < pending {
            let Some(next) = self.next_position() else {
                break;
            };
            // Lock released: the write re-enters the controller
            self.store.set::<TimelineChannel>(next);
            steps += 1;
        }
        steps
    }

    /// Fold `due` steps onto one loop of the timeline: 1..=positions.
    fn steps_to_write(&self, due: f64) -> usize {
        let positions = self.config.positions().max(1) as f64;
        if !due.is_finite() {
            return positions as usize;
        }
        let steps = if due > positions { (due - 1.0) % positions + 1.0 } else { due };
        if steps < due {
            trace!("Autoplay skipped {} whole loops", ((due - steps) / positions).round());
        }
        steps as usize
    }

    /// Position after one step, wrapping to `min` past the last position.
    fn next_position(&self) -> Option<f64> {
        let mut state = lock(&self.state);
        // A listener may pause or start a drag mid-drain
        if state.is_paused || state.is_dragging {
            state.autoplay_accumulator = 0.0;
            return None;
        }
        let mut next = state.current_value + self.config.step;
        if next > self.config.max_reachable() + self.config.step / 2.0 {
            trace!("Autoplay loop: {} -> {}", state.current_value, self.config.min);
            next = self.config.min;
        }
        Some(next)
    }

    pub fn accumulator(&self) -> f64 {
        lock(&self.state).autoplay_accumulator
    }
}

impl std::fmt::Debug for AutoplayClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoplayClock")
            .field("rate", &self.config.rate)
            .field("accumulator", &self.accumulator())
            .finish()
    }
}
