//! Timeline controller: authoritative playhead with clamp/snap and play/drag state.
//!
//! **Architecture**: the controller never gets called directly by inputs.
//! Slider text, the autoplay clock and startup code all write
//! [`TimelineChannel`]; the controller's listener on that channel is the single
//! apply path. It clamps and snaps the raw value, stores it, then re-broadcasts
//! a [`TimelineFrame`] on [`DisplayChannel`] for the render sink and the view.
//!
//! # State machine
//!
//! Two independent flags: `paused` (playing/paused) and `dragging`
//! (idle/dragging). Autoplay advances only when playing and idle. Pausing,
//! resuming and starting a drag all zero the autoplay accumulator.
//!
//! # Numeric model
//!
//! Positions are `min + k * step`, with `k` in `0..positions` where
//! `positions = (max - min) / step`. `max` itself is never reachable, so the
//! loop point is not shown twice. Labels show `value * 2` seconds (internal
//! units are half-seconds).

use super::channels::{DisplayChannel, DragChannel, PlayToggleChannel, PlaybackChannel, TimelineChannel};
use super::clock::AutoplayClock;
use super::event_store::{EventStore, Listener};
use anyhow::{Result, bail};
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Seconds shown in the label per internal timeline unit
pub const LABEL_SECONDS_PER_UNIT: f64 = 2.0;

/// Slack when counting whole steps in a span
const INDEX_EPSILON: f64 = 1e-9;

/// Timeline bounds, quantization and autoplay rate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Length of the render cycle; may differ from the scrub range
    pub segment_duration: f64,
    /// Timeline units advanced per real second during autoplay
    pub rate: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 2.0,
            step: 0.02,
            segment_duration: 2.0,
            rate: 0.5,
        }
    }
}

impl TimelineConfig {
    /// Reject configs the snapping math cannot work with.
    pub fn validate(&self) -> Result<()> {
        let fields = [self.min, self.max, self.step, self.segment_duration, self.rate];
        if fields.iter().any(|v| !v.is_finite()) {
            bail!("timeline config contains non-finite values: {:?}", self);
        }
        if self.step <= 0.0 {
            bail!("timeline step must be positive, got {}", self.step);
        }
        if self.max - self.min < 2.0 * self.step {
            bail!(
                "timeline range [{}, {}] must span at least two steps of {}",
                self.min,
                self.max,
                self.step
            );
        }
        if self.segment_max() < self.min {
            bail!(
                "segment duration {} leaves no room above min {} for step {}",
                self.segment_duration,
                self.min,
                self.step
            );
        }
        if self.rate < 0.0 {
            bail!("autoplay rate must not be negative, got {}", self.rate);
        }
        Ok(())
    }

    /// Upper bound of the segment-mapped range: `segment_duration - step`
    pub fn segment_max(&self) -> f64 {
        self.segment_duration - self.step
    }

    /// Index of the last reachable timeline position
    fn last_index(&self) -> i64 {
        self.whole_steps(self.max - self.min) - 1
    }

    /// Whole steps that fit in `span`; a partial trailing step does not count
    fn whole_steps(&self, span: f64) -> i64 {
        (span / self.step + INDEX_EPSILON).floor() as i64
    }

    /// Largest value `clamp_time` can return (`max - step`)
    pub fn max_reachable(&self) -> f64 {
        self.position(self.last_index())
    }

    /// Number of discrete positions on the visible timeline
    pub fn positions(&self) -> usize {
        (self.last_index() + 1).max(0) as usize
    }

    fn position(&self, index: i64) -> f64 {
        self.min + index as f64 * self.step
    }

    fn snap(&self, value: f64, max_index: i64) -> f64 {
        let index = ((value - self.min) / self.step).round() as i64;
        self.position(index.min(max_index).max(0))
    }

    /// Sanitize a raw timeline value.
    ///
    /// Non-finite input becomes `min`. The value is clamped to `[min, max]`,
    /// snapped to the nearest step and re-clamped to `[min, max - step]`.
    pub fn clamp_time(&self, raw: f64) -> f64 {
        let raw = if raw.is_finite() { raw } else { self.min };
        let clamped = raw.max(self.min).min(self.max);
        self.snap(clamped, self.last_index())
    }

    /// Map a timeline value into the render segment `[min, segment_max]`,
    /// snapped with the same step.
    pub fn snap_segment_value(&self, value: f64) -> f64 {
        let value = if value.is_finite() { value } else { self.min };
        let max_index = self.whole_steps(self.segment_max() - self.min);
        let clamped = value.max(self.min).min(self.segment_max());
        self.snap(clamped, max_index)
    }

    /// Label text, e.g. `"1.5s"` for 0.75
    pub fn format_label(&self, value: f64) -> String {
        format!("{:.1}s", value * LABEL_SECONDS_PER_UNIT)
    }

    /// Slider fill in percent of the full `[min, max]` range
    pub fn fill_percent(&self, value: f64) -> f64 {
        ((value - self.min) / (self.max - self.min) * 100.0).clamp(0.0, 100.0)
    }
}

/// Mutable playback state, owned by the controller and shared with its clock.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TimelineState {
    pub current_value: f64,
    pub is_paused: bool,
    pub is_dragging: bool,
    pub autoplay_accumulator: f64,
}

pub(crate) type SharedState = Arc<Mutex<TimelineState>>;

/// Display-ready broadcast of one applied timeline value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineFrame {
    pub value: f64,
    pub segment_value: f64,
    pub label: String,
    pub fill_percent: f64,
}

/// Scrub control pointer lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragEvent {
    PointerDown,
    MouseDown,
    TouchStart,
    PointerUp,
    PointerCancel,
    MouseUp,
    MouseLeave,
    TouchEnd,
    TouchCancel,
}

impl DragEvent {
    /// True for events that enter a drag
    pub fn is_start(self) -> bool {
        matches!(self, DragEvent::PointerDown | DragEvent::MouseDown | DragEvent::TouchStart)
    }
}

/// Owner of the authoritative timeline value.
///
/// Created by [`TimelineController::attach`], which registers its listeners
/// on the store. [`TimelineController::detach`] (or drop) removes exactly
/// those listeners.
pub struct TimelineController {
    store: EventStore,
    config: TimelineConfig,
    state: SharedState,
    on_time: Listener<f64>,
    on_drag: Listener<DragEvent>,
    on_toggle: Listener<()>,
    attached: bool,
}

impl TimelineController {
    /// Create state at `min` and subscribe to timeline, drag and toggle input.
    ///
    /// Publishes the initial paused flag. The initial position is not
    /// broadcast; write [`TimelineChannel`] to place the playhead.
    pub fn attach(store: &EventStore, config: TimelineConfig, start_paused: bool) -> Self {
        let state: SharedState = Arc::new(Mutex::new(TimelineState {
            current_value: config.min,
            is_paused: start_paused,
            is_dragging: false,
            autoplay_accumulator: 0.0,
        }));

        let on_time = {
            let store = store.clone();
            let state = Arc::clone(&state);
            Listener::new(move |raw: &f64| {
                apply_timeline_value(&store, &config, &state, *raw);
            })
        };
        let on_drag = {
            let state = Arc::clone(&state);
            Listener::new(move |event: &DragEvent| {
                set_dragging(&state, event.is_start());
            })
        };
        let on_toggle = {
            let store = store.clone();
            let state = Arc::clone(&state);
            Listener::new(move |_: &()| {
                let paused = lock(&state).is_paused;
                set_paused(&store, &state, !paused);
            })
        };

        store.on::<TimelineChannel>(&on_time);
        store.on::<DragChannel>(&on_drag);
        store.on::<PlayToggleChannel>(&on_toggle);
        store.set::<PlaybackChannel>(start_paused);

        info!(
            "Timeline attached: [{}, {}) step {} ({} positions), paused={}",
            config.min,
            config.max,
            config.step,
            config.positions(),
            start_paused
        );

        Self {
            store: store.clone(),
            config,
            state,
            on_time,
            on_drag,
            on_toggle,
            attached: true,
        }
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// Autoplay clock driving this controller through the store.
    pub fn clock(&self) -> AutoplayClock {
        AutoplayClock::new(self.store.clone(), self.config, Arc::clone(&self.state))
    }

    // === Write paths ===

    /// Route a raw value through the store, the way inputs do.
    pub fn request_time(&self, raw: f64) {
        self.store.set::<TimelineChannel>(raw);
    }

    /// Set the paused flag and zero the autoplay accumulator.
    pub fn set_playback_paused(&self, paused: bool) {
        set_paused(&self.store, &self.state, paused);
    }

    pub fn toggle_playback(&self) {
        self.store.set::<PlayToggleChannel>(());
    }

    pub fn begin_drag(&self) {
        self.store.set::<DragChannel>(DragEvent::PointerDown);
    }

    pub fn end_drag(&self) {
        self.store.set::<DragChannel>(DragEvent::PointerUp);
    }

    // === Accessors ===

    pub fn current_value(&self) -> f64 {
        lock(&self.state).current_value
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.state).is_paused
    }

    pub fn is_dragging(&self) -> bool {
        lock(&self.state).is_dragging
    }

    pub fn snapshot(&self) -> TimelineState {
        *lock(&self.state)
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Unregister every listener added by `attach`. Idempotent.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.store.off::<TimelineChannel>(&self.on_time);
        self.store.off::<DragChannel>(&self.on_drag);
        self.store.off::<PlayToggleChannel>(&self.on_toggle);
        self.attached = false;
        debug!("Timeline detached at {}", self.current_value());
    }
}

impl Drop for TimelineController {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for TimelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineController")
            .field("config", &self.config)
            .field("state", &self.snapshot())
            .field("attached", &self.attached)
            .finish()
    }
}

pub(crate) fn lock(state: &SharedState) -> std::sync::MutexGuard<'_, TimelineState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Clamp, store and broadcast `raw`. Runs only from the timeline listener.
fn apply_timeline_value(store: &EventStore, config: &TimelineConfig, state: &SharedState, raw: f64) {
    let value = config.clamp_time(raw);
    lock(state).current_value = value;

    let frame = TimelineFrame {
        value,
        segment_value: config.snap_segment_value(value),
        label: config.format_label(value),
        fill_percent: config.fill_percent(value),
    };
    trace!("Timeline apply: raw {} -> {} (segment {})", raw, value, frame.segment_value);
    store.set::<DisplayChannel>(frame);
}

fn set_paused(store: &EventStore, state: &SharedState, paused: bool) {
    {
        let mut state = lock(state);
        state.is_paused = paused;
        state.autoplay_accumulator = 0.0;
    }
    debug!("Playback {}", if paused { "paused" } else { "playing" });
    store.set::<PlaybackChannel>(paused);
}

fn set_dragging(state: &SharedState, dragging: bool) {
    let mut state = lock(state);
    if dragging {
        state.autoplay_accumulator = 0.0;
    }
    if state.is_dragging != dragging {
        debug!("Scrub drag {}", if dragging { "started" } else { "ended" });
    }
    state.is_dragging = dragging;
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn cfg() -> TimelineConfig {
        TimelineConfig::default()
    }

    fn is_step_aligned(cfg: &TimelineConfig, v: f64) -> bool {
        let k = (v - cfg.min) / cfg.step;
        (k - k.round()).abs() < 1e-6
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(cfg().validate().is_ok());
        assert_eq!(cfg().positions(), 100);
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let mut c = cfg();
        c.step = 0.0;
        assert!(c.validate().is_err());

        let mut c = cfg();
        c.max = c.min + c.step;
        assert!(c.validate().is_err());

        let mut c = cfg();
        c.rate = f64::NAN;
        assert!(c.validate().is_err());

        let mut c = cfg();
        c.segment_duration = 0.01;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_clamp_non_finite_to_min() {
        let c = cfg();
        assert_eq!(c.clamp_time(f64::NAN), c.min);
        assert_eq!(c.clamp_time(f64::INFINITY), c.min);
        assert_eq!(c.clamp_time(f64::NEG_INFINITY), c.min);
    }

    #[test]
    fn test_clamp_upper_bound_exclusive() {
        let c = cfg();
        assert!((c.clamp_time(c.max) - (c.max - c.step)).abs() < EPS);
        assert!((c.clamp_time(100.0) - 1.98).abs() < EPS);
        assert_eq!(c.clamp_time(-3.0), c.min);
    }

    #[test]
    fn test_clamp_slider_scenario() {
        // 1.99 snaps to 1.98 or 2.00, either way ends at 1.98
        assert!((cfg().clamp_time(1.99) - 1.98).abs() < EPS);
    }

    #[test]
    fn test_clamp_idempotent_and_aligned() {
        let c = cfg();
        let mut x = -0.5;
        while x < 2.5 {
            let once = c.clamp_time(x);
            assert_eq!(c.clamp_time(once), once, "not idempotent at {x}");
            assert!(is_step_aligned(&c, once), "{once} not on step grid");
            assert!(once >= c.min && once <= c.max_reachable());
            x += 0.0037;
        }
    }

    #[test]
    fn test_clamp_with_offset_min() {
        let c = TimelineConfig {
            min: 1.0,
            max: 3.0,
            step: 0.25,
            segment_duration: 2.0,
            rate: 1.0,
        };
        assert_eq!(c.clamp_time(1.3), 1.25);
        assert_eq!(c.clamp_time(5.0), 2.75);
        assert_eq!(c.clamp_time(0.0), 1.0);
    }

    #[test]
    fn test_snap_segment_value() {
        let c = TimelineConfig {
            segment_duration: 1.0,
            ..cfg()
        };
        assert!((c.snap_segment_value(0.5) - 0.5).abs() < EPS);
        assert!((c.snap_segment_value(1.5) - 0.98).abs() < EPS);
        assert_eq!(c.snap_segment_value(-1.0), 0.0);
        assert_eq!(c.snap_segment_value(f64::NAN), 0.0);
        assert!(is_step_aligned(&c, c.snap_segment_value(0.731)));
    }

    #[test]
    fn test_label_and_fill() {
        let c = cfg();
        assert_eq!(c.format_label(0.0), "0.0s");
        assert_eq!(c.format_label(0.76), "1.5s");
        assert_eq!(c.format_label(1.98), "4.0s");
        assert!((c.fill_percent(1.0) - 50.0).abs() < EPS);
    }

    #[test]
    fn test_store_write_goes_through_controller() {
        let store = EventStore::new();
        let ctl = TimelineController::attach(&store, cfg(), false);

        store.set::<TimelineChannel>(1.99);
        assert!((ctl.current_value() - 1.98).abs() < EPS);

        let frame = store.get::<DisplayChannel>().unwrap();
        assert!((frame.value - 1.98).abs() < EPS);
        assert_eq!(frame.label, "4.0s");
        // Raw value stays in the store as written
        assert_eq!(store.get::<TimelineChannel>(), Some(1.99));
    }

    #[test]
    fn test_display_reemits_unchanged_value() {
        let store = EventStore::new();
        let _ctl = TimelineController::attach(&store, cfg(), true);
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        store.on::<DisplayChannel>(&Listener::new(move |_: &TimelineFrame| {
            *c.lock().unwrap() += 1;
        }));

        store.set::<TimelineChannel>(0.5);
        store.set::<TimelineChannel>(0.5);
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn test_pause_resets_accumulator() {
        let store = EventStore::new();
        let ctl = TimelineController::attach(&store, cfg(), false);
        lock(&ctl.state).autoplay_accumulator = 0.015;

        ctl.set_playback_paused(true);
        assert!(ctl.is_paused());
        assert_eq!(ctl.snapshot().autoplay_accumulator, 0.0);
        assert_eq!(store.get::<PlaybackChannel>(), Some(true));

        lock(&ctl.state).autoplay_accumulator = 0.015;
        ctl.set_playback_paused(false);
        assert_eq!(ctl.snapshot().autoplay_accumulator, 0.0);
    }

    #[test]
    fn test_toggle_via_store() {
        let store = EventStore::new();
        let ctl = TimelineController::attach(&store, cfg(), true);
        store.set::<PlayToggleChannel>(());
        assert!(!ctl.is_paused());
        store.set::<PlayToggleChannel>(());
        assert!(ctl.is_paused());
    }

    #[test]
    fn test_drag_lifecycle_via_store() {
        let store = EventStore::new();
        let ctl = TimelineController::attach(&store, cfg(), false);
        lock(&ctl.state).autoplay_accumulator = 0.01;

        store.set::<DragChannel>(DragEvent::TouchStart);
        assert!(ctl.is_dragging());
        assert_eq!(ctl.snapshot().autoplay_accumulator, 0.0);

        // Input keeps flowing while dragging
        store.set::<TimelineChannel>(0.41);
        assert!((ctl.current_value() - 0.42).abs() < EPS || (ctl.current_value() - 0.40).abs() < EPS);

        store.set::<DragChannel>(DragEvent::MouseLeave);
        assert!(!ctl.is_dragging());
    }

    #[test]
    fn test_drag_event_kinds() {
        for e in [DragEvent::PointerDown, DragEvent::MouseDown, DragEvent::TouchStart] {
            assert!(e.is_start());
        }
        for e in [
            DragEvent::PointerUp,
            DragEvent::PointerCancel,
            DragEvent::MouseUp,
            DragEvent::MouseLeave,
            DragEvent::TouchEnd,
            DragEvent::TouchCancel,
        ] {
            assert!(!e.is_start());
        }
    }

    #[test]
    fn test_detach_removes_all_listeners() {
        let store = EventStore::new();
        let mut ctl = TimelineController::attach(&store, cfg(), false);
        assert_eq!(store.event_names().len(), 3);

        ctl.detach();
        assert!(store.event_names().is_empty());
        ctl.detach();

        store.set::<TimelineChannel>(1.0);
        assert_eq!(ctl.current_value(), 0.0);
    }

    #[test]
    fn test_uneven_range_stays_below_bounds() {
        // Neither span is a whole number of steps
        let c = TimelineConfig {
            max: 2.01,
            segment_duration: 0.99,
            ..cfg()
        };
        assert!(c.validate().is_ok());
        assert!((c.max_reachable() - 1.98).abs() < EPS);
        assert!(c.clamp_time(5.0) <= c.max - c.step);
        assert!((c.clamp_time(5.0) - 1.98).abs() < EPS);
        assert!(c.snap_segment_value(5.0) <= c.segment_max());
        assert!((c.snap_segment_value(5.0) - 0.96).abs() < EPS);
        assert_eq!(c.positions(), 100);
    }

    #[test]
    fn test_convenience_writes_go_through_store() {
        let store = EventStore::new();
        let mut ctl = TimelineController::attach(&store, cfg(), true);
        let toggles = Arc::new(Mutex::new(0));
        let t = Arc::clone(&toggles);
        store.on::<PlayToggleChannel>(&Listener::new(move |_: &()| *t.lock().unwrap() += 1));

        ctl.toggle_playback();
        assert!(!ctl.is_paused());
        assert_eq!(*toggles.lock().unwrap(), 1);

        ctl.begin_drag();
        assert!(ctl.is_dragging());
        assert_eq!(store.get::<DragChannel>(), Some(DragEvent::PointerDown));
        ctl.end_drag();
        assert!(!ctl.is_dragging());
        assert_eq!(store.get::<DragChannel>(), Some(DragEvent::PointerUp));

        ctl.request_time(0.5);
        assert!((ctl.current_value() - 0.5).abs() < EPS);

        assert!(ctl.is_attached());
        ctl.detach();
        assert!(!ctl.is_attached());
        ctl.toggle_playback();
        assert!(!ctl.is_paused());
    }

    #[test]
    fn test_drop_detaches() {
        let store = EventStore::new();
        {
            let _ctl = TimelineController::attach(&store, cfg(), false);
        }
        assert!(store.event_names().is_empty());
    }
}
