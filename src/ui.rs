//! Headless scrub bar: the view side of the timeline.
//!
//! Mirrors what a slider widget shows (label, thumb position, fill, play/pause
//! affordance, loading/failure state) by listening to the store, and turns
//! user actions into store writes. It never reads controller state directly.

use crate::core::channels::{
    DisplayChannel, DragChannel, LoadChannel, PlayToggleChannel, PlaybackChannel, TimelineChannel,
};
use crate::core::event_store::{EventStore, Listener};
use crate::core::loader::LoadStatus;
use crate::core::timeline::{DragEvent, TimelineConfig, TimelineFrame};
use log::trace;
use std::sync::{Arc, Mutex, MutexGuard};

/// Text rendition settings
#[derive(Clone, Debug)]
pub struct ScrubBarStyle {
    /// Bar width in cells
    pub width: usize,
    pub show_label: bool,
    pub fill_char: char,
    pub empty_char: char,
}

impl Default for ScrubBarStyle {
    fn default() -> Self {
        Self {
            width: 40,
            show_label: true,
            fill_char: '#',
            empty_char: '.',
        }
    }
}

/// Load state as shown to the user
#[derive(Clone, Debug, PartialEq)]
pub enum ViewStatus {
    Loading { units: usize },
    Ready,
    Failed(String),
}

/// Everything the scrub bar displays.
#[derive(Clone, Debug, PartialEq)]
pub struct ScrubBarModel {
    pub label: String,
    pub slider_value: f64,
    pub fill_percent: f64,
    pub paused: bool,
    pub status: ViewStatus,
}

impl Default for ScrubBarModel {
    fn default() -> Self {
        Self {
            label: String::new(),
            slider_value: 0.0,
            fill_percent: 0.0,
            paused: true,
            status: ViewStatus::Loading { units: 0 },
        }
    }
}

pub struct ScrubBar {
    store: EventStore,
    config: TimelineConfig,
    style: ScrubBarStyle,
    model: Arc<Mutex<ScrubBarModel>>,
    on_display: Listener<TimelineFrame>,
    on_playback: Listener<bool>,
    on_load: Listener<LoadStatus>,
    attached: bool,
}

impl ScrubBar {
    pub fn attach(store: &EventStore, config: TimelineConfig, style: ScrubBarStyle) -> Self {
        let model = Arc::new(Mutex::new(ScrubBarModel::default()));

        let on_display = {
            let model = Arc::clone(&model);
            Listener::new(move |frame: &TimelineFrame| {
                let mut m = lock(&model);
                m.label = frame.label.clone();
                m.slider_value = frame.value;
                m.fill_percent = frame.fill_percent;
            })
        };
        let on_playback = {
            let model = Arc::clone(&model);
            Listener::new(move |paused: &bool| lock(&model).paused = *paused)
        };
        let on_load = {
            let model = Arc::clone(&model);
            Listener::new(move |status: &LoadStatus| {
                lock(&model).status = match status {
                    LoadStatus::Loading { units } => ViewStatus::Loading { units: *units },
                    LoadStatus::Ready { .. } => ViewStatus::Ready,
                    LoadStatus::Failed(msg) => ViewStatus::Failed(msg.clone()),
                };
            })
        };

        store.on::<DisplayChannel>(&on_display);
        store.on::<PlaybackChannel>(&on_playback);
        store.on::<LoadChannel>(&on_load);

        Self {
            store: store.clone(),
            config,
            style,
            model,
            on_display,
            on_playback,
            on_load,
            attached: true,
        }
    }

    // === Input ===

    /// Slider input event carrying the value as text.
    ///
    /// Unparseable text is forwarded as NaN; the controller maps it to `min`.
    pub fn input(&self, text: &str) {
        let value = text.trim().parse::<f64>().unwrap_or(f64::NAN);
        trace!("Scrub input {:?} -> {}", text, value);
        self.store.set::<TimelineChannel>(value);
    }

    pub fn drag(&self, event: DragEvent) {
        self.store.set::<DragChannel>(event);
    }

    pub fn press_play_toggle(&self) {
        self.store.set::<PlayToggleChannel>(());
    }

    // === View ===

    pub fn model(&self) -> ScrubBarModel {
        lock(&self.model).clone()
    }

    /// Slider bounds `(min, max, step)`
    pub fn slider_range(&self) -> (f64, f64, f64) {
        (self.config.min, self.config.max, self.config.step)
    }

    pub fn label(&self) -> String {
        lock(&self.model).label.clone()
    }

    pub fn slider_value(&self) -> f64 {
        lock(&self.model).slider_value
    }

    pub fn fill_percent(&self) -> f64 {
        lock(&self.model).fill_percent
    }

    /// Icon for the toggle button: what pressing it will do
    pub fn play_icon(&self) -> &'static str {
        if lock(&self.model).paused { "▶" } else { "❚❚" }
    }

    pub fn play_label(&self) -> &'static str {
        if lock(&self.model).paused { "Play" } else { "Pause" }
    }

    /// Timeline controls are shown only once the asset is ready
    pub fn controls_visible(&self) -> bool {
        lock(&self.model).status == ViewStatus::Ready
    }

    pub fn status_text(&self) -> String {
        match &lock(&self.model).status {
            ViewStatus::Loading { units } => format!("Loading... ({} loaded)", units),
            ViewStatus::Ready => "Ready".to_string(),
            ViewStatus::Failed(msg) => format!("Failed to load: {}", msg),
        }
    }

    /// One-line text rendition, e.g. `▶ [####......] 1.0s`
    pub fn render_line(&self) -> String {
        let m = self.model();
        if m.status != ViewStatus::Ready {
            return self.status_text();
        }
        let width = self.style.width.max(1);
        let filled = ((m.fill_percent / 100.0) * width as f64).round() as usize;
        let filled = filled.min(width);
        let bar: String = std::iter::repeat_n(self.style.fill_char, filled)
            .chain(std::iter::repeat_n(self.style.empty_char, width - filled))
            .collect();
        let icon = if m.paused { "▶" } else { "❚❚" };
        if self.style.show_label {
            format!("{} [{}] {}", icon, bar, m.label)
        } else {
            format!("{} [{}]", icon, bar)
        }
    }

    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.store.off::<DisplayChannel>(&self.on_display);
        self.store.off::<PlaybackChannel>(&self.on_playback);
        self.store.off::<LoadChannel>(&self.on_load);
        self.attached = false;
    }
}

impl Drop for ScrubBar {
    fn drop(&mut self) {
        self.detach();
    }
}

fn lock(model: &Arc<Mutex<ScrubBarModel>>) -> MutexGuard<'_, ScrubBarModel> {
    model.lock().unwrap_or_else(|e| e.into_inner())
}
