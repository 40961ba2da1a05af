//! Channels shared by the viewer components.
//!
//! Raw writes go to [`TimelineChannel`]; the controller is the only writer of
//! [`DisplayChannel`] and [`PlaybackChannel`].

use super::event_store::Channel;
use super::loader::LoadStatus;
use super::timeline::{DragEvent, TimelineFrame};

/// Raw timeline position from the slider or the autoplay clock.
pub struct TimelineChannel;

impl Channel for TimelineChannel {
    type Value = f64;
    const KEY: &'static str = "timeline.uTime";
}

/// Clamped, snapped position ready for display and rendering.
pub struct DisplayChannel;

impl Channel for DisplayChannel {
    type Value = TimelineFrame;
    const KEY: &'static str = "timeline.display";
}

/// Paused flag, for the play/pause affordance.
pub struct PlaybackChannel;

impl Channel for PlaybackChannel {
    type Value = bool;
    const KEY: &'static str = "timeline.paused";
}

/// Pointer/mouse/touch lifecycle on the scrub control.
pub struct DragChannel;

impl Channel for DragChannel {
    type Value = DragEvent;
    const KEY: &'static str = "timeline.drag";
}

/// Play/pause button press.
pub struct PlayToggleChannel;

impl Channel for PlayToggleChannel {
    type Value = ();
    const KEY: &'static str = "timeline.toggle";
}

/// Asset loader progress and outcome.
pub struct LoadChannel;

impl Channel for LoadChannel {
    type Value = LoadStatus;
    const KEY: &'static str = "asset.load";
}
