//! Scrubline - event-store driven timeline scrubbing with autoplay.
//!
//! Re-exports all modules for use by the binary target.

// Core engine (store, timeline, clock, render sink, loading, session)
pub mod core;

// App modules
pub mod cli;
pub mod paths;
pub mod runner;
pub mod script;
pub mod settings;
pub mod ui;

// Re-export commonly used types from core
pub use core::event_store::{Channel, EventStore, Listener};
pub use core::session::{Session, SessionOptions, SessionPhase};
pub use core::timeline::{DragEvent, TimelineConfig, TimelineController, TimelineFrame};
