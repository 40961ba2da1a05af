//! Core engine modules - event store, timeline, clock, render sink, session
//!
//! These modules form the synchronization engine, independent of any view.

pub mod channels;
pub mod clock;
pub mod event_store;
pub mod loader;
pub mod render_sink;
pub mod session;
pub mod timeline;

// Re-exports for convenience
pub use clock::AutoplayClock;
pub use event_store::{Channel, EventStore, Listener, ListenerId};
pub use loader::{AssetLoader, FileLoader, LoadStatus, NullLoader};
pub use render_sink::{RenderSinkAdapter, RenderTarget, Renderable, apply_dynamic_to_entity};
pub use session::{Session, SessionOptions, SessionPhase};
pub use timeline::{DragEvent, TimelineConfig, TimelineController, TimelineFrame, TimelineState};
