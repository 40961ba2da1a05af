//! Viewer session: asset load gate plus timeline/clock/sink lifecycle.
//!
//! A session owns everything it registers on the store. The timeline only
//! exists after the loader completes successfully; on failure the session
//! stays in [`SessionPhase::Failed`] and never creates timeline state.
//! `teardown()` (also run on drop) unregisters every listener the session
//! added, one `off` per `on`.

use super::channels::{LoadChannel, TimelineChannel};
use super::clock::AutoplayClock;
use super::event_store::EventStore;
use super::loader::{AssetLoader, LoadStatus, StoreLoadObserver};
use super::render_sink::{RenderSinkAdapter, RenderTarget};
use super::timeline::{TimelineConfig, TimelineController};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Startup parameters for a session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub timeline: TimelineConfig,
    pub start_paused: bool,
    /// First value written to the timeline once loading succeeds
    pub start_value: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeline: TimelineConfig::default(),
            start_paused: false,
            start_value: 0.0,
        }
    }
}

/// Coarse lifecycle position of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Running,
    Failed,
    Ended,
}

struct Running {
    controller: TimelineController,
    clock: AutoplayClock,
    sink: RenderSinkAdapter,
}

enum Phase {
    Idle,
    Running(Box<Running>),
    Failed(String),
    Ended,
}

pub struct Session {
    id: Uuid,
    store: EventStore,
    options: SessionOptions,
    phase: Phase,
}

impl Session {
    /// Create an idle session on `store`. Fails on an unusable timeline config.
    pub fn new(store: &EventStore, options: SessionOptions) -> Result<Self> {
        options.timeline.validate().context("Invalid timeline configuration")?;
        let id = Uuid::new_v4();
        debug!("Session {} created", id);
        Ok(Self {
            id,
            store: store.clone(),
            options,
            phase: Phase::Idle,
        })
    }

    /// Run `loader`; on success attach the timeline and place the playhead.
    ///
    /// Returns true if the session is running afterwards. A session starts at
    /// most once.
    pub fn start(&mut self, loader: &mut dyn AssetLoader, target: Option<Box<dyn RenderTarget>>) -> bool {
        if !matches!(self.phase, Phase::Idle) {
            warn!("Session {} already started ({:?})", self.id, self.phase());
            return false;
        }

        let mut observer = StoreLoadObserver::new(&self.store);
        loader.load(&mut observer);

        match observer.outcome().cloned() {
            Some(Ok(())) => {
                self.attach(target);
                true
            }
            Some(Err(msg)) => {
                self.phase = Phase::Failed(msg);
                false
            }
            None => {
                let msg = "Loader returned without completing".to_string();
                warn!("Session {}: {}", self.id, msg);
                self.store.set::<LoadChannel>(LoadStatus::Failed(msg.clone()));
                self.phase = Phase::Failed(msg);
                false
            }
        }
    }

    fn attach(&mut self, target: Option<Box<dyn RenderTarget>>) {
        let sink = RenderSinkAdapter::attach(&self.store);
        if let Some(target) = target {
            sink.set_target(target);
        }
        let controller = TimelineController::attach(&self.store, self.options.timeline, self.options.start_paused);
        let clock = controller.clock();
        self.phase = Phase::Running(Box::new(Running { controller, clock, sink }));

        self.store.set::<TimelineChannel>(self.options.start_value);
        info!("Session {} running", self.id);
    }

    /// Per-frame entry point. Returns autoplay steps taken.
    pub fn tick(&self, dt: f64) -> usize {
        match &self.phase {
            Phase::Running(running) => running.clock.tick(dt),
            _ => 0,
        }
    }

    /// Detach everything this session registered. Idempotent.
    pub fn teardown(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Ended) {
            Phase::Running(mut running) => {
                running.controller.detach();
                running.sink.detach();
                info!("Session {} ended at {}", self.id, running.controller.current_value());
            }
            Phase::Ended => {}
            Phase::Idle | Phase::Failed(_) => debug!("Session {} ended", self.id),
        }
    }

    // === Accessors ===

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn phase(&self) -> SessionPhase {
        match self.phase {
            Phase::Idle => SessionPhase::Idle,
            Phase::Running(_) => SessionPhase::Running,
            Phase::Failed(_) => SessionPhase::Failed,
            Phase::Ended => SessionPhase::Ended,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase() == SessionPhase::Running
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn controller(&self) -> Option<&TimelineController> {
        match &self.phase {
            Phase::Running(running) => Some(&running.controller),
            _ => None,
        }
    }

    pub fn sink(&self) -> Option<&RenderSinkAdapter> {
        match &self.phase {
            Phase::Running(running) => Some(&running.sink),
            _ => None,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("options", &self.options)
            .finish()
    }
}
