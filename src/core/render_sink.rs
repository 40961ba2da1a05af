//! Render sink: pushes the segment-snapped timeline value into an external entity.
//!
//! The entity lives outside the viewer and may be torn down or disabled at
//! any moment. Missing or disabled targets are skipped silently; that is a
//! normal transient state, not an error.

use super::channels::DisplayChannel;
use super::event_store::{EventStore, Listener};
use super::timeline::TimelineFrame;
use log::{debug, trace};
use std::sync::{Arc, Mutex};

/// Component on the entity that consumes the dynamic state value.
pub trait Renderable: Send {
    fn is_enabled(&self) -> bool;
    fn apply_dynamic_state(&mut self, value: f64);
}

/// Scene entity handle owning an optional [`Renderable`].
pub trait RenderTarget: Send {
    /// Owning node enabled flag
    fn is_enabled(&self) -> bool;
    fn renderable_mut(&mut self) -> Option<&mut dyn Renderable>;
}

/// Forward `value` to the target's renderable if the whole chain is present
/// and enabled. Returns true if the value was applied.
pub fn apply_dynamic_to_entity(target: Option<&mut (dyn RenderTarget + '_)>, value: f64) -> bool {
    let Some(target) = target else {
        return false;
    };
    if !target.is_enabled() {
        return false;
    }
    let Some(renderable) = target.renderable_mut() else {
        return false;
    };
    if !renderable.is_enabled() {
        return false;
    }
    renderable.apply_dynamic_state(value);
    true
}

type TargetSlot = Arc<Mutex<Option<Box<dyn RenderTarget>>>>;

/// Subscribes to [`DisplayChannel`] and applies `segment_value` to whatever
/// target is currently attached.
pub struct RenderSinkAdapter {
    store: EventStore,
    slot: TargetSlot,
    listener: Listener<TimelineFrame>,
    attached: bool,
}

impl RenderSinkAdapter {
    pub fn attach(store: &EventStore) -> Self {
        let slot: TargetSlot = Arc::new(Mutex::new(None));
        let listener = {
            let slot = Arc::clone(&slot);
            Listener::new(move |frame: &TimelineFrame| {
                let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
                let applied = apply_dynamic_to_entity(guard.as_deref_mut(), frame.segment_value);
                if !applied {
                    trace!("Render sink skipped {} (no enabled target)", frame.segment_value);
                }
            })
        };
        store.on::<DisplayChannel>(&listener);
        Self {
            store: store.clone(),
            slot,
            listener,
            attached: true,
        }
    }

    /// Install a target, replacing any previous one. Returns the old target.
    pub fn set_target(&self, target: Box<dyn RenderTarget>) -> Option<Box<dyn RenderTarget>> {
        debug!("Render target attached");
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).replace(target)
    }

    /// Remove the target; later frames are skipped.
    pub fn take_target(&self) -> Option<Box<dyn RenderTarget>> {
        debug!("Render target detached");
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub fn has_target(&self) -> bool {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// Run `f` against the attached target, if any.
    pub fn with_target<R>(&self, f: impl FnOnce(&mut dyn RenderTarget) -> R) -> Option<R> {
        let mut guard = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_deref_mut().map(|target| f(target))
    }

    pub fn detach(&mut self) {
        if self.attached {
            self.store.off::<DisplayChannel>(&self.listener);
            self.attached = false;
        }
    }
}

impl Drop for RenderSinkAdapter {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Plain in-memory entity: node + one renderable, both toggleable.
///
/// Used by the headless runner and tests.
#[derive(Debug, Clone, Default)]
pub struct SimpleEntity {
    pub node_enabled: bool,
    pub renderable: Option<SimpleRenderable>,
}

#[derive(Debug, Clone, Default)]
pub struct SimpleRenderable {
    pub enabled: bool,
    pub dynamic_state: Option<f64>,
    pub applied_count: usize,
}

impl SimpleEntity {
    pub fn enabled() -> Self {
        Self {
            node_enabled: true,
            renderable: Some(SimpleRenderable {
                enabled: true,
                ..Default::default()
            }),
        }
    }

    pub fn dynamic_state(&self) -> Option<f64> {
        self.renderable.as_ref().and_then(|r| r.dynamic_state)
    }
}

impl Renderable for SimpleRenderable {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn apply_dynamic_state(&mut self, value: f64) {
        self.dynamic_state = Some(value);
        self.applied_count += 1;
    }
}

impl RenderTarget for SimpleEntity {
    fn is_enabled(&self) -> bool {
        self.node_enabled
    }

    fn renderable_mut(&mut self) -> Option<&mut dyn Renderable> {
        self.renderable.as_mut().map(|r| r as &mut dyn Renderable)
    }
}
