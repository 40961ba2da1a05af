//! Asset loading collaborator.
//!
//! A loader reports zero or more progress units, then exactly one completion
//! carrying an optional error. The viewer only starts the timeline after a
//! successful completion; a failure is terminal for the session (no retry).

use super::channels::LoadChannel;
use super::event_store::EventStore;
use anyhow::{Context, Error, anyhow};
use log::{debug, info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Default read size for [`FileLoader`]; one progress unit per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Loader state as published on [`LoadChannel`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum LoadStatus {
    Loading { units: usize },
    Ready { units: usize },
    Failed(String),
}

impl LoadStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadStatus::Loading { .. })
    }
}

/// Receives loader notifications.
pub trait LoadObserver {
    fn on_progress(&mut self);
    fn on_complete(&mut self, error: Option<Error>);
}

pub trait AssetLoader {
    /// Run the load, reporting to `observer`. Must call `on_complete` once.
    fn load(&mut self, observer: &mut dyn LoadObserver);
}

/// Observer that mirrors loader notifications onto the store.
#[derive(Debug)]
pub struct StoreLoadObserver {
    store: EventStore,
    units: usize,
    outcome: Option<Result<(), String>>,
}

impl StoreLoadObserver {
    pub fn new(store: &EventStore) -> Self {
        store.set::<LoadChannel>(LoadStatus::Loading { units: 0 });
        Self {
            store: store.clone(),
            units: 0,
            outcome: None,
        }
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Completion result; None while the loader has not completed.
    pub fn outcome(&self) -> Option<&Result<(), String>> {
        self.outcome.as_ref()
    }
}

impl LoadObserver for StoreLoadObserver {
    fn on_progress(&mut self) {
        if self.outcome.is_some() {
            warn!("Load progress after completion ignored");
            return;
        }
        self.units += 1;
        self.store.set::<LoadChannel>(LoadStatus::Loading { units: self.units });
    }

    fn on_complete(&mut self, error: Option<Error>) {
        if self.outcome.is_some() {
            warn!("Duplicate load completion ignored");
            return;
        }
        let status = match error {
            None => {
                info!("Asset loaded ({} units)", self.units);
                self.outcome = Some(Ok(()));
                LoadStatus::Ready { units: self.units }
            }
            Some(e) => {
                let msg = format!("{:#}", e);
                warn!("Asset load failed: {}", msg);
                self.outcome = Some(Err(msg.clone()));
                LoadStatus::Failed(msg)
            }
        };
        self.store.set::<LoadChannel>(status);
    }
}

/// Completes immediately with no progress. For sessions without an asset.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLoader;

impl AssetLoader for NullLoader {
    fn load(&mut self, observer: &mut dyn LoadObserver) {
        observer.on_complete(None);
    }
}

/// Reads an asset file in chunks, one progress unit per chunk.
#[derive(Debug, Clone)]
pub struct FileLoader {
    path: PathBuf,
    chunk_size: usize,
    bytes_read: usize,
}

impl FileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            bytes_read: 0,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    fn read_all(&mut self, observer: &mut dyn LoadObserver) -> anyhow::Result<()> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open asset: {}", self.path.display()))?;
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file
                .read(&mut buf)
                .with_context(|| format!("Failed to read asset: {}", self.path.display()))?;
            if n == 0 {
                break;
            }
            self.bytes_read += n;
            observer.on_progress();
        }
        if self.bytes_read == 0 {
            return Err(anyhow!("Asset is empty: {}", self.path.display()));
        }
        Ok(())
    }
}

impl AssetLoader for FileLoader {
    fn load(&mut self, observer: &mut dyn LoadObserver) {
        debug!("Loading asset {} ({} byte chunks)", self.path.display(), self.chunk_size);
        self.bytes_read = 0;
        let result = self.read_all(observer);
        observer.on_complete(result.err());
    }
}
