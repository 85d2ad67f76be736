//! Recording and failing stand-ins for sinks, emitters, collectors and stores.
//!
//! Recording doubles are `Clone` and share their log between clones, so one
//! clone can go into a pipeline while the test keeps another to inspect.

use crate::batch::Batch;
use crate::error::StateStoreError;
use crate::incremental::{Collector, Emitter, StateStore};
use crate::io::InMemoryStateStore;
use crate::sink::Sink;
use crate::state::PipelineState;
use anyhow::{Result, anyhow};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sink that keeps every batch it receives.
#[derive(Debug)]
pub struct RecordingSink<T> {
    batches: Arc<Mutex<Vec<Batch<T>>>>,
}

impl<T> Clone for RecordingSink<T> {
    fn clone(&self) -> Self {
        Self {
            batches: Arc::clone(&self.batches),
        }
    }
}

impl<T> Default for RecordingSink<T> {
    fn default() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> RecordingSink<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch received so far, in arrival order.
    #[must_use]
    pub fn batches(&self) -> Vec<Batch<T>> {
        lock(&self.batches).clone()
    }

    /// All received elements, concatenated.
    #[must_use]
    pub fn elements(&self) -> Vec<T> {
        lock(&self.batches).iter().flatten().cloned().collect()
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.batches).len()
    }
}

impl<T: Send> Sink<T> for RecordingSink<T> {
    fn consume(&self, _state: &PipelineState, batch: Batch<T>) -> Result<()> {
        lock(&self.batches).push(batch);
        Ok(())
    }
}

/// Sink that counts its calls and always fails with `message`.
#[derive(Clone, Debug)]
pub struct FailingSink {
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T> Sink<T> for FailingSink {
    fn consume(&self, _state: &PipelineState, _batch: Batch<T>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("{}", self.message))
    }
}

/// Emitter that keeps every payload it is given.
#[derive(Clone, Debug, Default)]
pub struct RecordingEmitter {
    payloads: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        lock(&self.payloads).clone()
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.payloads).len()
    }
}

impl Emitter for RecordingEmitter {
    fn emit(&self, data: &[u8]) -> Result<()> {
        lock(&self.payloads).push(data.to_vec());
        Ok(())
    }
}

/// Emitter that counts its calls and always fails.
#[derive(Clone, Debug, Default)]
pub struct FailingEmitter {
    calls: Arc<AtomicUsize>,
}

impl FailingEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Emitter for FailingEmitter {
    fn emit(&self, data: &[u8]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("emitter unavailable ({} bytes dropped)", data.len()))
    }
}

/// Wraps a collector and records the cursor of every call.
#[derive(Debug)]
pub struct RecordingCollector<C> {
    inner: C,
    cursors: Arc<Mutex<Vec<String>>>,
}

impl<C> RecordingCollector<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cursors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Cursors requested so far, in call order.
    #[must_use]
    pub fn cursors(&self) -> Vec<String> {
        lock(&self.cursors).clone()
    }
}

impl<C: Clone> Clone for RecordingCollector<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            cursors: Arc::clone(&self.cursors),
        }
    }
}

impl<T, C: Collector<T>> Collector<T> for RecordingCollector<C> {
    fn collect(&self, cursor: &str) -> Result<(Batch<T>, String)> {
        lock(&self.cursors).push(cursor.to_string());
        self.inner.collect(cursor)
    }
}

/// Which [`StateStore`] call a [`FailingStateStore`] rejects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailOn {
    Get,
    Set,
}

/// An [`InMemoryStateStore`] whose `get` or `set` fails with a backend error.
#[derive(Clone, Debug)]
pub struct FailingStateStore {
    inner: InMemoryStateStore,
    fail_on: FailOn,
}

impl FailingStateStore {
    #[must_use]
    pub fn new(inner: InMemoryStateStore, fail_on: FailOn) -> Self {
        Self { inner, fail_on }
    }

    /// The wrapped store, for inspecting what was (not) written.
    #[must_use]
    pub fn inner(&self) -> &InMemoryStateStore {
        &self.inner
    }
}

impl StateStore for FailingStateStore {
    fn get(&self, key: &str) -> Result<String, StateStoreError> {
        if self.fail_on == FailOn::Get {
            return Err(StateStoreError::backend(anyhow!("state store offline reading `{key}`")));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        if self.fail_on == FailOn::Set {
            return Err(StateStoreError::backend(anyhow!(
                "state store offline writing `{key}` = `{value}`"
            )));
        }
        self.inner.set(key, value)
    }
}
