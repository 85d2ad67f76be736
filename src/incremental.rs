//! Cursor-driven incremental runs.
//!
//! [`IncrementalPipeline`] wraps the collect → transform → emit flow in a
//! paging-token protocol so that a job can be re-run and pick up where the last
//! successful run stopped:
//!
//! 1. read the cursor stored under the run id (a missing key means "start from
//!    the initial cursor");
//! 2. [`Collector::collect`] a batch from that cursor and receive the next cursor;
//! 3. [`Translator::translate`] every record, in order;
//! 4. [`Encoder::serialize`] the translated batch to bytes;
//! 5. [`Emitter::emit`] the bytes;
//! 6. store the next cursor under the run id.
//!
//! The cursor is written last, so a failure in steps 2–5 leaves it untouched and
//! the next run collects the same batch again. Delivery is at-least-once: if
//! step 6 itself fails the data is already out and a retry emits it a second
//! time ([`EtlError::CursorWrite`]). Runs sharing a run id must not overlap; the
//! caller is responsible for serializing them.
//!
//! ```
//! use ironflow::incremental::{infallible, IncrementalPipeline};
//! use ironflow::io::{InMemoryStateStore, SliceCollector, JsonlEncoder};
//! use ironflow::testing::RecordingEmitter;
//! use ironflow::StateStore;
//!
//! let store = InMemoryStateStore::new();
//! store.set("letters", "0").unwrap();
//! let emitter = RecordingEmitter::new();
//!
//! let pipeline = IncrementalPipeline::new(
//!     store.clone(),
//!     SliceCollector::new(vec!["a", "b", "c", "d"], 2),
//!     infallible(|s: &str| s.to_uppercase()),
//!     JsonlEncoder::new(),
//!     emitter.clone(),
//! );
//!
//! pipeline.execute("letters").unwrap();
//! assert_eq!(store.get("letters").unwrap(), "2");
//! assert_eq!(emitter.payloads()[0], b"\"A\"\n\"B\"\n".to_vec());
//! ```

use crate::batch::Batch;
use crate::config::PipelineConfig;
use crate::error::{EtlError, StateStoreError};
use anyhow::{Context, Result};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// Pulls one page of records starting at a cursor.
pub trait Collector<T>: Send + Sync {
    /// Return the records after `cursor` and the cursor to resume from next time.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or the cursor is invalid.
    fn collect(&self, cursor: &str) -> Result<(Batch<T>, String)>;
}

impl<T, C: Collector<T> + ?Sized> Collector<T> for Arc<C> {
    fn collect(&self, cursor: &str) -> Result<(Batch<T>, String)> {
        (**self).collect(cursor)
    }
}

/// Converts one collected record into the emitted model.
///
/// Any `Fn(T) -> anyhow::Result<V>` closure is a translator; wrap infallible
/// functions with [`infallible`].
pub trait Translator<T, V>: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the record cannot be translated.
    fn translate(&self, record: T) -> Result<V>;
}

impl<T, V, F> Translator<T, V> for F
where
    F: Fn(T) -> Result<V> + Send + Sync,
{
    fn translate(&self, record: T) -> Result<V> {
        self(record)
    }
}

/// Adapt a translation that cannot fail.
pub fn infallible<T, V, F>(f: F) -> impl Translator<T, V>
where
    F: Fn(T) -> V + Send + Sync,
{
    move |record: T| -> Result<V> { Ok(f(record)) }
}

/// Serializes a translated batch into one blob.
pub trait Encoder<T>: Send + Sync {
    /// Encode `records`. An empty slice must still produce a valid encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be represented in the output format.
    fn serialize(&self, records: &[T]) -> Result<Vec<u8>>;
}

impl<T, E: Encoder<T> + ?Sized> Encoder<T> for Arc<E> {
    fn serialize(&self, records: &[T]) -> Result<Vec<u8>> {
        (**self).serialize(records)
    }
}

/// Delivers an encoded blob somewhere durable.
pub trait Emitter: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the blob was not delivered.
    fn emit(&self, data: &[u8]) -> Result<()>;
}

impl<E: Emitter + ?Sized> Emitter for Arc<E> {
    fn emit(&self, data: &[u8]) -> Result<()> {
        (**self).emit(data)
    }
}

/// Key-value storage for cursors, one entry per run id.
pub trait StateStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`StateStoreError::NotFound`] if nothing is stored under `key`,
    /// or [`StateStoreError::Backend`] for any other failure.
    fn get(&self, key: &str) -> Result<String, StateStoreError>;

    /// # Errors
    ///
    /// Returns [`StateStoreError::Backend`] if the value could not be stored.
    fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError>;
}

impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    fn get(&self, key: &str) -> Result<String, StateStoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        (**self).set(key, value)
    }
}

/// Result of one successful incremental run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: String,
    /// Cursor the batch was collected from.
    pub cursor_read: String,
    /// Cursor stored for the next run.
    pub cursor_written: String,
    /// Records collected (and translated).
    pub records: usize,
    /// Size of the emitted blob.
    pub bytes: usize,
}

/// Collector, translator, encoder and emitter driven by a stored cursor.
pub struct IncrementalPipeline<T, V, S, C, Tr, E, Em> {
    store: S,
    collector: C,
    translator: Tr,
    encoder: E,
    emitter: Em,
    initial_cursor: String,
    config: PipelineConfig,
    _t: PhantomData<fn(T) -> V>,
}

impl<T, V, S, C, Tr, E, Em> IncrementalPipeline<T, V, S, C, Tr, E, Em>
where
    S: StateStore,
    C: Collector<T>,
    Tr: Translator<T, V>,
    E: Encoder<V>,
    Em: Emitter,
{
    pub fn new(store: S, collector: C, translator: Tr, encoder: E, emitter: Em) -> Self {
        Self {
            store,
            collector,
            translator,
            encoder,
            emitter,
            initial_cursor: String::new(),
            config: PipelineConfig::default(),
            _t: PhantomData,
        }
    }

    /// Cursor to collect from when the store has nothing for the run id.
    /// Defaults to the empty string.
    #[must_use]
    pub fn with_initial_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.initial_cursor = cursor.into();
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one collect → translate → serialize → emit cycle for `run_id` and
    /// advance its cursor.
    ///
    /// # Errors
    ///
    /// Any error other than [`EtlError::CursorWrite`] leaves the stored cursor as
    /// it was. `CursorWrite` means the data was emitted but the cursor did not
    /// advance, so the next run will emit the same batch again.
    pub fn execute(&self, run_id: &str) -> Result<RunOutcome, EtlError> {
        let span = tracing::info_span!("incremental_run", pipeline = %self.config.name, run_id);
        let _guard = span.enter();
        let started = Instant::now();

        let cursor_read = match self.store.get(run_id) {
            Ok(cursor) => cursor,
            Err(e) if e.is_not_found() => {
                tracing::debug!(initial = %self.initial_cursor, "no stored cursor, starting from the initial cursor");
                self.initial_cursor.clone()
            }
            Err(source) => {
                return Err(fail(EtlError::CursorRead {
                    run_id: run_id.to_string(),
                    source,
                }));
            }
        };

        let (records, cursor_written) = self
            .collector
            .collect(&cursor_read)
            .with_context(|| format!("collect from cursor `{cursor_read}`"))
            .map_err(|e| fail(EtlError::Collect(e)))?;
        let count = records.len();
        tracing::debug!(cursor = %cursor_read, next = %cursor_written, records = count, "collected");

        let mut translated = Vec::with_capacity(count);
        for (i, record) in records.into_iter().enumerate() {
            let v = self
                .translator
                .translate(record)
                .with_context(|| format!("translate record {i}"))
                .map_err(|e| fail(EtlError::Transform(e)))?;
            translated.push(v);
        }

        let bytes = self
            .encoder
            .serialize(&translated)
            .map_err(|e| fail(EtlError::Serialize(e)))?;

        self.emitter
            .emit(&bytes)
            .map_err(|e| fail(EtlError::Emit(e)))?;

        self.store.set(run_id, &cursor_written).map_err(|source| {
            fail(EtlError::CursorWrite {
                run_id: run_id.to_string(),
                cursor: cursor_written.clone(),
                source,
            })
        })?;

        tracing::info!(
            cursor_read = %cursor_read,
            cursor_written = %cursor_written,
            records = count,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "incremental run complete"
        );
        Ok(RunOutcome {
            run_id: run_id.to_string(),
            cursor_read,
            cursor_written,
            records: count,
            bytes: bytes.len(),
        })
    }
}

fn fail(err: EtlError) -> EtlError {
    if err.data_was_emitted() {
        tracing::error!(step = err.step(), error = %err, "data emitted but cursor not advanced; the next run will emit this batch again");
    } else {
        tracing::error!(step = err.step(), error = %err, "incremental run failed, cursor unchanged");
    }
    err
}
