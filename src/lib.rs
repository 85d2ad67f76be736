//! # Ironflow
//!
//! A small **composable pipeline toolkit** for batch ETL jobs. A job is a chain of
//! `Source → Stage → Sink` components, each typed by the elements it handles,
//! executed to completion in one call.
//!
//! ## Key Features
//!
//! - **Combinator algebra** - map, filter, flat_map, shuffle, count, sequencing
//! - **Positional joins** - four cardinality policies chosen from the batch lengths
//! - **Fan-out sinks** - one batch to many sinks, run concurrently, every failure reported
//! - **After-effects** - callbacks deferred until the sink has succeeded
//! - **Incremental runs** - cursor-driven collection that resumes where the last good run stopped
//! - **Encoders** - Parquet (schema derived from the Rust type) and JSON Lines, behind feature flags
//!
//! ## Quick Start
//!
//! ```
//! use ironflow::*;
//! use ironflow::source::from_vec;
//! use ironflow::stage::{filter, map, StageExt};
//! use ironflow::testing::RecordingSink;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let sink = RecordingSink::new();
//! let pipeline = Pipeline::new(
//!     from_vec(vec![1u32, 2, 3, 4]),
//!     map(|x: u32| x * 10).then(filter(|x: &u32| *x > 15)),
//!     sink.clone(),
//! );
//!
//! let summary = pipeline.execute()?;
//! assert_eq!(summary.emitted, 3);
//! assert_eq!(sink.elements(), vec![20, 30, 40]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pipeline
//!
//! A [`Pipeline`] wires one [`Source`], one [`Stage`] and one [`Sink`]. Each
//! [`execute`](Pipeline::execute) creates a fresh [`PipelineState`]: components
//! may register after-effects on it, and those run (concurrently) only after the
//! sink succeeded.
//!
//! ### Incremental pipeline
//!
//! An [`IncrementalPipeline`] reads a cursor from a [`StateStore`], collects one
//! page with a [`Collector`], translates each record, encodes the batch with an
//! [`Encoder`], hands the bytes to an [`Emitter`] and only then stores the next
//! cursor. A failed run can simply be re-run.
//!
//! ### Errors
//!
//! Components return [`anyhow::Result`]; the drivers report an [`EtlError`] naming
//! the step that failed. Concurrent groups (fan-out sinks, after-effects) report a
//! [`MultiError`] listing every failure.
//!
//! ## Module Overview
//!
//! - [`source`], [`stage`], [`sink`] - component traits and combinators
//! - [`join`] - positional joins
//! - [`state`] - per-run state and after-effects
//! - [`pipeline`] - the source/stage/sink driver
//! - [`incremental`] - the cursor-driven driver and its collaborator traits
//! - [`io`] - reference stores, collectors, encoders and emitters
//! - [`config`] - execution mode and run naming
//! - [`testing`] - assertions and test doubles

pub mod batch;
pub mod config;
pub mod error;
mod exec;
pub mod incremental;
pub mod io;
pub mod join;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod stage;
pub mod state;
pub mod testing;

pub use batch::Batch;
pub use config::{ExecMode, PipelineConfig};
pub use error::{EtlError, MultiError, StateStoreError};
pub use incremental::{
    Collector, Emitter, Encoder, IncrementalPipeline, RunOutcome, StateStore, Translator,
};
pub use join::{JoinKind, join_batches, join_sources, join_with};
pub use pipeline::{Phase, Pipeline, RunSummary};
pub use sink::{SequenceSink, Sink, Spread};
pub use source::Source;
pub use stage::{Stage, StageExt};
pub use state::PipelineState;
