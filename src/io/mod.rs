//! Reference collaborators for [`IncrementalPipeline`](crate::IncrementalPipeline).
//!
//! ### Overview
//! - State stores: [`InMemoryStateStore`], [`FileStateStore`]
//! - Collectors: [`SliceCollector`]
//! - Encoders: [`ParquetEncoder`] (feature `io-parquet`), [`JsonlEncoder`] (feature `io-jsonl`)
//! - Emitters: [`StdoutEmitter`], [`WriterEmitter`], [`FileEmitter`], [`DirectoryEmitter`]
//!
//! Real deployments usually bring their own collector, emitter and store; these
//! cover local runs and tests.

pub mod emit;
pub mod file_store;
pub mod memory;
pub mod slice;

#[cfg_attr(docsrs, doc(cfg(feature = "io-jsonl")))]
#[cfg(feature = "io-jsonl")]
pub mod jsonl;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod parquet;

pub use emit::{DirectoryEmitter, FileEmitter, StdoutEmitter, WriterEmitter};
pub use file_store::FileStateStore;
pub use memory::InMemoryStateStore;
pub use slice::SliceCollector;

#[cfg(feature = "io-jsonl")]
pub use jsonl::{JsonlEncoder, decode_jsonl};

#[cfg(feature = "io-parquet")]
pub use parquet::{ParquetEncoder, decode_parquet, read_parquet_bytes};
