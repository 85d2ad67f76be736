//! Testing utilities for ironflow pipelines.
//!
//! - **Assertions**: compare batches with expected results
//! - **Doubles**: recording and failing sinks, emitters, collectors and state stores
//!
//! # Quick Start
//!
//! ```
//! use ironflow::sink::Spread;
//! use ironflow::source::from_vec;
//! use ironflow::stage::map;
//! use ironflow::testing::*;
//! use ironflow::Pipeline;
//!
//! # fn main() -> anyhow::Result<()> {
//! let kept = RecordingSink::new();
//! let broken = FailingSink::new("disk full");
//! let fan_out = Spread::new().with(kept.clone()).with(broken.clone());
//!
//! let run = Pipeline::new(from_vec(vec![1, 2, 3]), map(|x: i32| x * 2), fan_out).execute();
//!
//! assert!(run.is_err());
//! assert_eq!(broken.calls(), 1);
//! assert_collections_equal(&kept.elements(), &[2, 4, 6]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod doubles;

pub use assertions::*;
pub use doubles::*;
