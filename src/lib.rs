//! Minimizer-based overlap engine for long, noisy reads.
//!
//! Targets are sketched into bit-packed minimizers and gathered into a
//! sharded inverted index; queries probe the index for seed matches, which
//! are chained into approximate overlaps reported with intervals on both
//! sides, a score and a relative-strand flag.

pub mod cfg;
pub mod chain;
pub mod cli;
pub mod codec;
pub mod engine;
pub mod error;
pub mod index;
pub mod io;
pub mod sketch;
pub mod types;
pub mod utils;

pub use cfg::{EngineCfg, Preset};
pub use engine::Engine;
pub use error::{Error, Result};
pub use sketch::SketchOpts;
pub use types::{Overlap, Sequence};
