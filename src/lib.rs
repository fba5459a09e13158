//! Min/mean/max temperature per station over a `station;reading` file.
//!
//! Readings are kept as integer tenths end to end. Each worker folds its
//! slice of the input into a private table, and the tables are merged once
//! when every worker is done. The result is printed sorted by station name:
//!
//! ```
//! use brc_aggregate::{Config, Pipeline};
//!
//! let mut out = Vec::new();
//! Pipeline::new(Config::default())?
//!     .run_reader("A;10.0\nB;-5.5\nA;20.0\n".as_bytes(), &mut out)?;
//! assert_eq!(out, b"A=10.0/15.0/20.0\nB=-5.5/-5.5/-5.5\n");
//! # Ok::<(), brc_aggregate::Error>(())
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod summary;

pub use aggregate::{Aggregation, Aggregator, CancelToken, Ingested, RunStats};
pub use config::{Config, OnMalformed};
pub use error::{Error, RecordError, Result};
pub use pipeline::{Phase, PhaseObserver, Pipeline, Silent};
pub use report::{Report, Tenths};
pub use source::{ChunkReader, MappedFile};
pub use summary::{AggregationTable, StationSummary};
