//! Parallel aggregation: each worker folds its own slice of the input into a
//! private [`AggregationTable`], and the partial tables are merged once at the
//! end with a reduction tree.

use std::io::Read;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::{Config, OnMalformed};
use crate::error::{Error, Result};
use crate::parse::parse_record;
use crate::source::{partition, ChunkReader, Lines, Segments};
use crate::summary::AggregationTable;

/// Cooperative cancellation shared between the caller and the workers.
///
/// Workers check it between segments; a cancelled run discards everything it
/// has aggregated and fails with [`Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters describing a run. `stations` is only known once the partial
/// tables have been merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub lines: u64,
    pub skipped: u64,
    pub stations: usize,
    pub workers: usize,
}

/// One worker's private state.
#[derive(Debug, Default)]
struct Partial {
    table: AggregationTable,
    lines: u64,
    skipped: u64,
}

impl Partial {
    fn absorb(&mut self, other: Partial) -> Result<()> {
        self.table = std::mem::take(&mut self.table).merge(other.table)?;
        self.lines += other.lines;
        self.skipped += other.skipped;
        Ok(())
    }
}

/// Output of the ingest phase: every line has been folded into some partial
/// table, none have been merged yet.
#[derive(Debug)]
pub struct Ingested {
    parts: Vec<Partial>,
}

impl Ingested {
    pub fn lines(&self) -> u64 {
        self.parts.iter().map(|part| part.lines).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.parts.iter().map(|part| part.skipped).sum()
    }

    /// Number of partial tables waiting to be merged.
    pub fn partials(&self) -> usize {
        self.parts.len()
    }
}

/// Output of the merge phase: the authoritative table.
#[derive(Debug)]
pub struct Aggregation {
    pub table: AggregationTable,
    pub stats: RunStats,
}

pub struct Aggregator {
    config: Config,
    pool: rayon::ThreadPool,
    cancel: CancelToken,
}

impl Aggregator {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|index| format!("brc-worker-{index}"))
            .build()?;
        Ok(Aggregator {
            config,
            pool,
            cancel: CancelToken::default(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingests an in-memory (usually memory-mapped) input. The bytes are cut
    /// into one newline-aligned range per worker, and each worker walks its
    /// range segment by segment.
    pub fn ingest_bytes(&self, data: &[u8]) -> Result<Ingested> {
        let ranges = partition(data, self.config.workers);
        debug!(bytes = data.len(), ranges = ranges.len(), "partitioned input");

        // Index of the earliest range that failed; later ranges give up early
        // since only the first error in file order is reported.
        let first_failure = AtomicUsize::new(usize::MAX);
        let results: Vec<Result<Partial>> = self.pool.install(|| {
            ranges
                .into_par_iter()
                .enumerate()
                .map(|(index, range)| {
                    let result = self.fold_range(data, range, index, &first_failure);
                    if result.is_err() {
                        first_failure.fetch_min(index, Ordering::Relaxed);
                    }
                    result
                })
                .collect()
        });
        let parts = resolve(results, 0)?;
        Ok(Ingested { parts })
    }

    /// Ingests any stream. Up to `workers` chunks are read ahead and folded in
    /// parallel, then merged into a running table before the next batch is
    /// read, which keeps memory bounded by `workers * segment_size`.
    pub fn ingest_reader<R: Read>(&self, reader: R) -> Result<Ingested> {
        let mut chunks = ChunkReader::new(reader, self.config.segment_size);
        let mut total = Partial::default();
        let mut batches = 0u64;
        loop {
            let batch = chunks
                .by_ref()
                .take(self.config.workers)
                .collect::<Result<Vec<_>>>()?;
            if batch.is_empty() {
                break;
            }
            self.check_cancelled()?;
            let results: Vec<Result<Partial>> = self.pool.install(|| {
                batch
                    .par_iter()
                    .map(|chunk| {
                        let mut partial = Partial::default();
                        self.fold_segment(&mut partial, chunk.offset, &chunk.data)?;
                        Ok(partial)
                    })
                    .collect()
            });
            for part in resolve(results, total.lines)? {
                total.absorb(part)?;
            }
            batches += 1;
        }
        debug!(batches, lines = total.lines, "streamed input");
        Ok(Ingested { parts: vec![total] })
    }

    /// Merges the partial tables into one. Merge order does not affect the
    /// result, so the partials are combined pairwise in parallel.
    pub fn merge(&self, ingested: Ingested) -> Result<Aggregation> {
        self.check_cancelled()?;
        let lines = ingested.lines();
        let skipped = ingested.skipped();
        let table = self.pool.install(|| {
            ingested
                .parts
                .into_par_iter()
                .map(|part| Ok::<_, Error>(part.table))
                .try_reduce(AggregationTable::new, AggregationTable::merge)
        })?;
        self.check_cancelled()?;
        let stats = RunStats {
            lines,
            skipped,
            stations: table.len(),
            workers: self.config.workers,
        };
        Ok(Aggregation { table, stats })
    }

    /// Both phases back to back.
    pub fn aggregate_bytes(&self, data: &[u8]) -> Result<Aggregation> {
        self.merge(self.ingest_bytes(data)?)
    }

    pub fn aggregate_reader<R: Read>(&self, reader: R) -> Result<Aggregation> {
        self.merge(self.ingest_reader(reader)?)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn fold_range(
        &self,
        data: &[u8],
        range: Range<usize>,
        index: usize,
        first_failure: &AtomicUsize,
    ) -> Result<Partial> {
        let mut partial = Partial::default();
        for (offset, segment) in Segments::new(data, range, self.config.segment_size) {
            if first_failure.load(Ordering::Relaxed) < index {
                return Err(Error::Cancelled);
            }
            self.check_cancelled()?;
            self.fold_segment(&mut partial, offset as u64, segment)?;
        }
        Ok(partial)
    }

    /// Parses every line of `segment` into `partial`. Line numbers in errors
    /// count from the first line this partial saw.
    #[inline]
    fn fold_segment(&self, partial: &mut Partial, base: u64, segment: &[u8]) -> Result<()> {
        for (at, line) in Lines::new(segment) {
            partial.lines += 1;
            match parse_record(line) {
                Ok(record) => partial.table.record(record.station, record.tenths)?,
                Err(reason) => match self.config.on_malformed {
                    OnMalformed::Abort => {
                        return Err(Error::malformed(partial.lines, base + at as u64, line, reason));
                    }
                    OnMalformed::Skip => {
                        partial.skipped += 1;
                        warn!(
                            offset = base + at as u64,
                            %reason,
                            line = %String::from_utf8_lossy(line),
                            "skipping malformed record"
                        );
                    }
                },
            }
        }
        Ok(())
    }
}

/// Returns the partials in order, or the first error in input order with its
/// line number made absolute. `preceding` is the number of lines before the
/// first result.
fn resolve(results: Vec<Result<Partial>>, mut preceding: u64) -> Result<Vec<Partial>> {
    let mut parts = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(part) => {
                preceding += part.lines;
                parts.push(part);
            }
            Err(e) => return Err(e.after_lines(preceding)),
        }
    }
    Ok(parts)
}
