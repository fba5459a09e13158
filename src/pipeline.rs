use std::io::{Read, Write};

use tracing::info;

use crate::aggregate::{Aggregator, CancelToken, Ingested, RunStats};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::report::Report;
use crate::source::MappedFile;

/// Phase boundaries of a run, in the order they complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Every line has been parsed and folded into a worker's partial table.
    Ingested,
    /// Partial tables merged into the final table.
    Aggregated,
    /// Sorted report written and flushed.
    Reported,
}

/// Receives a signal whenever a phase completes, e.g. to time the run.
pub trait PhaseObserver {
    fn phase_complete(&mut self, phase: Phase, stats: &RunStats);
}

/// Observer that ignores every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl PhaseObserver for Silent {
    fn phase_complete(&mut self, _: Phase, _: &RunStats) {}
}

impl<F: FnMut(Phase, &RunStats)> PhaseObserver for F {
    fn phase_complete(&mut self, phase: Phase, stats: &RunStats) {
        self(phase, stats)
    }
}

/// Line source → parallel aggregator → sorted reporter.
pub struct Pipeline<O = Silent> {
    aggregator: Aggregator,
    observer: O,
}

impl Pipeline<Silent> {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Pipeline {
            aggregator: Aggregator::new(config)?,
            observer: Silent,
        })
    }
}

impl<O: PhaseObserver> Pipeline<O> {
    pub fn with_observer<P: PhaseObserver>(self, observer: P) -> Pipeline<P> {
        Pipeline {
            aggregator: self.aggregator,
            observer,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.aggregator = self.aggregator.with_cancel(cancel);
        self
    }

    pub fn run_mapped<W: Write>(&mut self, file: &MappedFile, out: W) -> Result<RunStats> {
        let ingested = self.aggregator.ingest_bytes(file.bytes())?;
        self.finish(ingested, out)
    }

    pub fn run_reader<R: Read, W: Write>(&mut self, reader: R, out: W) -> Result<RunStats> {
        let ingested = self.aggregator.ingest_reader(reader)?;
        self.finish(ingested, out)
    }

    fn finish<W: Write>(&mut self, ingested: Ingested, out: W) -> Result<RunStats> {
        let ingest_stats = RunStats {
            lines: ingested.lines(),
            skipped: ingested.skipped(),
            stations: 0,
            workers: self.aggregator.config().workers,
        };
        self.observer.phase_complete(Phase::Ingested, &ingest_stats);

        let aggregation = self.aggregator.merge(ingested)?;
        let stats = aggregation.stats;
        self.observer.phase_complete(Phase::Aggregated, &stats);

        let report = Report::new(aggregation.table);
        report.write_to(out).map_err(Error::Output)?;
        self.observer.phase_complete(Phase::Reported, &stats);

        if stats.skipped > 0 {
            info!(skipped = stats.skipped, lines = stats.lines, "skipped malformed records");
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn observer_sees_phases_in_order() {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        let stats = Pipeline::new(Config::default().with_workers(2))
            .unwrap()
            .with_observer(|phase: Phase, stats: &RunStats| seen.push((phase, stats.lines)))
            .run_reader(Cursor::new("A;10.0\nB;-5.5\nA;20.0\n"), &mut out)
            .unwrap();

        assert_eq!(stats.lines, 3);
        assert_eq!(stats.stations, 2);
        assert_eq!(
            seen,
            [(Phase::Ingested, 3), (Phase::Aggregated, 3), (Phase::Reported, 3)]
        );
        assert_eq!(out, b"A=10.0/15.0/20.0\nB=-5.5/-5.5/-5.5\n");
    }

    #[test]
    fn failed_run_writes_nothing_and_stops_signalling() {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        let result = Pipeline::new(Config::default())
            .unwrap()
            .with_observer(|phase: Phase, _: &RunStats| seen.push(phase))
            .run_reader(Cursor::new("A;1.0\nA;abc\n"), &mut out);

        assert!(matches!(result, Err(Error::MalformedRecord { line: 2, .. })));
        assert!(out.is_empty());
        assert!(seen.is_empty());
    }
}
