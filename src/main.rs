use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use brc_aggregate::{Config, MappedFile, OnMalformed, Phase, PhaseObserver, Pipeline, RunStats};

#[derive(Parser, Debug)]
#[command(version, about = "Min/mean/max temperature per station")]
struct Cli {
    /// `station;reading` file, or `-` for stdin
    #[arg(default_value = "measurements.txt")]
    input: PathBuf,

    /// Worker threads [default: available parallelism]
    #[arg(short, long)]
    workers: Option<usize>,

    /// Bytes per unit of work
    #[arg(long)]
    segment_size: Option<usize>,

    /// Log and skip malformed lines instead of failing
    #[arg(long)]
    skip_malformed: bool,

    /// Stream the file through a buffered reader instead of mapping it
    #[arg(long)]
    no_mmap: bool,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(segment_size) = self.segment_size {
            config = config.with_segment_size(segment_size);
        }
        if self.skip_malformed {
            config = config.with_on_malformed(OnMalformed::Skip);
        }
        config
    }
}

/// Logs how long each phase took, and the total once the report is out.
struct PhaseTimer {
    start: Instant,
    last: Instant,
}

impl PhaseTimer {
    fn start() -> Self {
        let now = Instant::now();
        PhaseTimer {
            start: now,
            last: now,
        }
    }
}

impl PhaseObserver for PhaseTimer {
    fn phase_complete(&mut self, phase: Phase, stats: &RunStats) {
        let now = Instant::now();
        let elapsed: Duration = now - self.last;
        self.last = now;
        info!(?phase, ?elapsed, lines = stats.lines, "phase complete");
        if phase == Phase::Reported {
            info!(
                total = ?(now - self.start),
                stations = stats.stations,
                workers = stats.workers,
                "run complete"
            );
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut pipeline = Pipeline::new(cli.config())?.with_observer(PhaseTimer::start());
    let out = BufWriter::new(io::stdout().lock());

    if cli.input.as_os_str() == "-" {
        pipeline.run_reader(io::stdin().lock(), out)?;
    } else if cli.no_mmap {
        let file = File::open(&cli.input)
            .with_context(|| format!("opening {}", cli.input.display()))?;
        pipeline
            .run_reader(file, out)
            .with_context(|| format!("aggregating {}", cli.input.display()))?;
    } else {
        let file = MappedFile::open(&cli.input)?;
        pipeline
            .run_mapped(&file, out)
            .with_context(|| format!("aggregating {}", cli.input.display()))?;
    }
    Ok(())
}
