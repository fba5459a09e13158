use std::num::NonZeroUsize;

use crate::error::{Error, Result};
use crate::source::SEGMENT_SIZE;

/// What to do with a line that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMalformed {
    /// Fail the whole run; a dropped record would silently skew the results.
    #[default]
    Abort,
    /// Log the line, count it, and keep going.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Size of the worker pool and number of slices the input is cut into.
    pub workers: usize,
    /// Upper bound, in bytes, of the newline-aligned unit of work.
    pub segment_size: usize,
    pub on_malformed: OnMalformed,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            segment_size: SEGMENT_SIZE,
            on_malformed: OnMalformed::Abort,
        }
    }
}

impl Config {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size;
        self
    }

    pub fn with_on_malformed(mut self, on_malformed: OnMalformed) -> Self {
        self.on_malformed = on_malformed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1"));
        }
        if self.segment_size == 0 {
            return Err(Error::InvalidConfig("segment size must be at least 1 byte"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid_and_aborts() {
        let config = Config::default();
        config.validate().unwrap();
        assert!(config.workers >= 1);
        assert_eq!(config.segment_size, SEGMENT_SIZE);
        assert_eq!(config.on_malformed, OnMalformed::Abort);
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(matches!(
            Config::default().with_workers(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            Config::default().with_segment_size(0).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }
}
