use std::io;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a single input line could not be turned into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("blank line")]
    BlankLine,
    #[error("missing `;` delimiter")]
    MissingDelimiter,
    #[error("empty station name")]
    EmptyStation,
    #[error("station name is not valid UTF-8")]
    InvalidUtf8,
    #[error("reading is not of the form `-?D+.D`")]
    InvalidReading,
    #[error("reading does not fit in 32-bit tenths")]
    ReadingOutOfRange,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("input unavailable: {context}")]
    InputUnavailable {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed record at line {line} (byte {offset}): {reason}: {content:?}")]
    MalformedRecord {
        line: u64,
        offset: u64,
        content: String,
        reason: RecordError,
    },
    #[error("arithmetic overflow while summarizing station {station:?}")]
    ArithmeticOverflow { station: String },
    #[error("run cancelled")]
    Cancelled,
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to write report")]
    Output(#[source] io::Error),
}

impl Error {
    pub(crate) fn input(context: impl Into<String>, source: io::Error) -> Self {
        Error::InputUnavailable {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn malformed(line: u64, offset: u64, content: &[u8], reason: RecordError) -> Self {
        Error::MalformedRecord {
            line,
            offset,
            content: String::from_utf8_lossy(content).into_owned(),
            reason,
        }
    }

    pub(crate) fn overflow(station: &str) -> Self {
        Error::ArithmeticOverflow {
            station: station.to_owned(),
        }
    }

    /// Workers number lines from the start of their own slice; this rebases
    /// a malformed-record line number onto the lines that precede the slice.
    pub(crate) fn after_lines(self, preceding: u64) -> Self {
        match self {
            Error::MalformedRecord {
                line,
                offset,
                content,
                reason,
            } => Error::MalformedRecord {
                line: line + preceding,
                offset,
                content,
                reason,
            },
            other => other,
        }
    }
}
