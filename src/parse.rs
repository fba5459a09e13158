use memchr::memchr;

use crate::error::RecordError;

/// One parsed line. Borrows the station name from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub station: &'a str,
    /// Temperature in tenths of a degree.
    pub tenths: i32,
}

/// Parses `station;reading` (without the trailing newline), splitting on the
/// first `;`.
#[inline]
pub fn parse_record(line: &[u8]) -> Result<Record<'_>, RecordError> {
    if line.is_empty() {
        return Err(RecordError::BlankLine);
    }
    let semicolon = memchr(b';', line).ok_or(RecordError::MissingDelimiter)?;
    let (station, reading) = (&line[..semicolon], &line[semicolon + 1..]);
    if station.is_empty() {
        return Err(RecordError::EmptyStation);
    }
    let station = std::str::from_utf8(station).map_err(|_| RecordError::InvalidUtf8)?;
    let tenths = parse_tenths(reading)?;
    Ok(Record { station, tenths })
}

/// Parses `-?\d+\.\d` digit by digit into tenths, so `-12.3` becomes `-123`.
#[inline]
pub fn parse_tenths(reading: &[u8]) -> Result<i32, RecordError> {
    let (negative, digits) = match reading.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, reading),
    };
    let [whole @ .., b'.', fraction] = digits else {
        return Err(RecordError::InvalidReading);
    };
    if whole.is_empty() || !whole.iter().all(u8::is_ascii_digit) || !fraction.is_ascii_digit() {
        return Err(RecordError::InvalidReading);
    }

    let mut value: i64 = 0;
    for &digit in whole.iter().chain(std::iter::once(fraction)) {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(i64::from(digit - b'0')))
            .ok_or(RecordError::ReadingOutOfRange)?;
    }
    if negative {
        value = -value;
    }
    i32::try_from(value).map_err(|_| RecordError::ReadingOutOfRange)
}
