use hashbrown::HashMap;
use thiserror::Error;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("summary counters overflowed")]
pub struct Overflow;

/// Running min/sum/max/count of one station's readings, all in tenths.
///
/// A summary only exists once it has seen a reading, so `min` and `max` are
/// always defined and `count >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationSummary {
    count: u64,
    sum: i64,
    min: i32,
    max: i32,
}

impl StationSummary {
    pub fn new(tenths: i32) -> Self {
        StationSummary {
            count: 1,
            sum: i64::from(tenths),
            min: tenths,
            max: tenths,
        }
    }

    /// Rebuilds a summary from its parts, rejecting combinations that no set
    /// of readings could have produced.
    pub fn from_parts(count: u64, sum: i64, min: i32, max: i32) -> Option<Self> {
        let n = i128::from(count);
        let consistent = count >= 1
            && min <= max
            && i128::from(min) * n <= i128::from(sum)
            && i128::from(sum) <= i128::from(max) * n;
        consistent.then_some(StationSummary { count, sum, min, max })
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> i64 {
        self.sum
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    #[inline]
    pub fn record(&mut self, tenths: i32) -> Result<(), Overflow> {
        self.count = self.count.checked_add(1).ok_or(Overflow)?;
        self.sum = self.sum.checked_add(i64::from(tenths)).ok_or(Overflow)?;
        self.min = self.min.min(tenths);
        self.max = self.max.max(tenths);
        Ok(())
    }

    /// Folds `other` into `self` as if its readings had been recorded here.
    /// Commutative and associative, so partial summaries can be combined in
    /// any order.
    pub fn merge(&mut self, other: &StationSummary) -> Result<(), Overflow> {
        let count = self.count.checked_add(other.count).ok_or(Overflow)?;
        let sum = self.sum.checked_add(other.sum).ok_or(Overflow)?;
        *self = StationSummary {
            count,
            sum,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        };
        Ok(())
    }

    /// Mean in tenths, rounded half away from zero.
    ///
    /// Computed exactly on integers: the real mean `sum / count` (in tenths)
    /// is split into quotient and remainder, and the quotient moves one step
    /// away from zero when the remainder is at least half of `count`.
    pub fn mean_tenths(&self) -> i32 {
        let sum = i128::from(self.sum);
        let count = i128::from(self.count);
        let mut quotient = sum / count;
        let remainder = sum % count;
        if 2 * remainder.abs() >= count {
            quotient += sum.signum();
        }
        // min <= mean <= max, so the quotient always fits.
        quotient as i32
    }
}

/// Station name to summary.
#[derive(Debug, Clone, Default)]
pub struct AggregationTable {
    stations: HashMap<Box<str>, StationSummary, ahash::RandomState>,
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record(&mut self, station: &str, tenths: i32) -> Result<()> {
        match self.stations.get_mut(station) {
            Some(summary) => summary.record(tenths).map_err(|_| Error::overflow(station)),
            None => {
                self.stations.insert(station.into(), StationSummary::new(tenths));
                Ok(())
            }
        }
    }

    /// Adds a whole summary for `station`, merging with any existing one.
    pub fn insert_summary(&mut self, station: &str, summary: StationSummary) -> Result<()> {
        match self.stations.get_mut(station) {
            Some(existing) => existing.merge(&summary).map_err(|_| Error::overflow(station)),
            None => {
                self.stations.insert(station.into(), summary);
                Ok(())
            }
        }
    }

    /// Combines two partial tables. The smaller one is drained into the
    /// larger.
    pub fn merge(self, other: AggregationTable) -> Result<AggregationTable> {
        let (mut into, from) = if self.len() >= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        for (station, summary) in from.stations {
            match into.stations.get_mut(&station) {
                Some(existing) => existing
                    .merge(&summary)
                    .map_err(|_| Error::overflow(&station))?,
                None => {
                    into.stations.insert(station, summary);
                }
            }
        }
        Ok(into)
    }

    pub fn get(&self, station: &str) -> Option<&StationSummary> {
        self.stations.get(station)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StationSummary)> {
        self.stations.iter().map(|(station, summary)| (&**station, summary))
    }
}

impl IntoIterator for AggregationTable {
    type Item = (Box<str>, StationSummary);
    type IntoIter = hashbrown::hash_map::IntoIter<Box<str>, StationSummary>;

    fn into_iter(self) -> Self::IntoIter {
        self.stations.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_of(readings: &[i32]) -> StationSummary {
        let (first, rest) = readings.split_first().unwrap();
        let mut summary = StationSummary::new(*first);
        for &reading in rest {
            summary.record(reading).unwrap();
        }
        summary
    }

    #[test]
    fn tracks_bounds_and_totals() {
        let summary = summary_of(&[100, -55, 200, 0]);
        assert_eq!(summary.count(), 4);
        assert_eq!(summary.sum(), 245);
        assert_eq!(summary.min(), -55);
        assert_eq!(summary.max(), 200);
    }

    #[test]
    fn merge_is_associative_and_commutative() {
        let a = summary_of(&[10, 20, -30]);
        let b = summary_of(&[5]);
        let c = summary_of(&[-99, 99, 42, 7]);
        let whole = summary_of(&[10, 20, -30, 5, -99, 99, 42, 7]);

        let mut ab_c = a;
        ab_c.merge(&b).unwrap();
        ab_c.merge(&c).unwrap();

        let mut bc = b;
        bc.merge(&c).unwrap();
        let mut a_bc = a;
        a_bc.merge(&bc).unwrap();

        let mut cba = c;
        cba.merge(&b).unwrap();
        cba.merge(&a).unwrap();

        assert_eq!(ab_c, whole);
        assert_eq!(a_bc, whole);
        assert_eq!(cba, whole);
    }

    #[test]
    fn mean_rounds_half_away_from_zero() {
        // 2.2 and 2.3 average to 2.25
        assert_eq!(summary_of(&[22, 23]).mean_tenths(), 23);
        assert_eq!(summary_of(&[-22, -23]).mean_tenths(), -23);
        // 2.24 and -2.24 stay put
        assert_eq!(summary_of(&[22, 22, 23, 23, 22]).mean_tenths(), 22);
        assert_eq!(summary_of(&[-22, -22, -23, -23, -22]).mean_tenths(), -22);
        // -0.033.. rounds to zero, not below it
        assert_eq!(summary_of(&[-1, 0, 0]).mean_tenths(), 0);
        assert_eq!(summary_of(&[100, 200]).mean_tenths(), 150);
    }

    #[test]
    fn mean_stays_within_bounds() {
        let readings = [-999, 999, 1, -1, 500, 333, -777];
        let summary = summary_of(&readings);
        let mean = summary.mean_tenths();
        assert!(summary.min() <= mean && mean <= summary.max());
        for reading in readings {
            assert!(summary.min() <= reading && reading <= summary.max());
        }
    }

    #[test]
    fn overflow_is_reported_not_wrapped() {
        let mut summary = StationSummary::from_parts(1 << 33, i64::MAX - 5, 0, i32::MAX).unwrap();
        assert_eq!(summary.record(i32::MAX), Err(Overflow));

        let mut full = StationSummary::from_parts(u64::MAX, 0, 0, 0).unwrap();
        assert_eq!(full.record(0), Err(Overflow));
        assert_eq!(full.merge(&StationSummary::new(0)), Err(Overflow));
    }

    #[test]
    fn from_parts_rejects_impossible_summaries() {
        assert!(StationSummary::from_parts(0, 0, 0, 0).is_none());
        assert!(StationSummary::from_parts(1, 0, 5, 1).is_none());
        assert!(StationSummary::from_parts(2, 100, 0, 10).is_none());
        assert!(StationSummary::from_parts(2, 15, 5, 10).is_some());
    }

    #[test]
    fn table_merge_combines_shared_stations() {
        let mut left = AggregationTable::new();
        left.record("Oslo", -10).unwrap();
        left.record("Lima", 200).unwrap();
        let mut right = AggregationTable::new();
        right.record("Oslo", 30).unwrap();
        right.record("Accra", 300).unwrap();

        let merged = left.merge(right).unwrap();
        assert_eq!(merged.len(), 3);
        let oslo = merged.get("Oslo").unwrap();
        assert_eq!((oslo.count(), oslo.sum(), oslo.min(), oslo.max()), (2, 20, -10, 30));
        assert_eq!(merged.get("Accra"), Some(&StationSummary::new(300)));
    }

    #[test]
    fn table_merge_names_overflowing_station() {
        let mut left = AggregationTable::new();
        let hot = StationSummary::from_parts(1, i64::from(i32::MAX), i32::MAX, i32::MAX).unwrap();
        left.insert_summary("Hot", hot).unwrap();
        let mut right = AggregationTable::new();
        right
            .insert_summary("Hot", StationSummary::from_parts(u64::MAX, 0, 0, 0).unwrap())
            .unwrap();

        match left.merge(right) {
            Err(Error::ArithmeticOverflow { station }) => assert_eq!(station, "Hot"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn keys_are_case_sensitive() {
        let mut table = AggregationTable::new();
        table.record("oslo", 1).unwrap();
        table.record("Oslo", 2).unwrap();
        assert_eq!(table.len(), 2);
    }
}
