use std::fmt;
use std::io::Write;

use crate::summary::{AggregationTable, StationSummary};

/// A fixed-point value in tenths, rendered with exactly one fractional digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenths(pub i64);

impl fmt::Display for Tenths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{sign}{}.{}", magnitude / 10, magnitude % 10)
    }
}

/// `min/mean/max`, the mean rounded half away from zero.
impl fmt::Display for StationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            Tenths(i64::from(self.min())),
            Tenths(i64::from(self.mean_tenths())),
            Tenths(i64::from(self.max()))
        )
    }
}

/// The final table, sorted by station name.
///
/// Names are compared as plain `str`, i.e. byte-wise, which for UTF-8 is the
/// same as comparing codepoints. No locale collation is involved.
#[derive(Debug, Clone)]
pub struct Report {
    rows: Vec<(Box<str>, StationSummary)>,
}

impl Report {
    pub fn new(table: AggregationTable) -> Self {
        let mut rows: Vec<_> = table.into_iter().collect();
        rows.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        Report { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &StationSummary)> {
        self.rows.iter().map(|(station, summary)| (&**station, summary))
    }

    /// Renders the whole report up front so that a failed run never leaves a
    /// half-written report behind.
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        out.write_all(self.render().as_bytes())?;
        out.flush()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (station, summary) in self.rows() {
            writeln!(f, "{station}={summary}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(records: &[(&str, i32)]) -> AggregationTable {
        let mut table = AggregationTable::new();
        for &(station, tenths) in records {
            table.record(station, tenths).unwrap();
        }
        table
    }

    #[test]
    fn tenths_render_one_fractional_digit() {
        assert_eq!(Tenths(0).to_string(), "0.0");
        assert_eq!(Tenths(5).to_string(), "0.5");
        assert_eq!(Tenths(-5).to_string(), "-0.5");
        assert_eq!(Tenths(123).to_string(), "12.3");
        assert_eq!(Tenths(-999).to_string(), "-99.9");
        assert_eq!(Tenths(i64::MIN).to_string(), "-922337203685477580.8");
    }

    #[test]
    fn formats_reference_scenario() {
        let report = Report::new(table(&[("A", 100), ("B", -55), ("A", 200)]));
        assert_eq!(report.render(), "A=10.0/15.0/20.0\nB=-5.5/-5.5/-5.5\n");
    }

    #[test]
    fn single_zero_reading() {
        let report = Report::new(table(&[("X", 0)]));
        assert_eq!(report.render(), "X=0.0/0.0/0.0\n");
    }

    #[test]
    fn mean_of_two_point_two_five_rounds_up() {
        let report = Report::new(table(&[("M", 22), ("M", 23), ("N", -22), ("N", -23)]));
        assert_eq!(report.render(), "M=2.2/2.3/2.3\nN=-2.3/-2.3/-2.2\n");
    }

    #[test]
    fn sorts_by_codepoint_not_locale() {
        let report = Report::new(table(&[
            ("Zürich", 1),
            ("Zug", 2),
            ("zebra", 3),
            ("Abéché", 4),
            ("Abha", 5),
            ("Ürümqi", 6),
        ]));
        let names: Vec<&str> = report.rows().map(|(station, _)| station).collect();
        assert_eq!(names, ["Abha", "Abéché", "Zug", "Zürich", "zebra", "Ürümqi"]);
        for pair in names.windows(2) {
            let (a, b) = (pair[0].chars(), pair[1].chars());
            assert!(a.lt(b), "{pair:?}");
        }
    }

    #[test]
    fn rendering_is_idempotent() {
        let report = Report::new(table(&[("b", 1), ("a", -1), ("c", 0), ("a", 7)]));
        let first = report.render();
        let mut written = Vec::new();
        report.write_to(&mut written).unwrap();
        assert_eq!(first, report.render());
        assert_eq!(first.as_bytes(), written.as_slice());
    }

    #[test]
    fn empty_table_renders_nothing() {
        let report = Report::new(AggregationTable::new());
        assert!(report.is_empty());
        assert_eq!(report.render(), "");
    }
}
