//! Per-file stage counters and percentage bookkeeping.
//!
//! One [`StatsAggregator`] lives for one input file. The first
//! [`record`](StatsAggregator::record) call fixes the total every percentage is
//! relative to. Counters accumulate, so the two pools may record concurrently.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::error::{Error, Result, Warning};
use crate::multiplicity::MultiplicityBucket;
use crate::read::{End, Pool};
use crate::report::Reporter;

/// Decimal digits kept by the fixed-point percentage.
pub const PERCENT_DECIMALS: u32 = 4;

/// Most decimals a percentage can carry: `100 * u64::MAX * 10^16` fits a `u128`.
pub const MAX_PERCENT_DECIMALS: u32 = 16;

/// Named counter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Processed,
    CoarseTrimmed,
    CoarseUntrimmed,
    CoarseTooShort,
    WindowInput { pool: Pool, offset: usize },
    WindowMatched { pool: Pool, offset: usize },
    HalfMatched { pool: Pool, offset: usize, end: End },
    PoolUnmatched { pool: Pool },
    EdgeMerged,
    InternalMotif,
    Edge,
    Inner,
    Trash,
    AlignedReads,
    Multiplicity(MultiplicityBucket),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Processed => f.write_str("processed"),
            Stage::CoarseTrimmed => f.write_str("coarse.trimmed"),
            Stage::CoarseUntrimmed => f.write_str("coarse.untrimmed"),
            Stage::CoarseTooShort => f.write_str("coarse.too_short"),
            Stage::WindowInput { pool, offset } => write!(f, "{pool}.offset{offset:02}.input"),
            Stage::WindowMatched { pool, offset } => write!(f, "{pool}.offset{offset:02}.matched"),
            Stage::HalfMatched { pool, offset, end } => write!(f, "{pool}.offset{offset:02}.{end}.matched"),
            Stage::PoolUnmatched { pool } => write!(f, "{pool}.unmatched"),
            Stage::EdgeMerged => f.write_str("edge.merged"),
            Stage::InternalMotif => f.write_str("edge.internal_motif"),
            Stage::Edge => f.write_str("edge"),
            Stage::Inner => f.write_str("inner"),
            Stage::Trash => f.write_str("trash"),
            Stage::AlignedReads => f.write_str("aligned.reads"),
            Stage::Multiplicity(b) => write!(f, "multiplicity.{b}"),
        }
    }
}

/// `count / total` as an exact rational, or undefined when the total is zero.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Percentage {
    Defined { count: u64, total: u64 },
    Undefined,
}

impl Percentage {
    pub fn of(count: u64, total: u64) -> Self {
        if total == 0 { Percentage::Undefined } else { Percentage::Defined { count, total } }
    }

    /// `100 * count / total` scaled by `10^decimals`, rounded half up.
    pub fn scaled(&self, decimals: u32) -> Option<u128> {
        match *self {
            Percentage::Defined { count, total } => percent_scaled(count, total, decimals).ok(),
            Percentage::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool { matches!(self, Percentage::Defined { .. }) }
}

/// Fixed-point percentage with explicit half-up rounding.
pub fn percent_scaled(count: u64, total: u64, decimals: u32) -> Result<u128> {
    if total == 0 {
        return Err(Error::UndefinedPercentage { stage: format!("{count}/0") });
    }
    let num = 10u128
        .checked_pow(decimals)
        .and_then(|unit| unit.checked_mul(100 * count as u128))
        .ok_or_else(|| Error::InvalidConfig(format!("{decimals} percentage decimals overflow for {count}/{total}")))?;
    let den = total as u128;
    let (q, r) = (num / den, num % den);
    Ok(if 2 * r >= den { q + 1 } else { q })
}

impl fmt::Display for Percentage {
    /// Two decimals unless a precision is given: `format!("{p:.4}")`. Precision
    /// is capped at [`MAX_PERCENT_DECIMALS`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decimals = f.precision().map_or(2, |p| p.min(MAX_PERCENT_DECIMALS as usize) as u32);
        match self.scaled(decimals) {
            None => f.write_str("undefined"),
            Some(v) if decimals == 0 => write!(f, "{v}"),
            Some(v) => {
                let unit = 10u128.pow(decimals);
                write!(f, "{}.{:0width$}", v / unit, v % unit, width = decimals as usize)
            }
        }
    }
}

/// One row of a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageRow {
    pub stage: Stage,
    pub count: u64,
    pub percentage: Percentage,
}

/// Point-in-time copy of all counters of one file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub label: String,
    pub total: Option<u64>,
    pub rows: Vec<StageRow>,
}

impl StatsSnapshot {
    pub fn get(&self, stage: Stage) -> Option<&StageRow> { self.rows.iter().find(|r| r.stage == stage) }

    /// Render as a table for terminal/CSV output.
    pub fn to_dataframe(&self) -> polars::prelude::PolarsResult<polars::prelude::DataFrame> {
        use polars::prelude::*;
        df!(
            "file"       => self.rows.iter().map(|_| self.label.clone()).collect::<Vec<_>>(),
            "stage"      => self.rows.iter().map(|r| r.stage.to_string()).collect::<Vec<_>>(),
            "count"      => self.rows.iter().map(|r| r.count).collect::<Vec<_>>(),
            "percentage" => self.rows.iter().map(|r| r.percentage.to_string()).collect::<Vec<_>>(),
        )
    }
}

/// Counters for one file's processing run.
#[derive(Debug)]
pub struct StatsAggregator {
    label: String,
    total: OnceLock<u64>,
    counters: Mutex<BTreeMap<Stage, u64>>,
    warnings: Mutex<Vec<Warning>>,
}

impl StatsAggregator {
    pub fn new(label: impl Into<String>) -> Self {
        StatsAggregator {
            label: label.into(),
            total: OnceLock::new(),
            counters: Mutex::new(BTreeMap::new()),
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn label(&self) -> &str { &self.label }

    /// Add `count` to `stage`. The first call fixes the total input count.
    pub fn record(&self, stage: Stage, count: u64) {
        if *self.total.get_or_init(|| count) == 0 {
            self.warn_once(Warning::EmptyInput { label: self.label.clone() });
        }
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        *counters.entry(stage).or_insert(0) += count;
    }

    fn warn_once(&self, w: Warning) {
        let mut warnings = self.warnings.lock().unwrap_or_else(PoisonError::into_inner);
        if !warnings.contains(&w) {
            log::warn!("{w}");
            warnings.push(w);
        }
    }

    pub fn total(&self) -> Option<u64> { self.total.get().copied() }

    pub fn count(&self, stage: Stage) -> u64 {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner).get(&stage).copied().unwrap_or(0)
    }

    pub fn percentage(&self, stage: Stage) -> Percentage {
        match self.total() {
            Some(total) => Percentage::of(self.count(stage), total),
            None => Percentage::Undefined,
        }
    }

    /// `count(minuend) - sum(count(subtrahends))`; never negative.
    pub fn derive(&self, minuend: Stage, subtrahends: &[Stage]) -> Result<u64> {
        let mut left = self.count(minuend);
        for s in subtrahends {
            let c = self.count(*s);
            left = left.checked_sub(c).ok_or_else(|| {
                Error::AccountingInvariant(format!(
                    "{}: deriving from `{minuend}` went negative at `{s}` ({c} > {left})",
                    self.label
                ))
            })?;
        }
        Ok(left)
    }

    /// Check that `parts` add up exactly to `whole`.
    pub fn check_partition(&self, whole: Stage, parts: &[Stage]) -> Result<()> {
        let rest = self.derive(whole, parts)?;
        if rest != 0 {
            return Err(Error::AccountingInvariant(format!(
                "{}: {rest} reads of `{whole}` are not accounted for by {}",
                self.label,
                parts.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(" + ")
            )));
        }
        Ok(())
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total();
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let rows = counters
            .iter()
            .map(|(stage, count)| StageRow {
                stage: *stage,
                count: *count,
                percentage: total.map_or(Percentage::Undefined, |t| Percentage::of(*count, t)),
            })
            .collect();
        StatsSnapshot { label: self.label.clone(), total, rows }
    }

    /// Push every counter to a reporter sink, then one `warning.<kind>` row
    /// per warning.
    pub fn publish(&self, reporter: &mut dyn Reporter) -> Result<()> {
        let snap = self.snapshot();
        for row in &snap.rows {
            reporter.publish(&snap.label, &row.stage.to_string(), row.count, &row.percentage)?;
        }
        for w in self.warnings() {
            reporter.publish_row(&[snap.label.clone(), format!("warning.{}", w.kind())])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_is_twenty_five_percent() {
        let s = StatsAggregator::new("a.fq");
        s.record(Stage::Processed, 1000);
        s.record(Stage::Edge, 250);
        let p = s.percentage(Stage::Edge);
        assert_eq!(p.to_string(), "25.00");
        assert_eq!(p.scaled(PERCENT_DECIMALS), Some(250_000));
        assert_eq!(format!("{p:.4}"), "25.0000");
    }

    #[test]
    fn first_record_fixes_total() {
        let s = StatsAggregator::new("a.fq");
        s.record(Stage::Processed, 3);
        s.record(Stage::Processed, 5);
        assert_eq!(s.total(), Some(3));
        assert_eq!(s.count(Stage::Processed), 8);
    }

    #[test]
    fn zero_total_is_undefined_not_a_panic() {
        let s = StatsAggregator::new("empty.fq");
        s.record(Stage::Processed, 0);
        s.record(Stage::Edge, 0);
        assert_eq!(s.percentage(Stage::Edge), Percentage::Undefined);
        assert_eq!(s.percentage(Stage::Edge).to_string(), "undefined");
        assert_eq!(s.percentage(Stage::Edge).scaled(PERCENT_DECIMALS), None);
        assert_eq!(s.warnings(), vec![Warning::EmptyInput { label: "empty.fq".into() }]);
    }

    #[test]
    fn rounding_is_half_up() {
        // 1/3 = 33.3333..%, 2/3 = 66.6666..%
        assert_eq!(Percentage::of(1, 3).to_string(), "33.33");
        assert_eq!(Percentage::of(2, 3).to_string(), "66.67");
        // 1/8 = 12.5% exactly -> 13 with no decimals
        assert_eq!(format!("{:.0}", Percentage::of(1, 8)), "13");
        assert_eq!(percent_scaled(1, 7, 4).unwrap(), 142_857);
    }

    #[test]
    fn wide_precision_is_capped_not_a_panic() {
        let p = Percentage::of(1, 3);
        assert_eq!(format!("{p:.40}"), "33.3333333333333333");
        let p = Percentage::of(u64::MAX, u64::MAX);
        assert_eq!(format!("{p:.40}"), format!("100.{}", "0".repeat(16)));
        assert_eq!(p.scaled(MAX_PERCENT_DECIMALS), Some(100 * 10u128.pow(16)));
        assert_eq!(p.scaled(39), None);
        assert!(percent_scaled(u64::MAX, 1, 30).is_err());
    }

    #[test]
    fn negative_derivation_is_an_accounting_error() {
        let s = StatsAggregator::new("a.fq");
        s.record(Stage::Processed, 10);
        s.record(Stage::Edge, 6);
        s.record(Stage::Inner, 6);
        assert!(matches!(s.derive(Stage::Processed, &[Stage::Edge, Stage::Inner]), Err(Error::AccountingInvariant(_))));
        assert_eq!(s.derive(Stage::Processed, &[Stage::Edge]).unwrap(), 4);
        assert!(s.check_partition(Stage::Processed, &[Stage::Edge]).is_err());
    }

    #[test]
    fn stage_names_are_stable() {
        let st = Stage::WindowMatched { pool: Pool::Len9, offset: 3 };
        assert_eq!(st.to_string(), "len9.offset03.matched");
        let st = Stage::HalfMatched { pool: Pool::OrigLen, offset: 12, end: End::ThreePrime };
        assert_eq!(st.to_string(), "orig_len.offset12.three_prime.matched");
        assert_eq!(Stage::Multiplicity(MultiplicityBucket::TripleOrMore).to_string(), "multiplicity.triple");
    }

    #[test]
    fn snapshot_lists_counts_with_percentages() {
        let s = StatsAggregator::new("a.fq");
        s.record(Stage::Processed, 4);
        s.record(Stage::Trash, 1);
        let snap = s.snapshot();
        assert_eq!(snap.total, Some(4));
        assert_eq!(snap.get(Stage::Trash).unwrap().percentage.to_string(), "25.00");
        let df = snap.to_dataframe().unwrap();
        assert_eq!(df.height(), 2);
    }
}
