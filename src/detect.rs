//! Sequence detection primitives (anchored, unanchored and exact motif scans).
//!
//! Error tolerance follows the usual adapter-trimming convention: a match of
//! `n` aligned bases may carry `floor(error_rate * n)` edits.
//!
//! # Examples
//! ```
//! use motifcut::detect::{allowed_errors, match_prefix};
//! assert_eq!(allowed_errors(12, 0.01), 0);
//! assert_eq!(match_prefix(b"CTTCCGATCTCATG", b"CTTCCGATCT", 0).unwrap().end, 10);
//! ```
use aho_corasick::AhoCorasick;
use bio::alignment::distance::{hamming, levenshtein};
use bio::pattern_matching::myers::{Myers, MyersBuilder};

use crate::error::{Error, Result};

/// Longest pattern the bit-parallel matcher accepts.
pub const MAX_PATTERN_LEN: usize = 64;

/// A located match inside a read; `end` is exclusive.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Hit {
    pub start: usize,
    pub end: usize,
    pub errors: usize,
}

impl Hit {
    pub fn len(&self) -> usize { self.end - self.start }

    pub fn is_empty(&self) -> bool { self.end == self.start }
}

/// Number of edits permitted over `len` aligned bases.
#[inline]
pub fn allowed_errors(len: usize, error_rate: f64) -> usize {
    (len as f64 * error_rate).floor() as usize
}

/// Match `pattern` against the start of `read`, allowing up to `max_errors`
/// edits. The read-side window may be shorter or longer than the pattern by at
/// most `max_errors` bases; ties prefer a window of exactly pattern length.
pub fn match_prefix(read: &[u8], pattern: &[u8], max_errors: usize) -> Option<Hit> {
    if pattern.is_empty() { return None; }
    if max_errors == 0 {
        return read.starts_with(pattern).then_some(Hit { start: 0, end: pattern.len(), errors: 0 });
    }
    best_window(pattern, max_errors, read.len(), |l| &read[..l])
        .map(|(l, d)| Hit { start: 0, end: l, errors: d })
}

/// Match `pattern` against the end of `read`; see [`match_prefix`].
pub fn match_suffix(read: &[u8], pattern: &[u8], max_errors: usize) -> Option<Hit> {
    if pattern.is_empty() { return None; }
    let n = read.len();
    if max_errors == 0 {
        return read.ends_with(pattern).then(|| Hit { start: n - pattern.len(), end: n, errors: 0 });
    }
    best_window(pattern, max_errors, n, |l| &read[n - l..])
        .map(|(l, d)| Hit { start: n - l, end: n, errors: d })
}

fn best_window<'a>(
    pattern: &[u8],
    max_errors: usize,
    read_len: usize,
    window: impl Fn(usize) -> &'a [u8],
) -> Option<(usize, usize)> {
    let plen = pattern.len();
    let lo = plen.saturating_sub(max_errors).max(1);
    let hi = (plen + max_errors).min(read_len);
    let mut best: Option<(usize, usize)> = None;
    for l in lo..=hi {
        let d = levenshtein(pattern, window(l)) as usize;
        if d > max_errors { continue; }
        let better = match best {
            None => true,
            Some((bl, bd)) => d < bd || (d == bd && l.abs_diff(plen) < bl.abs_diff(plen)),
        };
        if better { best = Some((l, d)); }
    }
    best
}

fn myers_for(pattern: &[u8]) -> Result<Myers<u64>> {
    if pattern.is_empty() || pattern.len() > MAX_PATTERN_LEN {
        return Err(Error::InvalidConfig(format!(
            "pattern length {} outside 1..={MAX_PATTERN_LEN}",
            pattern.len()
        )));
    }
    Ok(MyersBuilder::new().build_64(pattern.iter().copied()))
}

/// Best full-length occurrence of `pattern` anywhere in `read`.
/// Fewest edits wins; ties go to the leftmost start.
fn best_occurrence(read: &[u8], pattern: &[u8], max_errors: usize) -> Result<Option<Hit>> {
    let mut m = myers_for(pattern)?;
    let k = max_errors.min(u8::MAX as usize) as u8;
    let mut best: Option<Hit> = None;
    for (start, end, dist) in m.find_all(read, k) {
        let hit = Hit { start, end, errors: dist as usize };
        if best.map_or(true, |b| (hit.errors, hit.start) < (b.errors, b.start)) {
            best = Some(hit);
        }
    }
    Ok(best)
}

/// Locate a 3' adapter: a full occurrence anywhere, otherwise an adapter prefix
/// of at least `min_overlap` bases running off the read end.
pub fn find_three_prime(read: &[u8], adapter: &[u8], min_overlap: usize, error_rate: f64) -> Result<Option<Hit>> {
    if let Some(hit) = best_occurrence(read, adapter, allowed_errors(adapter.len(), error_rate))? {
        return Ok(Some(hit));
    }
    let n = read.len();
    for l in (min_overlap.max(1)..adapter.len()).rev() {
        if l > n { continue; }
        let d = hamming(&read[n - l..], &adapter[..l]) as usize;
        if d <= allowed_errors(l, error_rate) {
            return Ok(Some(Hit { start: n - l, end: n, errors: d }));
        }
    }
    Ok(None)
}

/// Locate a 5' adapter: a full occurrence anywhere, otherwise an adapter suffix
/// of at least `min_overlap` bases at the read start.
pub fn find_five_prime(read: &[u8], adapter: &[u8], min_overlap: usize, error_rate: f64) -> Result<Option<Hit>> {
    let mut m = myers_for(adapter)?;
    let k = allowed_errors(adapter.len(), error_rate).min(u8::MAX as usize) as u8;
    // Rightmost full occurrence removes the most adapter sequence.
    let mut best: Option<Hit> = None;
    for (start, end, dist) in m.find_all(read, k) {
        let hit = Hit { start, end, errors: dist as usize };
        if best.map_or(true, |b| (hit.errors, core::cmp::Reverse(hit.end)) < (b.errors, core::cmp::Reverse(b.end))) {
            best = Some(hit);
        }
    }
    if best.is_some() { return Ok(best); }
    let alen = adapter.len();
    for l in (min_overlap.max(1)..alen).rev() {
        if l > read.len() { continue; }
        let d = hamming(&read[..l], &adapter[alen - l..]) as usize;
        if d <= allowed_errors(l, error_rate) {
            return Ok(Some(Hit { start: 0, end: l, errors: d }));
        }
    }
    Ok(None)
}

/// Exact scanner reporting every (overlapping) occurrence of one motif.
pub struct MotifScanner {
    ac: AhoCorasick,
    len: usize,
}

impl MotifScanner {
    pub fn new(motif: &[u8]) -> Result<Self> {
        if motif.is_empty() {
            return Err(Error::InvalidConfig("motif must not be empty".into()));
        }
        let ac = AhoCorasick::new([motif])
            .map_err(|e| Error::InvalidConfig(format!("motif automaton: {e}")))?;
        Ok(MotifScanner { ac, len: motif.len() })
    }

    pub fn motif_len(&self) -> usize { self.len }

    /// Start positions of every occurrence, in increasing order.
    pub fn positions(&self, seq: &[u8]) -> Vec<usize> {
        self.ac.find_overlapping_iter(seq).map(|m| m.start()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_errors_floors() {
        assert_eq!(allowed_errors(13, 0.1), 1);
        assert_eq!(allowed_errors(9, 0.1), 0);
        assert_eq!(allowed_errors(100, 0.01), 1);
        assert_eq!(allowed_errors(12, 0.01), 0);
    }

    #[test]
    fn exact_anchored_matches() {
        assert_eq!(match_prefix(b"GATCAAA", b"GATC", 0), Some(Hit { start: 0, end: 4, errors: 0 }));
        assert_eq!(match_prefix(b"AGATCAA", b"GATC", 0), None);
        assert_eq!(match_suffix(b"AAAGATC", b"GATC", 0), Some(Hit { start: 3, end: 7, errors: 0 }));
        assert_eq!(match_suffix(b"GAT", b"GATC", 0), None);
    }

    #[test]
    fn tolerant_prefix_prefers_pattern_length() {
        // One substitution.
        let h = match_prefix(b"ACGTTCGTACGTAAAA", b"ACGTACGTACGT", 1).unwrap();
        assert_eq!((h.end, h.errors), (12, 1));
        // One deleted base in the read.
        let h = match_suffix(b"TTTTACGACGTACGT", b"ACGTACGTACGT", 1).unwrap();
        assert_eq!(h.errors, 1);
        assert_eq!(h.end, 15);
    }

    #[test]
    fn three_prime_full_and_partial() {
        let adapter = b"AGATCGGAAGAGC";
        let read = b"CATGACGTTAGATCGGAAGAGCTTTTT";
        let h = find_three_prime(read, adapter, 12, 0.1).unwrap().unwrap();
        assert_eq!((h.start, h.errors), (9, 0));

        // 12-base adapter prefix running off the end.
        let read = b"ACGTTGCAACGAGATCGGAAGAG";
        let h = find_three_prime(read, adapter, 12, 0.1).unwrap().unwrap();
        assert_eq!(h.start, read.len() - 12);

        // 11-base prefix is below the minimum overlap.
        let read = b"ACGTTGCAACGAGATCGGAAGA";
        assert!(find_three_prime(read, adapter, 12, 0.1).unwrap().is_none());
    }

    #[test]
    fn five_prime_partial_suffix() {
        let adapter = b"GCTCTTCCGATCT";
        let read = b"CTCTTCCGATCTACGTTGCA";
        let h = find_five_prime(read, adapter, 12, 0.0).unwrap().unwrap();
        assert_eq!(h, Hit { start: 0, end: 12, errors: 0 });
    }

    #[test]
    fn oversized_pattern_is_rejected() {
        let long = vec![b'A'; MAX_PATTERN_LEN + 1];
        assert!(matches!(find_three_prime(b"ACGT", &long, 12, 0.1), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn scanner_reports_overlapping_hits() {
        let s = MotifScanner::new(b"AA").unwrap();
        assert_eq!(s.positions(b"AAAC"), vec![0, 1]);
        let s = MotifScanner::new(b"CATG").unwrap();
        assert_eq!(s.positions(b"CATGACATGT"), vec![0, 5]);
        assert!(s.positions(b"ACGT").is_empty());
    }
}
