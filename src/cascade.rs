//! The **motif cascade**: coarse split, per-pool window executor and the
//! internal-motif filter.
//!
//! ### Flow
//! 1. Coarse strip (unanchored 3' adapter). Trimmed reads of at least the
//!    minimum length form the `len9` pool, shorter ones are trash, untrimmed
//!    reads form the `orig_len` pool.
//! 2. Each pool walks the window table in order. Every window runs its 5'
//!    half, then its 3' half on what the 5' half left; matched reads leave the
//!    pool as edge reads, the rest feed the next window.
//! 3. After the last window, leftovers of `len9` are trash and leftovers of
//!    `orig_len` are inner reads.
//! 4. Edge reads of both pools are merged and any read carrying the motif
//!    away from its matched edge is discarded as trash.
//!
//! The two pools run concurrently with `rayon::join`; windows within a pool
//! never do.
use crate::config::CascadeConfig;
use crate::detect::MotifScanner;
use crate::error::Result;
use crate::read::{ClassificationBucket, EdgeRead, End, Pool, Read};
use crate::stats::{Stage, StatsAggregator};
use crate::trimmer::{MotifTrimmer, Placement, TrimSpec, Trimmed, Trimmer};
use crate::window::{HalfSearch, MatchAction, MotifSearchWindow};

/// Reads leaving one pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolOutcome {
    pub edge: Vec<EdgeRead>,
    pub unmatched: Vec<Read>,
}

/// Final classification of one file's reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CascadeOutput {
    pub inner: Vec<Read>,
    pub edge: Vec<EdgeRead>,
    /// Reads discarded at any step.
    pub trash: u64,
}

impl CascadeOutput {
    pub fn count(&self, bucket: ClassificationBucket) -> u64 {
        match bucket {
            ClassificationBucket::Trash => self.trash,
            ClassificationBucket::InnerOriginalLength => self.inner.len() as u64,
            ClassificationBucket::EdgeTrimmed => self.edge.len() as u64,
        }
    }

    pub fn edge_reads(&self) -> impl Iterator<Item = &Read> { self.edge.iter().map(|e| &e.read) }
}

/// Cascade bound to a validated configuration and a trimmer.
pub struct MotifCascade<T = MotifTrimmer> {
    config: CascadeConfig,
    windows: Vec<MotifSearchWindow>,
    scanner: MotifScanner,
    trimmer: T,
}

impl MotifCascade<MotifTrimmer> {
    pub fn new(config: CascadeConfig) -> Result<Self> { Self::with_trimmer(config, MotifTrimmer) }
}

impl<T: Trimmer> MotifCascade<T> {
    pub fn with_trimmer(config: CascadeConfig, trimmer: T) -> Result<Self> {
        config.validate()?;
        let windows = config.windows();
        let scanner = MotifScanner::new(&config.motif)?;
        Ok(MotifCascade { config, windows, scanner, trimmer })
    }

    pub fn config(&self) -> &CascadeConfig { &self.config }

    pub fn windows(&self) -> &[MotifSearchWindow] { &self.windows }

    /// Classify every read of one file. `stats` must be fresh for this file.
    pub fn classify(&self, reads: Vec<Read>, stats: &StatsAggregator) -> Result<CascadeOutput> {
        stats.record(Stage::Processed, reads.len() as u64);

        let (len9, orig_len) = self.coarse_split(reads, stats)?;
        let (a, b) = rayon::join(
            || self.run_pool(Pool::Len9, len9, stats),
            || self.run_pool(Pool::OrigLen, orig_len, stats),
        );
        let (len9, orig_len) = (a?, b?);

        let mut merged = len9.edge;
        merged.extend(orig_len.edge);
        stats.record(Stage::EdgeMerged, merged.len() as u64);

        let (edge, discarded) = self.filter_internal(merged);
        stats.record(Stage::InternalMotif, discarded as u64);

        let trash = stats.count(Stage::CoarseTooShort) + len9.unmatched.len() as u64 + discarded as u64;
        let out = CascadeOutput { inner: orig_len.unmatched, edge, trash };
        stats.record(Stage::Edge, out.edge.len() as u64);
        stats.record(Stage::Inner, out.inner.len() as u64);
        stats.record(Stage::Trash, out.trash);
        stats.check_partition(Stage::Processed, &[Stage::Edge, Stage::Inner, Stage::Trash])?;

        log::info!(
            "{}: {} edge, {} inner, {} trash of {}",
            stats.label(),
            out.edge.len(),
            out.inner.len(),
            out.trash,
            stats.count(Stage::Processed)
        );
        Ok(out)
    }

    /// Coarse adapter strip; returns the `(len9, orig_len)` pools.
    pub fn coarse_split(&self, reads: Vec<Read>, stats: &StatsAggregator) -> Result<(Vec<Read>, Vec<Read>)> {
        let coarse = &self.config.coarse;
        let spec = TrimSpec::unanchored(&coarse.adapter, End::ThreePrime, coarse.min_overlap, coarse.error_rate);
        let outcome = self.trimmer.trim(reads, &spec)?;

        let trimmed = outcome.matched.len() as u64;
        let mut len9 = Vec::with_capacity(outcome.matched.len());
        let mut too_short = 0u64;
        for Trimmed { read, .. } in outcome.matched {
            if read.len() >= coarse.min_length {
                len9.push(read.with_pool(Pool::Len9));
            } else {
                too_short += 1;
            }
        }
        let orig_len: Vec<Read> = outcome.unmatched.into_iter().map(|r| r.with_pool(Pool::OrigLen)).collect();

        stats.record(Stage::CoarseTrimmed, trimmed);
        stats.record(Stage::CoarseUntrimmed, orig_len.len() as u64);
        stats.record(Stage::CoarseTooShort, too_short);
        log::debug!(
            "{}: coarse strip trimmed {trimmed} ({too_short} too short), untrimmed {}",
            stats.label(),
            orig_len.len()
        );
        Ok((len9, orig_len))
    }

    /// Walk the window table over one pool.
    pub fn run_pool(&self, pool: Pool, reads: Vec<Read>, stats: &StatsAggregator) -> Result<PoolOutcome> {
        let mut current = reads;
        let mut edge = Vec::new();
        for window in &self.windows {
            let offset = window.offset;
            stats.record(Stage::WindowInput { pool, offset }, current.len() as u64);
            let mut matched = 0u64;
            for half in window.halves() {
                let (hits, rest) = self.run_half(half, current, offset)?;
                stats.record(Stage::HalfMatched { pool, offset, end: half.end }, hits.len() as u64);
                matched += hits.len() as u64;
                edge.extend(hits);
                current = rest;
            }
            stats.record(Stage::WindowMatched { pool, offset }, matched);
            log::debug!("{}: {pool} offset {offset:>2}: {matched} matched, {} left", stats.label(), current.len());
        }
        stats.record(Stage::PoolUnmatched { pool }, current.len() as u64);
        Ok(PoolOutcome { edge, unmatched: current })
    }

    fn run_half(&self, half: &HalfSearch, reads: Vec<Read>, offset: usize) -> Result<(Vec<EdgeRead>, Vec<Read>)> {
        let spec = TrimSpec {
            pattern: half.pattern.clone(),
            placement: Placement::Anchored(half.end),
            min_overlap: half.min_overlap,
            error_rate: self.config.error_rate,
            no_trim: half.action != MatchAction::Trim,
        };
        let outcome = self.trimmer.trim(reads, &spec)?;
        let motif = &self.config.motif;
        let mut unmatched = outcome.unmatched;
        let mut edge = Vec::with_capacity(outcome.matched.len());
        for Trimmed { read, hit, end } in outcome.matched {
            let read = match half.action {
                MatchAction::Trim | MatchAction::Detect => read,
                MatchAction::Substitute => {
                    // A tolerant match may cover fewer bases than the motif it stands for.
                    let window = match end {
                        End::FivePrime => hit.end,
                        End::ThreePrime => read.len() - hit.start,
                    };
                    if window < motif.len() {
                        unmatched.push(read);
                        continue;
                    }
                    match end {
                        End::FivePrime => read.substitute_start(window, motif),
                        End::ThreePrime => read.substitute_end(window, motif),
                    }
                }
            };
            edge.push(EdgeRead { read, end, offset });
        }
        Ok((edge, unmatched))
    }

    /// Drop edge reads carrying the motif anywhere but at their matched edge.
    /// Returns the kept reads and the number discarded.
    pub fn filter_internal(&self, edges: Vec<EdgeRead>) -> (Vec<EdgeRead>, usize) {
        let motif_len = self.scanner.motif_len();
        let before = edges.len();
        let kept: Vec<EdgeRead> = edges
            .into_iter()
            .filter(|e| {
                let edge_at = e.edge_position(motif_len);
                self.scanner.positions(&e.read.seq).into_iter().all(|p| Some(p) == edge_at)
            })
            .collect();
        let discarded = before - kept.len();
        (kept, discarded)
    }
}

/// One-shot classification with default tolerances.
///
/// Returns `(inner, edge, trash_count)`.
pub fn classify(reads: Vec<Read>, adapter5: &[u8], adapter3: &[u8], motif: &[u8]) -> Result<(Vec<Read>, Vec<Read>, u64)> {
    let cascade = MotifCascade::new(CascadeConfig::new(adapter5, adapter3, motif))?;
    let stats = StatsAggregator::new("reads");
    let out = cascade.classify(reads, &stats)?;
    let edge = out.edge.into_iter().map(|e| e.read).collect();
    Ok((out.inner, edge, out.trash))
}

impl From<ClassificationBucket> for Stage {
    fn from(b: ClassificationBucket) -> Self {
        match b {
            ClassificationBucket::Trash => Stage::Trash,
            ClassificationBucket::InnerOriginalLength => Stage::Inner,
            ClassificationBucket::EdgeTrimmed => Stage::Edge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::trimmer::TrimOutcome;
    use crate::window::WindowKind;

    const A5: &[u8] = b"GCTCTTCCGATCT";
    const A3: &[u8] = b"AGATCGGAAGAGC";
    const MOTIF: &[u8] = b"CATG";

    fn filler(n: usize) -> String {
        b"ACGTTGCA".iter().cycle().take(n).map(|&b| b as char).collect()
    }

    fn read(id: &str, seq: &str) -> Read {
        let qual: Vec<u8> = (0..seq.len()).map(|i| b'!' + (i % 40) as u8).collect();
        Read::new(id, seq.as_bytes(), &qual, Pool::OrigLen)
    }

    fn cascade() -> MotifCascade { MotifCascade::new(CascadeConfig::new(A5, A3, MOTIF)).unwrap() }

    #[test]
    fn plain_read_is_inner_and_unchanged() {
        let r = read("plain", &filler(150));
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![r.clone()], &stats).unwrap();
        assert_eq!(out.inner, vec![r]);
        assert!(out.edge.is_empty());
        assert_eq!(out.trash, 0);
    }

    #[test]
    fn nine_base_read_with_leading_motif_is_edge() {
        let seq = format!("CATGACGTT{}TTTTT", std::str::from_utf8(A3).unwrap());
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![read("b", &seq)], &stats).unwrap();
        assert_eq!(out.edge.len(), 1);
        let e = &out.edge[0];
        assert_eq!(e.read.seq, b"CATGACGTT");
        assert_eq!(e.read.pool, Pool::Len9);
        assert_eq!((e.offset, e.end), (13, End::FivePrime));
        assert_eq!(stats.count(Stage::CoarseTooShort), 0);
    }

    #[test]
    fn short_coarse_trimmed_read_is_trash() {
        let seq = format!("ACGT{}", std::str::from_utf8(A3).unwrap());
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![read("s", &seq)], &stats).unwrap();
        assert_eq!(out.trash, 1);
        assert_eq!(stats.count(Stage::CoarseTooShort), 1);
    }

    #[test]
    fn len9_read_without_motif_is_trash() {
        let seq = format!("ACGTTGCAAC{}", std::str::from_utf8(A3).unwrap());
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![read("t", &seq)], &stats).unwrap();
        assert_eq!((out.trash, out.inner.len(), out.edge.len()), (1, 0, 0));
        assert_eq!(stats.count(Stage::PoolUnmatched { pool: Pool::Len9 }), 1);
    }

    #[test]
    fn remnant_match_trims_and_leaves_the_chain() {
        let seq = format!("CTTCCGATCTCATG{}", filler(20));
        let stats = StatsAggregator::new("t");
        let reads = vec![read("m", &seq), read("p1", &filler(40)), read("p2", &filler(41))];
        let out = cascade().classify(reads, &stats).unwrap();

        assert_eq!(out.edge.len(), 1);
        assert_eq!(out.edge[0].offset, 3);
        assert_eq!(out.edge[0].read.seq, format!("CATG{}", filler(20)).as_bytes());
        assert_eq!(out.edge[0].read.qual.len(), out.edge[0].read.seq.len());

        let pool = Pool::OrigLen;
        assert_eq!(stats.count(Stage::WindowInput { pool, offset: 3 }), 3);
        assert_eq!(stats.count(Stage::WindowMatched { pool, offset: 3 }), 1);
        assert_eq!(stats.count(Stage::WindowInput { pool, offset: 4 }), 2);
        assert_eq!(stats.count(Stage::HalfMatched { pool, offset: 3, end: End::FivePrime }), 1);
    }

    #[test]
    fn chaining_shrinks_every_window_input() {
        let reads: Vec<Read> = (0..12).map(|i| read(&format!("r{i}"), &filler(30 + i))).collect();
        let stats = StatsAggregator::new("t");
        cascade().classify(reads, &stats).unwrap();
        for pool in Pool::ALL {
            for offset in 1..13 {
                let input = stats.count(Stage::WindowInput { pool, offset });
                let matched = stats.count(Stage::WindowMatched { pool, offset });
                assert_eq!(stats.count(Stage::WindowInput { pool, offset: offset + 1 }), input - matched);
            }
        }
    }

    #[test]
    fn half_split_substitutes_bare_motif() {
        let seq = format!("TCATG{}", filler(20));
        let r = read("h", &seq);
        let qual_tail = r.qual[1..].to_vec();
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![r], &stats).unwrap();
        assert_eq!(out.edge.len(), 1);
        assert_eq!(out.edge[0].offset, 12);
        assert_eq!(out.edge[0].read.seq, format!("CATG{}", filler(20)).as_bytes());
        assert_eq!(out.edge[0].read.qual, qual_tail);
    }

    #[test]
    fn three_prime_half_split_substitutes_bare_motif() {
        let seq = format!("{}CATGA", filler(21));
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![read("h3", &seq)], &stats).unwrap();
        assert_eq!(out.edge.len(), 1);
        assert_eq!((out.edge[0].offset, out.edge[0].end), (12, End::ThreePrime));
        assert_eq!(out.edge[0].read.seq, format!("{}CATG", filler(21)).as_bytes());
    }

    #[test]
    fn three_prime_remnant_is_trimmed_back_to_the_motif() {
        let seq = format!("{}CATGAGATCGG", filler(30));
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![read("t3", &seq)], &stats).unwrap();

        assert_eq!(out.edge.len(), 1);
        let e = &out.edge[0];
        assert_eq!((e.offset, e.end), (6, End::ThreePrime));
        assert_eq!(e.read.seq, format!("{}CATG", filler(30)).as_bytes());
        assert_eq!(e.read.qual.len(), e.read.seq.len());
        assert_eq!(e.edge_position(MOTIF.len()), Some(30));
        assert_eq!(stats.count(Stage::HalfMatched { pool: Pool::OrigLen, offset: 6, end: End::ThreePrime }), 1);
        assert_eq!(stats.count(Stage::InternalMotif), 0);
    }

    #[test]
    fn bare_motif_at_three_prime_end_is_detected_unchanged() {
        let seq = format!("{}CATG", filler(30));
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![read("d3", &seq)], &stats).unwrap();

        assert_eq!(out.edge.len(), 1);
        assert_eq!((out.edge[0].offset, out.edge[0].end), (13, End::ThreePrime));
        assert_eq!(out.edge[0].read.seq, seq.as_bytes());
        assert_eq!(out.trash, 0);
    }

    #[test]
    fn three_prime_trim_with_leading_motif_is_trash() {
        let seq = format!("CATG{}CATGAGATCGG", filler(10));
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![read("i3", &seq)], &stats).unwrap();

        assert!(out.edge.is_empty());
        assert_eq!(stats.count(Stage::HalfMatched { pool: Pool::OrigLen, offset: 6, end: End::ThreePrime }), 1);
        assert_eq!((out.trash, stats.count(Stage::InternalMotif)), (1, 1));
    }

    #[test]
    fn substitution_needs_a_window_as_long_as_the_motif() {
        let mut cfg = CascadeConfig::new(A5, A3, MOTIF);
        cfg.error_rate = 0.99;
        let c = MotifCascade::new(cfg).unwrap();
        let half_split = &c.windows()[11];
        assert_eq!(half_split.kind, WindowKind::HalfSplit);

        for half in half_split.halves() {
            let reads = vec![read("tiny", "T"), read("tiny3", "A"), read("ok", "TCATGACGTTGCA")];
            let (edge, unmatched) = c.run_half(half, reads, 12).unwrap();
            for e in &edge {
                assert_eq!(e.read.seq.len(), e.read.qual.len(), "{}", e.read.id);
                assert!(e.read.len() >= MOTIF.len());
            }
            assert!(unmatched.iter().any(|r| r.id == "tiny"));
            assert!(unmatched.iter().any(|r| r.id == "tiny3"));
        }
    }

    #[test]
    fn internal_motif_sends_read_to_trash() {
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(vec![read("i", "CATGACGTCATGACGTT")], &stats).unwrap();
        assert!(out.edge.is_empty());
        assert_eq!(out.trash, 1);
        assert_eq!(stats.count(Stage::InternalMotif), 1);
    }

    #[test]
    fn internal_filter_is_idempotent() {
        let c = cascade();
        let edges = vec![
            EdgeRead { read: read("a", "CATGACGTT"), end: End::FivePrime, offset: 13 },
            EdgeRead { read: read("b", "ACGTTCATG"), end: End::ThreePrime, offset: 13 },
            EdgeRead { read: read("c", "CATGCATGA"), end: End::FivePrime, offset: 5 },
        ];
        let (once, dropped) = c.filter_internal(edges);
        assert_eq!(dropped, 1);
        let (twice, dropped_again) = c.filter_internal(once.clone());
        assert_eq!(dropped_again, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn every_read_lands_in_exactly_one_bucket() {
        let a3 = std::str::from_utf8(A3).unwrap();
        let reads = vec![
            read("inner", &filler(60)),
            read("edge", &format!("CTTCCGATCTCATG{}", filler(20))),
            read("short", &format!("ACG{a3}")),
            read("len9trash", &format!("ACGTTGCAAC{a3}")),
            read("internal", "CATGACGTCATGACGTT"),
            read("edge9", &format!("CATGACGTT{a3}")),
        ];
        let n = reads.len() as u64;
        let stats = StatsAggregator::new("t");
        let out = cascade().classify(reads, &stats).unwrap();
        assert_eq!(out.count(ClassificationBucket::InnerOriginalLength), 1);
        assert_eq!(out.count(ClassificationBucket::EdgeTrimmed), 2);
        assert_eq!(out.count(ClassificationBucket::Trash), 3);
        assert_eq!(out.inner.len() as u64 + out.edge.len() as u64 + out.trash, n);
        assert_eq!(stats.count(ClassificationBucket::Trash.into()), 3);
    }

    #[test]
    fn empty_input_reports_zero_everywhere() {
        let stats = StatsAggregator::new("empty");
        let out = cascade().classify(Vec::new(), &stats).unwrap();
        assert_eq!(out, CascadeOutput::default());
        assert_eq!(stats.warnings().len(), 1);
    }

    struct FailingTrimmer;

    impl Trimmer for FailingTrimmer {
        fn name(&self) -> &str { "failing" }

        fn trim(&self, _reads: Vec<Read>, _spec: &TrimSpec) -> Result<TrimOutcome> {
            Err(Error::CollaboratorFailure { tool: "failing".into(), reason: "boom".into() })
        }
    }

    #[test]
    fn trimmer_failure_aborts_classification() {
        let c = MotifCascade::with_trimmer(CascadeConfig::new(A5, A3, MOTIF), FailingTrimmer).unwrap();
        let r = c.classify(vec![read("x", &filler(20))], &StatsAggregator::new("t"));
        assert!(matches!(r, Err(Error::CollaboratorFailure { .. })));
    }

    #[test]
    fn one_shot_classify_returns_three_buckets() {
        let (inner, edge, trash) = classify(vec![read("x", &filler(30))], A5, A3, MOTIF).unwrap();
        assert_eq!((inner.len(), edge.len(), trash), (1, 0, 0));
    }
}
