//! The **Trimmer** capability and its built-in implementation.
//!
//! A trimmer takes a batch of reads and one literal pattern and splits the
//! batch into reads that carried the pattern (trimmed, or untouched in
//! report-only mode) and reads that did not. Input order is preserved on both
//! sides.
use rayon::prelude::*;

use crate::detect::{allowed_errors, find_five_prime, find_three_prime, match_prefix, match_suffix, Hit};
use crate::error::{Error, Result};
use crate::read::{End, Read};

/// Where the pattern may sit in the read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Placement {
    /// Pattern must touch the read end exactly (`^pattern` / `pattern$`).
    Anchored(End),
    /// Pattern may occur anywhere; the read is cut at the occurrence.
    Unanchored(End),
}

impl Placement {
    pub fn end(self) -> End {
        match self {
            Placement::Anchored(e) | Placement::Unanchored(e) => e,
        }
    }
}

/// One trimming request.
#[derive(Clone, Debug, PartialEq)]
pub struct TrimSpec {
    pub pattern: Vec<u8>,
    pub placement: Placement,
    pub min_overlap: usize,
    pub error_rate: f64,
    /// Report matches without removing anything.
    pub no_trim: bool,
}

impl TrimSpec {
    pub fn anchored(pattern: &[u8], end: End, error_rate: f64) -> Self {
        TrimSpec {
            pattern: pattern.to_vec(),
            placement: Placement::Anchored(end),
            min_overlap: pattern.len(),
            error_rate,
            no_trim: false,
        }
    }

    pub fn unanchored(pattern: &[u8], end: End, min_overlap: usize, error_rate: f64) -> Self {
        TrimSpec { pattern: pattern.to_vec(), placement: Placement::Unanchored(end), min_overlap, error_rate, no_trim: false }
    }

    pub fn report_only(mut self) -> Self {
        self.no_trim = true;
        self
    }
}

/// A matched read together with where the pattern was found.
///
/// `hit` refers to coordinates in the read *before* trimming.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trimmed {
    pub read: Read,
    pub hit: Hit,
    pub end: End,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrimOutcome {
    pub matched: Vec<Trimmed>,
    pub unmatched: Vec<Read>,
}

pub trait Trimmer: Send + Sync {
    fn name(&self) -> &str;

    /// Split `reads` by whether `spec.pattern` was found.
    fn trim(&self, reads: Vec<Read>, spec: &TrimSpec) -> Result<TrimOutcome>;
}

/// Native trimmer built on the `detect` primitives.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotifTrimmer;

impl MotifTrimmer {
    fn locate(read: &[u8], spec: &TrimSpec) -> Result<Option<Hit>> {
        match spec.placement {
            Placement::Anchored(End::FivePrime) => {
                Ok(match_prefix(read, &spec.pattern, allowed_errors(spec.pattern.len(), spec.error_rate)))
            }
            Placement::Anchored(End::ThreePrime) => {
                Ok(match_suffix(read, &spec.pattern, allowed_errors(spec.pattern.len(), spec.error_rate)))
            }
            Placement::Unanchored(End::FivePrime) => find_five_prime(read, &spec.pattern, spec.min_overlap, spec.error_rate),
            Placement::Unanchored(End::ThreePrime) => find_three_prime(read, &spec.pattern, spec.min_overlap, spec.error_rate),
        }
    }

    fn cut(read: Read, hit: Hit, end: End) -> Read {
        match end {
            End::FivePrime => read.trim_start(hit.end),
            End::ThreePrime => {
                let n = read.len();
                read.trim_end(n - hit.start)
            }
        }
    }
}

impl Trimmer for MotifTrimmer {
    fn name(&self) -> &str { "motifcut" }

    fn trim(&self, reads: Vec<Read>, spec: &TrimSpec) -> Result<TrimOutcome> {
        if spec.pattern.is_empty() {
            return Err(Error::collaborator(self.name(), "empty trimming pattern"));
        }
        if spec.min_overlap > spec.pattern.len() {
            return Err(Error::collaborator(
                self.name(),
                format!("minimum overlap {} exceeds pattern length {}", spec.min_overlap, spec.pattern.len()),
            ));
        }
        let end = spec.placement.end();
        let located = reads
            .into_par_iter()
            .map(|read| Self::locate(&read.seq, spec).map(|hit| (read, hit)))
            .collect::<Result<Vec<_>>>()?;

        let mut out = TrimOutcome::default();
        for (read, hit) in located {
            match hit {
                Some(hit) => {
                    let read = if spec.no_trim { read } else { Self::cut(read, hit, end) };
                    out.matched.push(Trimmed { read, hit, end });
                }
                None => out.unmatched.push(read),
            }
        }
        Ok(out)
    }
}
