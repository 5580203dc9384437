//! Core types for **reads**, **pools** and **classification buckets**.
//!
//! A [`Read`] is an immutable value: every transformation consumes the read and
//! returns a new one, so a read is owned by exactly one stage at a time.
use core::fmt;
use core::ops::Range;

/// Which of the two parallel pools a read came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Pool {
    /// Coarse adapter found and removed, read kept at >= minimum length.
    Len9,
    /// No coarse adapter found, read kept at its original length.
    OrigLen,
}

impl Pool {
    pub const ALL: [Pool; 2] = [Pool::Len9, Pool::OrigLen];

    pub fn as_str(self) -> &'static str {
        match self {
            Pool::Len9 => "len9",
            Pool::OrigLen => "orig_len",
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Read end a pattern is anchored to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum End {
    FivePrime,
    ThreePrime,
}

impl End {
    pub fn as_str(self) -> &'static str {
        match self {
            End::FivePrime => "five_prime",
            End::ThreePrime => "three_prime",
        }
    }
}

impl fmt::Display for End {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A sequencing read with its pool tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Read {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    pub pool: Pool,
}

impl Read {
    /// Build a read, upper-casing the sequence. Callers validate lengths.
    pub fn new(id: impl Into<String>, seq: &[u8], qual: &[u8], pool: Pool) -> Self {
        Read {
            id: id.into(),
            seq: seq.to_ascii_uppercase(),
            qual: qual.to_vec(),
            pool,
        }
    }

    pub fn len(&self) -> usize { self.seq.len() }

    pub fn is_empty(&self) -> bool { self.seq.is_empty() }

    /// Keep only `range` of the sequence and quality.
    pub fn slice(self, range: Range<usize>) -> Read {
        let Read { id, seq, qual, pool } = self;
        Read { id, seq: seq[range.clone()].to_vec(), qual: qual[range].to_vec(), pool }
    }

    /// Remove `n` bases from the 5' end.
    pub fn trim_start(self, n: usize) -> Read {
        let len = self.len();
        self.slice(n.min(len)..len)
    }

    /// Remove `n` bases from the 3' end.
    pub fn trim_end(self, n: usize) -> Read {
        let len = self.len();
        self.slice(0..len - n.min(len))
    }

    /// Replace the first `window` bases with `motif`.
    ///
    /// The quality values of the last `motif.len()` positions of the window are
    /// kept for the motif bases, so `window` must be at least `motif.len()`.
    pub fn substitute_start(self, window: usize, motif: &[u8]) -> Read {
        let Read { id, seq, qual, pool } = self;
        let window = window.min(seq.len());
        let keep_from = window.saturating_sub(motif.len());
        let mut new_seq = Vec::with_capacity(seq.len() - window + motif.len());
        new_seq.extend_from_slice(motif);
        new_seq.extend_from_slice(&seq[window..]);
        let new_qual = qual[keep_from..].to_vec();
        Read { id, seq: new_seq, qual: new_qual, pool }
    }

    /// Replace the last `window` bases with `motif`; `window >= motif.len()`
    /// as for [`substitute_start`](Self::substitute_start).
    pub fn substitute_end(self, window: usize, motif: &[u8]) -> Read {
        let Read { id, seq, qual, pool } = self;
        let window = window.min(seq.len());
        let cut = seq.len() - window;
        let mut new_seq = Vec::with_capacity(cut + motif.len());
        new_seq.extend_from_slice(&seq[..cut]);
        new_seq.extend_from_slice(motif);
        let new_qual = qual[..cut + motif.len().min(window)].to_vec();
        Read { id, seq: new_seq, qual: new_qual, pool }
    }

    pub fn with_pool(self, pool: Pool) -> Read { Read { pool, ..self } }
}

/// Final class of a read once it leaves the cascade.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ClassificationBucket {
    Trash,
    InnerOriginalLength,
    EdgeTrimmed,
}

/// A read matched by the cascade, with where the motif is expected to sit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeRead {
    pub read: Read,
    /// End of the read the match was anchored to.
    pub end: End,
    /// Cascade offset that matched (1-based).
    pub offset: usize,
}

impl EdgeRead {
    /// Start position of the edge motif inside the (trimmed) read.
    pub fn edge_position(&self, motif_len: usize) -> Option<usize> {
        match self.end {
            End::FivePrime => Some(0),
            End::ThreePrime => self.read.len().checked_sub(motif_len),
        }
    }
}
