//! The cascade as data: one [`MotifSearchWindow`] per offset.
//!
//! For an adapter of length `L` the table has `L` windows:
//! offsets `1..L-1` search the adapter remnants, offset `L-1` pairs the
//! one-base remnants with the motif, and offset `L` looks for the bare motif.
use crate::read::End;

/// What to do with a read once a half-search matched it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchAction {
    /// Remove the matched bases from the read end.
    Trim,
    /// Replace the matched window with the bare motif.
    Substitute,
    /// Report the match, leave the read untouched.
    Detect,
}

/// Shape of a window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WindowKind {
    Remnant,
    HalfSplit,
    BareMotif,
}

/// One anchored half-search of a window.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HalfSearch {
    pub end: End,
    pub pattern: Vec<u8>,
    pub min_overlap: usize,
    pub action: MatchAction,
}

/// One cascade iteration. The 5' half always runs before the 3' half, on the
/// reads the 5' half left unmatched.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MotifSearchWindow {
    pub offset: usize,
    pub kind: WindowKind,
    /// Adapter bases still searched at this offset (0 for the bare motif).
    pub remnant_len: usize,
    pub five: HalfSearch,
    pub three: HalfSearch,
}

impl MotifSearchWindow {
    pub fn halves(&self) -> [&HalfSearch; 2] { [&self.five, &self.three] }
}

/// Build the ordered window table for two equal-length adapters and a motif.
///
/// Lengths are validated by [`crate::config::CascadeConfig::validate`].
pub fn window_table(adapter5: &[u8], adapter3: &[u8], motif: &[u8]) -> Vec<MotifSearchWindow> {
    let len = adapter5.len();
    let mut table = Vec::with_capacity(len);
    for offset in 1..len.saturating_sub(1) {
        let five = adapter5[offset..].to_vec();
        let three = adapter3[..len - offset].to_vec();
        table.push(MotifSearchWindow {
            offset,
            kind: WindowKind::Remnant,
            remnant_len: len - offset,
            five: HalfSearch { end: End::FivePrime, min_overlap: five.len(), pattern: five, action: MatchAction::Trim },
            three: HalfSearch { end: End::ThreePrime, min_overlap: three.len(), pattern: three, action: MatchAction::Trim },
        });
    }
    if len >= 2 {
        let offset = len - 1;
        let mut five = adapter5[offset..].to_vec();
        five.extend_from_slice(motif);
        let mut three = motif.to_vec();
        three.extend_from_slice(&adapter3[..len - offset]);
        table.push(MotifSearchWindow {
            offset,
            kind: WindowKind::HalfSplit,
            remnant_len: len - offset,
            five: HalfSearch { end: End::FivePrime, min_overlap: five.len(), pattern: five, action: MatchAction::Substitute },
            three: HalfSearch { end: End::ThreePrime, min_overlap: three.len(), pattern: three, action: MatchAction::Substitute },
        });
    }
    if len >= 1 {
        table.push(MotifSearchWindow {
            offset: len,
            kind: WindowKind::BareMotif,
            remnant_len: 0,
            five: HalfSearch { end: End::FivePrime, pattern: motif.to_vec(), min_overlap: motif.len(), action: MatchAction::Detect },
            three: HalfSearch { end: End::ThreePrime, pattern: motif.to_vec(), min_overlap: motif.len(), action: MatchAction::Detect },
        });
    }
    table
}
