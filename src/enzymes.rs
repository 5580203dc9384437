//! Registry of restriction enzymes whose recognition site can serve as the
//! cascade motif.
//!
//! Lookups are case-insensitive, so `--enzyme nlaiii` and `--enzyme NlaIII`
//! resolve to the same entry.
use core::fmt;

use crate::data::sites::*;
use crate::error::{Error, Result};

/// Where a recognition site came from.
#[derive(Clone, Debug)]
pub struct Provenance {
    pub source: &'static str,
    pub url: &'static str,
}

/// A restriction enzyme and its recognition site.
#[derive(Clone, Debug)]
pub struct Enzyme {
    pub name: &'static str,
    /// Uppercase top-strand recognition sequence.
    pub site: &'static str,
    pub provenance: Provenance,
}

impl fmt::Display for Enzyme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} ({})", self.name, self.site) }
}

pub const ENZYMES: &[Enzyme] = &[
    DPNII, MBOI, SAU3AI,
    NLAIII,
    MSEI,
    CVIQI, CSP6I, RSAI,
    ALUI,
    BFAI,
    HPYCH4IV,
    MLUCI,
    HAEIII,
    MSPI, HPAII,
    TAQI,
];

/// Return the static registry.
pub fn list_enzymes() -> &'static [Enzyme] { ENZYMES }

/// Retrieve an enzyme by name (case-insensitive).
pub fn get_enzyme(name: &str) -> Option<&'static Enzyme> {
    ENZYMES.iter().find(|e| e.name.eq_ignore_ascii_case(name))
}

/// Resolve a motif given either as an enzyme name or as a literal sequence.
pub fn resolve_motif(name_or_seq: &str) -> Result<Vec<u8>> {
    if let Some(e) = get_enzyme(name_or_seq) {
        return Ok(e.site.as_bytes().to_vec());
    }
    let seq = name_or_seq.to_ascii_uppercase();
    if !seq.is_empty() && seq.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')) {
        return Ok(seq.into_bytes());
    }
    Err(Error::InvalidConfig(format!(
        "`{name_or_seq}` is neither a known enzyme nor an ACGT motif; see `motifcut enzymes`"
    )))
}

/// Rows `(name, site, source)` for display.
pub fn enzyme_rows() -> Vec<(String, String, String)> {
    ENZYMES
        .iter()
        .map(|e| (e.name.to_string(), e.site.to_string(), e.provenance.source.to_string()))
        .collect()
}
