//! Run configuration for the coarse strip and the cascade.
use crate::detect::MAX_PATTERN_LEN;
use crate::error::{Error, Result};
use crate::window::{window_table, MotifSearchWindow};

/// Default adapter length the cascade counts down from.
pub const DEFAULT_ADAPTER_LEN: usize = 13;
/// Default per-window error tolerance.
pub const DEFAULT_ERROR_RATE: f64 = 0.01;

/// Coarse adapter removal performed before the cascade.
#[derive(Clone, Debug, PartialEq)]
pub struct CoarseStrip {
    /// 3' adapter searched anywhere in the read.
    pub adapter: Vec<u8>,
    pub min_overlap: usize,
    pub error_rate: f64,
    /// Trimmed reads shorter than this are trash; the bound is inclusive.
    pub min_length: usize,
}

impl CoarseStrip {
    pub fn new(adapter: &[u8]) -> Self {
        CoarseStrip { adapter: adapter.to_ascii_uppercase(), min_overlap: 12, error_rate: 0.1, min_length: 9 }
    }
}

/// Everything the cascade needs for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct CascadeConfig {
    pub adapter5: Vec<u8>,
    pub adapter3: Vec<u8>,
    pub motif: Vec<u8>,
    pub error_rate: f64,
    pub coarse: CoarseStrip,
}

impl CascadeConfig {
    /// New config with default tolerances; the coarse adapter defaults to `adapter3`.
    pub fn new(adapter5: &[u8], adapter3: &[u8], motif: &[u8]) -> Self {
        CascadeConfig {
            adapter5: adapter5.to_ascii_uppercase(),
            adapter3: adapter3.to_ascii_uppercase(),
            motif: motif.to_ascii_uppercase(),
            error_rate: DEFAULT_ERROR_RATE,
            coarse: CoarseStrip::new(adapter3),
        }
    }

    pub fn with_coarse(mut self, coarse: CoarseStrip) -> Self {
        self.coarse = coarse;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_seq("adapter5", &self.adapter5)?;
        check_seq("adapter3", &self.adapter3)?;
        check_seq("motif", &self.motif)?;
        check_seq("coarse adapter", &self.coarse.adapter)?;
        if self.adapter5.len() != self.adapter3.len() {
            return Err(Error::InvalidConfig(format!(
                "adapter5 ({} bp) and adapter3 ({} bp) must have the same length",
                self.adapter5.len(),
                self.adapter3.len()
            )));
        }
        if self.adapter5.len() < 2 {
            return Err(Error::InvalidConfig("adapters must be at least 2 bp".into()));
        }
        if self.coarse.adapter.len() > MAX_PATTERN_LEN {
            return Err(Error::InvalidConfig(format!(
                "coarse adapter is {} bp, at most {MAX_PATTERN_LEN} bp supported",
                self.coarse.adapter.len()
            )));
        }
        if self.coarse.min_overlap == 0 || self.coarse.min_overlap > self.coarse.adapter.len() {
            return Err(Error::InvalidConfig(format!(
                "coarse minimum overlap {} must be within 1..={}",
                self.coarse.min_overlap,
                self.coarse.adapter.len()
            )));
        }
        check_rate("cascade error rate", self.error_rate)?;
        check_rate("coarse error rate", self.coarse.error_rate)?;
        Ok(())
    }

    /// The ordered cascade table for this configuration.
    pub fn windows(&self) -> Vec<MotifSearchWindow> {
        window_table(&self.adapter5, &self.adapter3, &self.motif)
    }
}

fn check_seq(what: &str, seq: &[u8]) -> Result<()> {
    if seq.is_empty() {
        return Err(Error::InvalidConfig(format!("{what} must not be empty")));
    }
    if let Some(b) = seq.iter().find(|b| !matches!(b, b'A' | b'C' | b'G' | b'T' | b'N')) {
        return Err(Error::InvalidConfig(format!("{what} contains non-ACGTN base '{}'", *b as char)));
    }
    Ok(())
}

fn check_rate(what: &str, rate: f64) -> Result<()> {
    if !(0.0..1.0).contains(&rate) {
        return Err(Error::InvalidConfig(format!("{what} {rate} must be within [0, 1)")));
    }
    Ok(())
}
