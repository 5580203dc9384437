//! Recognition sites of **4-cutter** restriction enzymes.
//!
//! Source: REBASE, the Restriction Enzyme Database (enzyme pages, 5'->3' top
//! strand). Isoschizomers share one site and are listed separately so either
//! name resolves.
//!
//! Notes:
//! - Only the recognition sequence is recorded; cut positions do not matter to
//!   the cascade, which searches for the intact site.

use crate::enzymes::{Enzyme, Provenance};

const REBASE: Provenance = Provenance {
    source: "REBASE, the Restriction Enzyme Database",
    url: "http://rebase.neb.com/rebase/rebase.html",
};

/// DpnII. 5'-^GATC-3'
pub const DPNII: Enzyme = Enzyme { name: "DpnII", site: "GATC", provenance: REBASE };
/// MboI, isoschizomer of DpnII.
pub const MBOI: Enzyme = Enzyme { name: "MboI", site: "GATC", provenance: REBASE };
/// Sau3AI, isoschizomer of DpnII.
pub const SAU3AI: Enzyme = Enzyme { name: "Sau3AI", site: "GATC", provenance: REBASE };
/// NlaIII. 5'-CATG^-3'
pub const NLAIII: Enzyme = Enzyme { name: "NlaIII", site: "CATG", provenance: REBASE };
/// MseI. 5'-T^TAA-3'
pub const MSEI: Enzyme = Enzyme { name: "MseI", site: "TTAA", provenance: REBASE };
/// CviQI. 5'-G^TAC-3'
pub const CVIQI: Enzyme = Enzyme { name: "CviQI", site: "GTAC", provenance: REBASE };
/// Csp6I, isoschizomer of CviQI.
pub const CSP6I: Enzyme = Enzyme { name: "Csp6I", site: "GTAC", provenance: REBASE };
/// RsaI (blunt). 5'-GT^AC-3'
pub const RSAI: Enzyme = Enzyme { name: "RsaI", site: "GTAC", provenance: REBASE };
/// AluI (blunt). 5'-AG^CT-3'
pub const ALUI: Enzyme = Enzyme { name: "AluI", site: "AGCT", provenance: REBASE };
/// BfaI. 5'-C^TAG-3'
pub const BFAI: Enzyme = Enzyme { name: "BfaI", site: "CTAG", provenance: REBASE };
/// HpyCH4IV. 5'-A^CGT-3'
pub const HPYCH4IV: Enzyme = Enzyme { name: "HpyCH4IV", site: "ACGT", provenance: REBASE };
/// MluCI. 5'-^AATT-3'
pub const MLUCI: Enzyme = Enzyme { name: "MluCI", site: "AATT", provenance: REBASE };
/// HaeIII (blunt). 5'-GG^CC-3'
pub const HAEIII: Enzyme = Enzyme { name: "HaeIII", site: "GGCC", provenance: REBASE };
/// MspI. 5'-C^CGG-3'
pub const MSPI: Enzyme = Enzyme { name: "MspI", site: "CCGG", provenance: REBASE };
/// HpaII, methylation-sensitive isoschizomer of MspI.
pub const HPAII: Enzyme = Enzyme { name: "HpaII", site: "CCGG", provenance: REBASE };
/// TaqI. 5'-T^CGA-3'
pub const TAQI: Enzyme = Enzyme { name: "TaqI", site: "TCGA", provenance: REBASE };
