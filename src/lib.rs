#![forbid(unsafe_code)]
//! # motifcut
//!
//! Restriction-motif aware read trimming and alignment-multiplicity
//! classification for proximity-ligation style libraries.
//!
//! Raw reads are stripped of a coarse 3' adapter, then walked through a
//! **motif cascade**: an ordered table of anchored searches for ever shorter
//! adapter remnants, ending with the bare restriction motif. Each read ends up
//! as an **edge** read (motif at a trimmable end), an **inner** read (kept at
//! full length) or **trash**. After alignment the records are grouped per read
//! and split by how often the read mapped.
//!
//! ## Highlights
//! - 🧮 **Declarative cascade**: offsets are data ([`window::MotifSearchWindow`]), one executor runs them.
//! - 🔁 **Two pools in parallel** via `rayon`; windows within a pool stay strictly ordered.
//! - 📊 **Exact percentages**: integer arithmetic with half-up rounding, `undefined` on empty input.
//! - 🧾 **All-or-nothing outputs**: files are staged and only renamed into place on success.
//!
//! ## Examples
//! ```rust
//! use motifcut::read::{Pool, Read};
//!
//! let seq = b"CTTCCGATCTCATGACGTTGCAACGTTGCA";
//! let read = Read::new("r1", seq, &vec![b'I'; seq.len()], Pool::OrigLen);
//! let (inner, edge, trash) =
//!     motifcut::classify(vec![read], b"GCTCTTCCGATCT", b"AGATCGGAAGAGC", b"CATG").unwrap();
//! assert!(inner.is_empty() && trash == 0);
//! assert_eq!(&edge[0].seq[..4], b"CATG");
//!
//! // Motifs may be named by enzyme.
//! assert_eq!(motifcut::resolve_motif("NlaIII").unwrap(), b"CATG");
//! ```
//!
//! ## Version
//! This build is "0.1.0".

pub mod alignment;
pub mod cascade;
pub mod config;
pub mod data { pub mod sites; }
pub mod detect;
pub mod enzymes;
pub mod error;
pub mod multiplicity;
pub mod pipeline;
pub mod read;
pub mod report;
pub mod seqio;
pub mod stats;
pub mod trimmer;
pub mod window;

pub use cascade::{classify, CascadeOutput, MotifCascade};
pub use config::{CascadeConfig, CoarseStrip};
pub use enzymes::{get_enzyme, list_enzymes, resolve_motif, Enzyme};
pub use error::{Error, Result, Warning};
pub use multiplicity::{MultiplicityBucket, MultiplicityClassifier};
pub use stats::{Percentage, Stage, StatsAggregator};

/// Crate version string (from `CARGO_PKG_VERSION`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
