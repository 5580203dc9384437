//! Error taxonomy shared by every stage of the pipeline.
//!
//! All fatal conditions abort processing of the current input file. The
//! [`Error::Stage`] wrapper attaches the stage name and the file so the
//! binary can print one diagnostic per failed file.
use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fatal pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An input record does not form a complete read or alignment unit.
    #[error("malformed record #{record} in {path}: {reason}")]
    MalformedRecord { path: String, record: usize, reason: String },

    /// A derived statistic went negative or buckets do not add up.
    #[error("accounting invariant violated: {0}")]
    AccountingInvariant(String),

    /// The trimmer or aligner reported a failure.
    #[error("{tool} failed: {reason}")]
    CollaboratorFailure { tool: String, reason: String },

    /// A percentage was requested against a total of zero.
    #[error("percentage of `{stage}` is undefined: total input count is zero")]
    UndefinedPercentage { stage: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A fatal error annotated with the stage and file it aborted.
    #[error("{stage} stage failed for {}: {source}", path.display())]
    Stage {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap `self` with the pipeline stage and the input file it aborted.
    pub fn in_stage(self, stage: &'static str, path: impl Into<PathBuf>) -> Self {
        match self {
            already @ Error::Stage { .. } => already,
            other => Error::Stage { stage, path: path.into(), source: Box::new(other) },
        }
    }

    pub(crate) fn collaborator(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CollaboratorFailure { tool: tool.into(), reason: reason.into() }
    }
}

/// Non-fatal conditions recorded while processing a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// The file contained zero reads; percentages are reported as undefined.
    EmptyInput { label: String },
}

impl Warning {
    /// Short machine-readable name, used in report rows.
    pub fn kind(&self) -> &'static str {
        match self {
            Warning::EmptyInput { .. } => "empty_input",
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::EmptyInput { label } => {
                write!(f, "{label}: no reads in input, percentages are undefined")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_wrapping_is_not_nested() {
        let e = Error::AccountingInvariant("trash < 0".into())
            .in_stage("cascade", "a.fastq")
            .in_stage("run", "a.fastq");
        match e {
            Error::Stage { stage, source, .. } => {
                assert_eq!(stage, "cascade");
                assert!(matches!(*source, Error::AccountingInvariant(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn diagnostic_names_stage_and_file() {
        let e = Error::MalformedRecord { path: "x.fq".into(), record: 3, reason: "short".into() }
            .in_stage("cascade", "x.fq");
        let msg = e.to_string();
        assert!(msg.contains("cascade") && msg.contains("x.fq"));
    }
}
