//! Alignment records and the **Aligner** collaborator.
//!
//! ### Design
//! - SAM/BAM files are read with `rust-htslib`; `bam::Record` implements
//!   [`AlignmentFlags`] directly so the classifier can work on full records.
//! - Line-oriented inputs (`id<TAB>flag[<TAB>...]`, SAM body lines included)
//!   parse into the lightweight [`AlignmentRecord`].
//! - The aligner itself is an external program driven by [`CommandAligner`].
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::Command;

use rust_htslib::bam;

use crate::error::{Error, Result};

/// SAM flag: read unmapped.
pub const FLAG_UNMAPPED: u16 = 0x4;
/// SAM flag: not the primary alignment.
pub const FLAG_SECONDARY: u16 = 0x100;

/// What the multiplicity classifier needs to know about a record.
pub trait AlignmentFlags {
    fn read_name(&self) -> &[u8];
    fn flag_bits(&self) -> u16;

    fn is_secondary(&self) -> bool { self.flag_bits() & FLAG_SECONDARY != 0 }
    fn is_unmapped(&self) -> bool { self.flag_bits() & FLAG_UNMAPPED != 0 }
}

impl AlignmentFlags for bam::Record {
    fn read_name(&self) -> &[u8] { self.qname() }
    fn flag_bits(&self) -> u16 { self.flags() }
}

/// Read identifier plus the SAM flag field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignmentRecord {
    pub id: String,
    pub flag: u16,
}

impl AlignmentRecord {
    pub fn new(id: impl Into<String>, flag: u16) -> Self { AlignmentRecord { id: id.into(), flag } }

    /// Parse `id<TAB>flag`, ignoring any further fields.
    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        let mut fields = line.trim_end_matches(['\r', '\n']).split('\t');
        let id = fields.next().filter(|s| !s.is_empty()).ok_or("missing read identifier")?;
        let flag = fields.next().ok_or("missing flag field")?;
        let flag = flag.parse::<u16>().map_err(|e| format!("flag `{flag}`: {e}"))?;
        Ok(AlignmentRecord::new(id, flag))
    }
}

impl AlignmentFlags for AlignmentRecord {
    fn read_name(&self) -> &[u8] { self.id.as_bytes() }
    fn flag_bits(&self) -> u16 { self.flag }
}

/// Parse a line-oriented alignment stream; `@` header lines and blank lines
/// are skipped. Any unparsable line is fatal.
pub fn parse_alignment_lines<'a, R: BufRead + 'a>(reader: R, label: &'a str) -> impl Iterator<Item = Result<AlignmentRecord>> + 'a {
    reader.lines().enumerate().filter_map(move |(i, line)| {
        let line = match line {
            Ok(l) => l,
            Err(e) => return Some(Err(Error::Io(e))),
        };
        if line.is_empty() || line.starts_with('@') {
            return None;
        }
        Some(AlignmentRecord::parse_line(&line).map_err(|reason| Error::MalformedRecord {
            path: label.to_string(),
            record: i + 1,
            reason,
        }))
    })
}

/// Capability that maps reads to a reference and yields an alignment file in
/// which all records of one read are contiguous.
pub trait Aligner: Send + Sync {
    fn name(&self) -> &str;

    /// Align `reads` against `reference`, writing SAM/BAM to `output`.
    ///
    /// Returns the alignment to classify: `output`, or an existing file the
    /// aligner hands back instead.
    fn align(&self, reads: &[PathBuf], reference: &Path, output: &Path) -> Result<PathBuf>;
}

/// Runs an external aligner.
///
/// Arguments may contain `{reference}`, `{reads}` (comma-joined), `{reads_sp}`
/// (one argument per file) and `{output}` placeholders.
#[derive(Clone, Debug)]
pub struct CommandAligner {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandAligner {
    /// Split a whitespace-separated command template into program and arguments.
    pub fn from_template(template: &str) -> Result<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::InvalidConfig("aligner command is empty".into()))?;
        Ok(CommandAligner { program, args: parts.collect() })
    }

    fn expand(&self, reads: &[PathBuf], reference: &Path, output: &Path) -> Vec<String> {
        let joined = reads.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(",");
        let mut out = Vec::with_capacity(self.args.len() + reads.len());
        for a in &self.args {
            if a == "{reads_sp}" {
                out.extend(reads.iter().map(|p| p.display().to_string()));
                continue;
            }
            out.push(
                a.replace("{reference}", &reference.display().to_string())
                    .replace("{reads}", &joined)
                    .replace("{output}", &output.display().to_string()),
            );
        }
        out
    }
}

impl Aligner for CommandAligner {
    fn name(&self) -> &str { &self.program }

    fn align(&self, reads: &[PathBuf], reference: &Path, output: &Path) -> Result<PathBuf> {
        let args = self.expand(reads, reference, output);
        log::info!("align: {} {}", self.program, args.join(" "));
        let out = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| Error::collaborator(&self.program, format!("could not start: {e}")))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(Error::collaborator(
                &self.program,
                format!("{} ({})", out.status, tail.into_iter().rev().collect::<Vec<_>>().join(" | ")),
            ));
        }
        // The output may be pre-created by the caller, so an empty file counts as missing.
        if std::fs::metadata(output).map_or(true, |m| m.len() == 0) {
            return Err(Error::collaborator(&self.program, format!("no output at {}", output.display())));
        }
        Ok(output.to_path_buf())
    }
}

/// Hands back an alignment produced outside the pipeline.
#[derive(Clone, Debug)]
pub struct PrecomputedAligner {
    pub path: PathBuf,
}

impl Aligner for PrecomputedAligner {
    fn name(&self) -> &str { "precomputed" }

    fn align(&self, _reads: &[PathBuf], _reference: &Path, _output: &Path) -> Result<PathBuf> {
        if self.path.exists() {
            Ok(self.path.clone())
        } else {
            Err(Error::collaborator("precomputed", format!("{} does not exist", self.path.display())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sam_body_lines() {
        let r = AlignmentRecord::parse_line("ERR1.1\t272\tchr1\t100\t0\t10M\t*\t0\t0\tACGTACGTAC\t*").unwrap();
        assert_eq!(r.id, "ERR1.1");
        assert!(r.is_secondary());
        assert!(!r.is_unmapped());
        let r = AlignmentRecord::parse_line("x\t4").unwrap();
        assert!(r.is_unmapped());
    }

    #[test]
    fn rejects_lines_without_flag() {
        assert!(AlignmentRecord::parse_line("only-id").is_err());
        assert!(AlignmentRecord::parse_line("id\tnotanumber").is_err());
        assert!(AlignmentRecord::parse_line("\t0").is_err());
    }

    #[test]
    fn line_stream_skips_header_and_reports_bad_lines() {
        let data = "@HD\tVN:1.6\nr1\t0\n\nr1\t256\nbroken\n";
        let got: Vec<_> = parse_alignment_lines(data.as_bytes(), "mem.sam").collect();
        assert_eq!(got.len(), 3);
        assert!(got[0].is_ok() && got[1].is_ok());
        match &got[2] {
            Err(Error::MalformedRecord { record, .. }) => assert_eq!(*record, 5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn command_template_expands_placeholders() {
        let a = CommandAligner::from_template("bowtie2 -x {reference} -U {reads} -S {output} --reorder").unwrap();
        let args = a.expand(&[PathBuf::from("a.fq"), PathBuf::from("b.fq")], Path::new("ref"), Path::new("o.sam"));
        assert_eq!(args, vec!["-x", "ref", "-U", "a.fq,b.fq", "-S", "o.sam", "--reorder"]);
        assert!(CommandAligner::from_template("   ").is_err());
    }

    #[test]
    fn failing_aligner_is_a_collaborator_failure() {
        let a = CommandAligner { program: "motifcut-no-such-aligner".into(), args: vec![] };
        let r = a.align(&[], Path::new("ref"), Path::new("out.sam"));
        assert!(matches!(r, Err(Error::CollaboratorFailure { .. })));
    }

    #[test]
    fn successful_exit_without_output_is_a_failure() {
        let out = tempfile::NamedTempFile::new().unwrap();
        let a = CommandAligner { program: "sh".into(), args: vec!["-c".into(), "exit 0".into()] };
        let r = a.align(&[], Path::new("ref"), out.path());
        assert!(matches!(r, Err(Error::CollaboratorFailure { .. })), "{r:?}");
    }
}
