//! IO for **FASTQ / FASTQ.GZ** reads and staged (all-or-nothing) outputs.
//!
//! ### Design
//! - FASTQ/FASTQ.GZ parsed with `needletail`; compression is detected from
//!   the content.
//! - Parsing is strict: a truncated record, a FASTA record or a sequence and
//!   quality of different lengths is fatal for the whole file.
//! - Outputs are written into a hidden temporary file next to the
//!   destination and renamed into place on [`StagedFile::commit`]; dropping an
//!   uncommitted file removes it. The temporary name keeps the destination's
//!   extensions, so tools handed a staged path still see `.fastq.gz` or `.sam`.
//!
//! ### Example
//! ```no_run
//! use motifcut::read::Pool;
//! use motifcut::seqio;
//! let reads = seqio::read_fastq("reads.fastq.gz", Pool::OrigLen).unwrap();
//! println!("loaded {} reads", reads.len());
//! ```
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use needletail::errors::ParseErrorKind;
use needletail::parse_fastx_reader;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::read::{Pool, Read};

/// Load every record of a FASTQ file.
pub fn read_fastq<P: AsRef<Path>>(path: P, pool: Pool) -> Result<Vec<Read>> {
    let p = path.as_ref();
    let file = File::open(p)?;
    read_fastq_from(file, &p.display().to_string(), pool)
}

/// Load every record from any reader; `label` names the source in errors.
pub fn read_fastq_from<R>(reader: R, label: &str, pool: Pool) -> Result<Vec<Read>>
where
    R: std::io::Read + Send + 'static,
{
    let malformed = |record: usize, reason: String| Error::MalformedRecord { path: label.to_string(), record, reason };

    let mut parser = match parse_fastx_reader(reader) {
        Ok(p) => p,
        Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => return Ok(Vec::new()),
        Err(e) => return Err(malformed(1, e.to_string())),
    };

    let mut reads = Vec::new();
    while let Some(record) = parser.next() {
        let n = reads.len() + 1;
        let rec = record.map_err(|e| malformed(n, e.to_string()))?;
        let qual = rec
            .qual()
            .ok_or_else(|| malformed(n, "not a FASTQ record (no quality line)".into()))?;
        let seq = rec.seq();
        if seq.len() != qual.len() {
            return Err(malformed(n, format!("sequence length {} != quality length {}", seq.len(), qual.len())));
        }
        let id = String::from_utf8_lossy(rec.id()).to_string();
        reads.push(Read::new(id, &seq, qual, pool));
    }
    Ok(reads)
}

pub fn write_fastq_record<W: Write>(w: &mut W, id: &str, seq: &[u8], qual: &[u8]) -> std::io::Result<()> {
    w.write_all(b"@")?;
    w.write_all(id.as_bytes())?;
    w.write_all(b"\n")?;
    w.write_all(seq)?;
    w.write_all(b"\n+\n")?;
    w.write_all(qual)?;
    w.write_all(b"\n")?;
    Ok(())
}

/// An output that only appears at its destination once committed.
#[derive(Debug)]
pub struct StagedFile {
    tmp: NamedTempFile,
    dest: PathBuf,
}

impl StagedFile {
    pub fn create<P: AsRef<Path>>(dest: P) -> Result<Self> {
        let dest = dest.as_ref().to_path_buf();
        let dir = match dest.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = dest.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let tmp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(&format!(".{name}"))
            .tempfile_in(dir)?;
        Ok(StagedFile { tmp, dest })
    }

    /// Path of the temporary file, for writers that open by path.
    pub fn path(&self) -> &Path { self.tmp.path() }

    pub fn dest(&self) -> &Path { &self.dest }

    /// A fresh handle on the temporary file.
    pub fn reopen(&self) -> Result<File> { Ok(self.tmp.reopen()?) }

    /// Move the temporary file to its destination.
    pub fn commit(self) -> Result<PathBuf> {
        let StagedFile { tmp, dest } = self;
        tmp.persist(&dest).map_err(|e| Error::Io(e.error))?;
        Ok(dest)
    }
}

enum Sink {
    Plain(BufWriter<File>),
    Gz(GzEncoder<BufWriter<File>>),
}

/// Staged FASTQ writer; gzip-compressed when the destination ends in `.gz`.
pub struct FastqWriter {
    staged: StagedFile,
    sink: Sink,
    written: usize,
}

impl FastqWriter {
    pub fn create<P: AsRef<Path>>(dest: P) -> Result<Self> {
        let staged = StagedFile::create(&dest)?;
        let out = BufWriter::new(staged.reopen()?);
        let sink = if is_gz(dest.as_ref()) {
            Sink::Gz(GzEncoder::new(out, Compression::default()))
        } else {
            Sink::Plain(out)
        };
        Ok(FastqWriter { staged, sink, written: 0 })
    }

    pub fn write(&mut self, read: &Read) -> Result<()> {
        match &mut self.sink {
            Sink::Plain(w) => write_fastq_record(w, &read.id, &read.seq, &read.qual)?,
            Sink::Gz(w) => write_fastq_record(w, &read.id, &read.seq, &read.qual)?,
        }
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize { self.written }

    /// Finish compression and flush; the file stays staged.
    pub fn finish(self) -> Result<StagedFile> {
        let FastqWriter { staged, sink, .. } = self;
        let mut inner = match sink {
            Sink::Plain(w) => w,
            Sink::Gz(gz) => gz.finish()?,
        };
        inner.flush()?;
        Ok(staged)
    }

    /// Finish, then move the file into place.
    pub fn commit(self) -> Result<PathBuf> { self.finish()?.commit() }
}

fn is_gz(p: &Path) -> bool {
    p.extension().and_then(|e| e.to_str()).map_or(false, |e| e.eq_ignore_ascii_case("gz"))
}

/// File name without FASTQ/SAM/BAM/TSV extensions (`a.fastq.gz` -> `a`).
pub fn file_stem(path: &Path) -> String {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("reads").to_string();
    let lower = name.to_ascii_lowercase();
    for ext in [".fastq.gz", ".fq.gz", ".fastq", ".fq", ".sam", ".bam", ".tsv"] {
        if lower.ends_with(ext) {
            return name[..name.len() - ext.len()].to_string();
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> Result<Vec<Read>> {
        read_fastq_from(Cursor::new(text.as_bytes().to_vec()), "mem.fq", Pool::OrigLen)
    }

    #[test]
    fn parses_four_line_records() {
        let reads = parse("@r1 desc\nacgt\n+\nIIII\n@r2\nGGCC\n+\nJJJJ\n").unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].id, "r1 desc");
        assert_eq!(reads[0].seq, b"ACGT");
        assert_eq!(reads[1].qual, b"JJJJ");
    }

    #[test]
    fn quality_length_mismatch_is_malformed() {
        let err = parse("@r1\nACGT\n+\nIII\n").unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }), "{err:?}");
    }

    #[test]
    fn truncated_record_is_malformed() {
        let err = parse("@r1\nACGT\n+\nIIII\n@r2\nACGT\n").unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { record: 2, .. }), "{err:?}");
    }

    #[test]
    fn fasta_is_not_accepted() {
        assert!(matches!(parse(">r1\nACGT\n"), Err(Error::MalformedRecord { .. })));
    }

    #[test]
    fn empty_input_is_not_an_error() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn staged_file_appears_only_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.fastq");
        {
            let mut w = FastqWriter::create(&dest).unwrap();
            w.write(&Read::new("r", b"ACGT", b"IIII", Pool::Len9)).unwrap();
            // dropped without commit
        }
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let mut w = FastqWriter::create(&dest).unwrap();
        w.write(&Read::new("r", b"ACGT", b"IIII", Pool::Len9)).unwrap();
        w.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "@r\nACGT\n+\nIIII\n");
    }

    #[test]
    fn gz_output_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.fastq.gz");
        let mut w = FastqWriter::create(&dest).unwrap();
        w.write(&Read::new("r1", b"CATGAC", b"IIIIII", Pool::Len9)).unwrap();
        w.commit().unwrap();
        let back = read_fastq(&dest, Pool::Len9).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].seq, b"CATGAC");
    }

    #[test]
    fn finished_writer_is_readable_before_commit() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("s.edge.fastq.gz");
        let mut w = FastqWriter::create(&dest).unwrap();
        w.write(&Read::new("r1", b"CATGAC", b"IIIIII", Pool::Len9)).unwrap();
        let staged = w.finish().unwrap();

        assert!(!dest.exists());
        let name = staged.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with('.') && name.ends_with(".fastq.gz"), "{name}");
        assert_eq!(read_fastq(staged.path(), Pool::Len9).unwrap()[0].seq, b"CATGAC");

        drop(staged);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn stems_drop_known_extensions() {
        assert_eq!(file_stem(Path::new("/x/s1.fastq.gz")), "s1");
        assert_eq!(file_stem(Path::new("s1.FQ")), "s1");
        assert_eq!(file_stem(Path::new("aln.bam")), "aln");
        assert_eq!(file_stem(Path::new("notes.txt")), "notes.txt");
    }
}
