//! Per-file drivers: cascade, multiplicity and the combined run.
//!
//! Every driver reports into one [`StatsAggregator`] owned by the caller and
//! wraps fatal errors with the stage and input path. Outputs go through
//! [`StagedFile`], so a failed file leaves none of its bucket files behind.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rust_htslib::bam::{self, Read as _};

use crate::alignment::{parse_alignment_lines, Aligner};
use crate::cascade::{CascadeOutput, MotifCascade};
use crate::error::{Error, Result};
use crate::multiplicity::{classify_stream, MultiplicityBucket};
use crate::read::Pool;
use crate::report::CsvReporter;
use crate::seqio::{self, FastqWriter, StagedFile};
use crate::stats::{Stage, StatsAggregator};
use crate::trimmer::Trimmer;

/// Alignment input format, chosen from a file extension.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AlignmentFormat {
    Sam,
    Bam,
    /// `id<TAB>flag[<TAB>...]` text, one record per line.
    Lines,
}

impl AlignmentFormat {
    pub fn from_path(p: &Path) -> Self {
        match p.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("bam") => AlignmentFormat::Bam,
            Some(e) if e.eq_ignore_ascii_case("sam") => AlignmentFormat::Sam,
            _ => AlignmentFormat::Lines,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AlignmentFormat::Sam => "sam",
            AlignmentFormat::Bam => "bam",
            AlignmentFormat::Lines => "tsv",
        }
    }

    fn htslib(self) -> bam::Format {
        match self {
            AlignmentFormat::Bam => bam::Format::Bam,
            _ => bam::Format::Sam,
        }
    }
}

/// Where one input's outputs go: `<dir>/<stem>.<kind>.<ext>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    pub dir: PathBuf,
    pub stem: String,
}

impl OutputLayout {
    /// Outputs next to `input`, or inside `out_dir` when given.
    pub fn for_input(input: &Path, out_dir: Option<&Path>) -> Self {
        let dir = match (out_dir, input.parent()) {
            (Some(d), _) => d.to_path_buf(),
            (None, Some(p)) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        OutputLayout { dir, stem: seqio::file_stem(input) }
    }

    fn file(&self, kind: &str, ext: &str) -> PathBuf { self.dir.join(format!("{}.{kind}.{ext}", self.stem)) }

    pub fn edge_fastq(&self) -> PathBuf { self.file("edge", "fastq.gz") }

    pub fn inner_fastq(&self) -> PathBuf { self.file("inner", "fastq.gz") }

    pub fn alignment(&self) -> PathBuf { self.file("aligned", "sam") }

    pub fn bucket(&self, bucket: MultiplicityBucket, format: AlignmentFormat) -> PathBuf {
        self.file(bucket.as_str(), format.extension())
    }
}

/// Paths and counts produced by [`run_cascade_file`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CascadeFiles {
    pub edge: PathBuf,
    pub inner: PathBuf,
    pub edge_reads: u64,
    pub inner_reads: u64,
    pub trash: u64,
}

/// Read counts per multiplicity bucket plus the written files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultiplicityFiles {
    pub paths: Vec<(MultiplicityBucket, PathBuf)>,
    pub reads: [u64; 4],
    pub records: usize,
}

impl MultiplicityFiles {
    pub fn reads_in(&self, bucket: MultiplicityBucket) -> u64 { self.reads[bucket.index()] }
}

/// Cascade outputs written but not yet moved into place.
struct StagedCascade {
    edge: StagedFile,
    inner: StagedFile,
    edge_reads: u64,
    inner_reads: u64,
    trash: u64,
}

impl StagedCascade {
    fn commit(self) -> Result<CascadeFiles> {
        Ok(CascadeFiles {
            edge: self.edge.commit()?,
            inner: self.inner.commit()?,
            edge_reads: self.edge_reads,
            inner_reads: self.inner_reads,
            trash: self.trash,
        })
    }
}

/// Bucket files written but not yet moved into place.
struct StagedBuckets {
    files: Vec<(MultiplicityBucket, StagedFile)>,
    reads: [u64; 4],
    records: usize,
}

impl StagedBuckets {
    fn commit(self) -> Result<MultiplicityFiles> {
        let mut paths = Vec::with_capacity(self.files.len());
        for (bucket, file) in self.files {
            paths.push((bucket, file.commit()?));
        }
        Ok(MultiplicityFiles { paths, reads: self.reads, records: self.records })
    }
}

/// Coarse strip and cascade one FASTQ file, writing its edge and inner reads.
pub fn run_cascade_file<T: Trimmer>(
    input: &Path,
    cascade: &MotifCascade<T>,
    layout: &OutputLayout,
    stats: &StatsAggregator,
) -> Result<CascadeFiles> {
    stage_cascade(input, cascade, layout, stats)?
        .commit()
        .map_err(|e| e.in_stage("write", input))
}

fn stage_cascade<T: Trimmer>(
    input: &Path,
    cascade: &MotifCascade<T>,
    layout: &OutputLayout,
    stats: &StatsAggregator,
) -> Result<StagedCascade> {
    let reads = seqio::read_fastq(input, Pool::OrigLen).map_err(|e| e.in_stage("read", input))?;
    log::info!("{}: {} reads loaded", input.display(), reads.len());
    let out = cascade.classify(reads, stats).map_err(|e| e.in_stage("cascade", input))?;
    write_cascade_outputs(&out, layout).map_err(|e| e.in_stage("write", input))
}

fn write_cascade_outputs(out: &CascadeOutput, layout: &OutputLayout) -> Result<StagedCascade> {
    let mut edge = FastqWriter::create(layout.edge_fastq())?;
    for r in out.edge_reads() {
        edge.write(r)?;
    }
    let mut inner = FastqWriter::create(layout.inner_fastq())?;
    for r in &out.inner {
        inner.write(r)?;
    }
    Ok(StagedCascade {
        edge_reads: edge.written() as u64,
        inner_reads: inner.written() as u64,
        trash: out.trash,
        edge: edge.finish()?,
        inner: inner.finish()?,
    })
}

/// Split one alignment file into the four multiplicity buckets.
///
/// SAM/BAM inputs are read with htslib and their buckets keep the input's
/// format. Any other extension is read as `id<TAB>flag` lines and bucketed
/// into `.tsv` files. The first counter recorded is `aligned.reads` unless
/// `stats` already holds a total.
pub fn run_multiplicity_file(input: &Path, layout: &OutputLayout, stats: &StatsAggregator) -> Result<MultiplicityFiles> {
    stage_buckets(input, layout, stats)
        .and_then(StagedBuckets::commit)
        .map_err(|e| e.in_stage("multiplicity", input))
}

fn stage_buckets(input: &Path, layout: &OutputLayout, stats: &StatsAggregator) -> Result<StagedBuckets> {
    let format = AlignmentFormat::from_path(input);
    let staged = MultiplicityBucket::ALL
        .iter()
        .map(|b| StagedFile::create(layout.bucket(*b, format)))
        .collect::<Result<Vec<_>>>()?;

    let (reads, records) = match format {
        AlignmentFormat::Lines => split_lines(input, &staged)?,
        AlignmentFormat::Sam | AlignmentFormat::Bam => split_records(input, format, &staged)?,
    };

    let aligned: u64 = reads.iter().sum();
    stats.record(Stage::AlignedReads, aligned);
    for bucket in MultiplicityBucket::ALL {
        stats.record(Stage::Multiplicity(bucket), reads[bucket.index()]);
    }
    let parts: Vec<Stage> = MultiplicityBucket::ALL.iter().map(|b| Stage::Multiplicity(*b)).collect();
    stats.check_partition(Stage::AlignedReads, &parts)?;

    log::info!(
        "{}: {} records, {} reads ({} unmapped, {} unique, {} double, {} triple+)",
        input.display(),
        records,
        aligned,
        reads[0],
        reads[1],
        reads[2],
        reads[3]
    );
    Ok(StagedBuckets { files: MultiplicityBucket::ALL.into_iter().zip(staged).collect(), reads, records })
}

fn split_records(input: &Path, format: AlignmentFormat, staged: &[StagedFile]) -> Result<([u64; 4], usize)> {
    let mut reader = bam::Reader::from_path(input)?;
    let header = bam::Header::from_template(reader.header());
    let mut writers = staged
        .iter()
        .map(|f| bam::Writer::from_path(f.path(), &header, format.htslib()))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut reads = [0u64; 4];
    let records = classify_stream(reader.records().map(|r| r.map_err(Error::from)), |group| {
        let idx = group.bucket.index();
        for rec in &group.records {
            writers[idx].write(rec)?;
        }
        reads[idx] += 1;
        Ok(())
    })?;
    // Writers close their files on drop.
    drop(writers);
    Ok((reads, records))
}

fn split_lines(input: &Path, staged: &[StagedFile]) -> Result<([u64; 4], usize)> {
    let label = input.display().to_string();
    let lines = BufReader::new(File::open(input)?);
    let mut writers = staged
        .iter()
        .map(|f| f.reopen().map(BufWriter::new))
        .collect::<Result<Vec<_>>>()?;

    let mut reads = [0u64; 4];
    let records = classify_stream(parse_alignment_lines(lines, &label), |group| {
        let idx = group.bucket.index();
        for rec in &group.records {
            writeln!(writers[idx], "{}\t{}", rec.id, rec.flag)?;
        }
        reads[idx] += 1;
        Ok(())
    })?;
    for w in &mut writers {
        w.flush()?;
    }
    Ok((reads, records))
}

/// Everything one input produced in a full run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunFiles {
    pub cascade: CascadeFiles,
    pub alignment: PathBuf,
    pub multiplicity: MultiplicityFiles,
}

/// Cascade, align the edge and inner reads, then classify multiplicity.
///
/// The aligner reads the staged FASTQ files and writes into a staged
/// alignment; nothing is moved into place until every stage has succeeded.
pub fn run_file<T: Trimmer>(
    input: &Path,
    cascade: &MotifCascade<T>,
    aligner: &dyn Aligner,
    reference: &Path,
    layout: &OutputLayout,
    stats: &StatsAggregator,
) -> Result<RunFiles> {
    let staged = stage_cascade(input, cascade, layout, stats)?;
    let alignment_out = StagedFile::create(layout.alignment()).map_err(|e| e.in_stage("align", input))?;
    let reads = [staged.edge.path().to_path_buf(), staged.inner.path().to_path_buf()];
    log::info!("{}: aligning with {}", input.display(), aligner.name());
    let aligned = aligner
        .align(&reads, reference, alignment_out.path())
        .map_err(|e| e.in_stage("align", input))?;
    let buckets = stage_buckets(&aligned, layout, stats).map_err(|e| e.in_stage("multiplicity", input))?;

    let commit = || -> Result<RunFiles> {
        let cascade_files = staged.commit()?;
        // A precomputed alignment is used in place; the staged one stays unused.
        let alignment = if aligned.as_path() == alignment_out.path() { alignment_out.commit()? } else { aligned };
        Ok(RunFiles { cascade: cascade_files, alignment, multiplicity: buckets.commit()? })
    };
    commit().map_err(|e| e.in_stage("write", input))
}

/// Write the counters of several files into one CSV, atomically.
pub fn write_stats_csv(path: &Path, sessions: &[&StatsAggregator]) -> Result<PathBuf> {
    let staged = StagedFile::create(path)?;
    let mut reporter = CsvReporter::new(BufWriter::new(staged.reopen()?))?;
    for s in sessions {
        s.publish(&mut reporter)?;
    }
    let mut inner = reporter.into_inner()?;
    inner.flush()?;
    drop(inner);
    staged.commit()
}
