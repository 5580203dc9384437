//! Alignment-multiplicity classification.
//!
//! Input records are grouped by read: a primary (non-secondary) record opens a
//! group and the secondary records that follow join it. When the next group
//! opens, or the stream ends, the finished group is flushed to exactly one
//! [`MultiplicityBucket`]:
//!
//! | group size | bucket |
//! |---|---|
//! | 1, unmapped flag set | `Unmapped` |
//! | 1 | `Unique` |
//! | 2 | `Double` |
//! | 3+ | `TripleOrMore` |
//!
//! The classifier never touches counters; callers count what comes out.
use core::fmt;

use crate::alignment::AlignmentFlags;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum MultiplicityBucket {
    Unmapped,
    Unique,
    Double,
    TripleOrMore,
}

impl MultiplicityBucket {
    pub const ALL: [MultiplicityBucket; 4] = [
        MultiplicityBucket::Unmapped,
        MultiplicityBucket::Unique,
        MultiplicityBucket::Double,
        MultiplicityBucket::TripleOrMore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MultiplicityBucket::Unmapped => "unmapped",
            MultiplicityBucket::Unique => "unique",
            MultiplicityBucket::Double => "double",
            MultiplicityBucket::TripleOrMore => "triple",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            MultiplicityBucket::Unmapped => 0,
            MultiplicityBucket::Unique => 1,
            MultiplicityBucket::Double => 2,
            MultiplicityBucket::TripleOrMore => 3,
        }
    }

    fn for_group(size: usize, primary_unmapped: bool) -> Self {
        match size {
            0 | 1 if primary_unmapped => MultiplicityBucket::Unmapped,
            0 | 1 => MultiplicityBucket::Unique,
            2 => MultiplicityBucket::Double,
            _ => MultiplicityBucket::TripleOrMore,
        }
    }
}

impl fmt::Display for MultiplicityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// All records of one read, with the bucket they were assigned to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group<R> {
    pub bucket: MultiplicityBucket,
    pub records: Vec<R>,
}

#[derive(Debug)]
enum State<R> {
    Idle,
    Accumulating { buffer: Vec<R>, primary_unmapped: bool },
}

/// Streaming grouper: feed records with [`push`](Self::push), then call
/// [`finish`](Self::finish) once the input is exhausted.
#[derive(Debug)]
pub struct MultiplicityClassifier<R> {
    state: State<R>,
}

impl<R> Default for MultiplicityClassifier<R> {
    fn default() -> Self { MultiplicityClassifier { state: State::Idle } }
}

impl<R: AlignmentFlags> MultiplicityClassifier<R> {
    pub fn new() -> Self { Self::default() }

    /// Consume one record; returns the previous group if this record closed it.
    ///
    /// A secondary record with no open group opens one itself.
    pub fn push(&mut self, record: R) -> Option<Group<R>> {
        match &mut self.state {
            State::Accumulating { buffer, .. } if record.is_secondary() => {
                buffer.push(record);
                None
            }
            _ => {
                let primary_unmapped = record.is_unmapped();
                let previous = std::mem::replace(
                    &mut self.state,
                    State::Accumulating { buffer: vec![record], primary_unmapped },
                );
                Self::flush(previous)
            }
        }
    }

    /// Flush the open group, leaving the classifier idle.
    pub fn finish(&mut self) -> Option<Group<R>> {
        Self::flush(std::mem::replace(&mut self.state, State::Idle))
    }

    fn flush(state: State<R>) -> Option<Group<R>> {
        match state {
            State::Idle => None,
            State::Accumulating { buffer, primary_unmapped } => Some(Group {
                bucket: MultiplicityBucket::for_group(buffer.len(), primary_unmapped),
                records: buffer,
            }),
        }
    }
}

/// The four buckets, records kept in input order within each bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiplicityPartition<R> {
    buckets: [Vec<R>; 4],
}

impl<R> Default for MultiplicityPartition<R> {
    fn default() -> Self { MultiplicityPartition { buckets: [Vec::new(), Vec::new(), Vec::new(), Vec::new()] } }
}

impl<R: AlignmentFlags> MultiplicityPartition<R> {
    pub fn add(&mut self, group: Group<R>) {
        self.buckets[group.bucket.index()].extend(group.records);
    }

    pub fn records(&self, bucket: MultiplicityBucket) -> &[R] { &self.buckets[bucket.index()] }

    pub fn total_records(&self) -> usize { self.buckets.iter().map(Vec::len).sum() }

    /// Distinct read names of a bucket, in first-seen order.
    pub fn read_ids(&self, bucket: MultiplicityBucket) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for r in self.records(bucket) {
            let name = String::from_utf8_lossy(r.read_name()).into_owned();
            if ids.last() != Some(&name) {
                ids.push(name);
            }
        }
        ids
    }
}

/// Classify a whole in-memory stream.
pub fn classify<R, I>(records: I) -> MultiplicityPartition<R>
where
    R: AlignmentFlags,
    I: IntoIterator<Item = R>,
{
    let mut fsm = MultiplicityClassifier::new();
    let mut out = MultiplicityPartition::default();
    for r in records {
        if let Some(g) = fsm.push(r) {
            out.add(g);
        }
    }
    if let Some(g) = fsm.finish() {
        out.add(g);
    }
    out
}

/// Classify a fallible stream, handing each flushed group to `sink`.
/// Stops at the first error from either side.
pub fn classify_stream<R, E, I, F>(records: I, mut sink: F) -> Result<usize, E>
where
    R: AlignmentFlags,
    I: IntoIterator<Item = Result<R, E>>,
    F: FnMut(Group<R>) -> Result<(), E>,
{
    let mut fsm = MultiplicityClassifier::new();
    let mut n = 0usize;
    for r in records {
        n += 1;
        if let Some(g) = fsm.push(r?) {
            sink(g)?;
        }
    }
    if let Some(g) = fsm.finish() {
        sink(g)?;
    }
    Ok(n)
}
