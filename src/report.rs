//! **Reporter** sinks for stage statistics.
//!
//! The core only pushes `(label, stage, count, percentage)` rows and raw CSV
//! rows; formatting belongs to the sink.
use std::io::Write;

use crate::error::Result;
use crate::stats::Percentage;

pub trait Reporter {
    fn publish(&mut self, label: &str, stage: &str, count: u64, percentage: &Percentage) -> Result<()>;
    fn publish_row(&mut self, fields: &[String]) -> Result<()>;
}

/// CSV sink: header `file,stage,count,percentage`.
pub struct CsvReporter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvReporter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).flexible(true).from_writer(inner);
        writer.write_record(["file", "stage", "count", "percentage"])?;
        Ok(CsvReporter { writer })
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| crate::error::Error::Io(e.into_error()))
    }
}

impl<W: Write> Reporter for CsvReporter<W> {
    fn publish(&mut self, label: &str, stage: &str, count: u64, percentage: &Percentage) -> Result<()> {
        let count = count.to_string();
        let percentage = format!("{percentage:.4}");
        self.writer.write_record([label, stage, count.as_str(), percentage.as_str()])?;
        Ok(())
    }

    fn publish_row(&mut self, fields: &[String]) -> Result<()> {
        self.writer.write_record(fields)?;
        Ok(())
    }
}

/// Sink writing every row to the `log` facade at info level.
#[derive(Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn publish(&mut self, label: &str, stage: &str, count: u64, percentage: &Percentage) -> Result<()> {
        log::info!("{label}\t{stage}\t{count}\t{percentage}%");
        Ok(())
    }

    fn publish_row(&mut self, fields: &[String]) -> Result<()> {
        log::info!("{}", fields.join("\t"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{Stage, StatsAggregator};

    #[test]
    fn csv_rows_carry_four_decimals() {
        let stats = StatsAggregator::new("s.fq");
        stats.record(Stage::Processed, 3);
        stats.record(Stage::Inner, 1);
        let mut rep = CsvReporter::new(Vec::new()).unwrap();
        stats.publish(&mut rep).unwrap();
        rep.publish_row(&["s.fq".to_string(), "note".to_string()]).unwrap();
        let text = String::from_utf8(rep.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "file,stage,count,percentage");
        assert_eq!(lines[1], "s.fq,processed,3,100.0000");
        assert_eq!(lines[2], "s.fq,inner,1,33.3333");
        assert_eq!(lines[3], "s.fq,note");
    }

    #[test]
    fn undefined_percentages_are_spelled_out() {
        let stats = StatsAggregator::new("e.fq");
        stats.record(Stage::Processed, 0);
        let mut rep = CsvReporter::new(Vec::new()).unwrap();
        stats.publish(&mut rep).unwrap();
        let text = String::from_utf8(rep.into_inner().unwrap()).unwrap();
        assert!(text.contains("e.fq,processed,0,undefined"));
        assert!(text.ends_with("e.fq,warning.empty_input\n"), "{text}");
    }
}
