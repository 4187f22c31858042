//! Score table and failure log writers
//!
//! A score table has one row per scored item: its label followed by one
//! field per order, highest order first. Items that could not be scored
//! keep their row with empty score fields so rows line up with the input.

use crate::error::Result;
use crate::mutant::MutationIssue;
use crate::pwm::Order;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Extension of the score table
pub const SCORES_EXTENSION: &str = "scores";
/// Extension of the failure log
pub const FAILS_EXTENSION: &str = "fails";

/// Delimited table of per-order scores
pub struct ScoreTable<W: Write> {
    writer: W,
    separator: char,
    order: Order,
    rows: u64,
}

impl ScoreTable<BufWriter<File>> {
    /// Create `path` and write the header
    pub fn create(path: &Path, label_column: &str, separator: char, order: Order) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), label_column, separator, order)
    }
}

impl<W: Write> ScoreTable<W> {
    pub fn new(mut writer: W, label_column: &str, separator: char, order: Order) -> Result<Self> {
        write!(writer, "{}", label_column)?;
        for k in (1..=order.get()).rev() {
            write!(writer, "{}score_{}", separator, k)?;
        }
        writeln!(writer)?;

        Ok(Self {
            writer,
            separator,
            order,
            rows: 0,
        })
    }

    /// Write one row; `scores[i]` is the score at order `i + 1`
    ///
    /// Missing scores, whether `None` or beyond the end of `scores`, are
    /// written as empty fields.
    pub fn write_row(&mut self, label: &str, scores: &[Option<f64>]) -> Result<()> {
        write!(self.writer, "{}", label)?;
        for k in (1..=self.order.get()).rev() {
            write!(self.writer, "{}", self.separator)?;
            if let Some(score) = scores.get(k - 1).copied().flatten() {
                write!(self.writer, "{}", score)?;
            }
        }
        writeln!(self.writer)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and return the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// One line per edit that made a mutant unscorable
pub struct FailureLog<W: Write> {
    writer: W,
    entries: u64,
}

impl FailureLog<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> FailureLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, entries: 0 }
    }

    pub fn report(&mut self, issue: &MutationIssue) -> Result<()> {
        writeln!(self.writer, "{}", issue)?;
        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_table_layout() {
        let mut table = ScoreTable::new(Vec::new(), "label", ';', Order::THREE).unwrap();
        table.write_row("A1G", &[Some(1.5), Some(-2.0), Some(0.25)]).unwrap();
        table.write_row("C3X", &[None, None, None]).unwrap();
        table.write_row("WT", &[Some(1.0)]).unwrap();
        assert_eq!(table.rows(), 3);

        let text = String::from_utf8(table.finish().unwrap()).unwrap();
        assert_eq!(
            text,
            "label;score_3;score_2;score_1\nA1G;0.25;-2;1.5\nC3X;;;\nWT;;;1\n"
        );
    }

    #[test]
    fn test_comma_separated_table() {
        let mut table = ScoreTable::new(Vec::new(), "family", ',', Order::ONE).unwrap();
        table.write_row("x", &[Some(0.5)]).unwrap();
        let text = String::from_utf8(table.finish().unwrap()).unwrap();
        assert_eq!(text, "family,score_1\nx,0.5\n");
    }

    #[test]
    fn test_failure_log() {
        let mut log = FailureLog::new(Vec::new());
        log.report(&MutationIssue::Masked {
            edit: "B2X".to_string(),
        })
        .unwrap();
        assert_eq!(log.entries(), 1);
        let text = String::from_utf8(log.finish().unwrap()).unwrap();
        assert_eq!(text, "Mutation B2X falls on a column removed from the alignment\n");
    }
}
