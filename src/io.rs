//! Input readers: delimited tables, A2M alignments and mutation lists

use crate::ensemble::{Sequence, UNLABELED};
use crate::error::{PwmError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Header value of the descriptor column in mutation files
pub const MUTANT_HEADER: &str = "mutant";

/// Column names to pull from a delimited table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumns {
    pub sequence: String,
    pub label: Option<String>,
    pub weight: Option<String>,
}

impl TableColumns {
    pub fn new(sequence: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            label: None,
            weight: None,
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    pub fn with_weight(mut self, weight: Option<String>) -> Self {
        self.weight = weight;
        self
    }
}

/// Read sequences from a delimited file with a header row
pub fn read_table(path: &Path, columns: &TableColumns, delimiter: u8) -> Result<Vec<Sequence>> {
    let file = File::open(path)?;
    read_table_from(file, &path.display().to_string(), columns, delimiter)
}

/// Read sequences from delimited text; `source` names it in errors
///
/// # Errors
/// * `UnknownColumn` - a requested column is missing from the header
/// * `Parse` - a weight is not a number
/// * `Csv` - malformed rows
pub fn read_table_from<R: Read>(
    reader: R,
    source: &str,
    columns: &TableColumns,
    delimiter: u8,
) -> Result<Vec<Sequence>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PwmError::unknown_column(name, source))
    };
    let sequence_idx = find(columns.sequence.as_str())?;
    let label_idx = columns.label.as_deref().map(find).transpose()?;
    let weight_idx = columns.weight.as_deref().map(find).transpose()?;

    let mut sequences = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or_default();

        let weight = match weight_idx {
            Some(idx) => field(idx).parse::<f64>().map_err(|_| {
                PwmError::parse(format!(
                    "weight '{}' on line {} of {}",
                    field(idx),
                    record.position().map_or(0, |p| p.line()),
                    source
                ))
            })?,
            None => 1.0,
        };
        let label = label_idx.map_or(UNLABELED, field);
        sequences.push(Sequence::new(field(sequence_idx).as_bytes(), label, weight));
    }

    debug!(source, sequences = sequences.len(), "Read delimited table");
    Ok(sequences)
}

/// Records of an A2M alignment; the first one is the reference
#[derive(Debug, Clone)]
pub struct A2mAlignment {
    pub sequences: Vec<Sequence>,
    /// Residue number of the first reference column
    pub true_offset: i64,
}

impl A2mAlignment {
    /// True reference, lowercase marking insertion columns
    pub fn reference(&self) -> &Sequence {
        &self.sequences[0]
    }
}

pub fn read_a2m(path: &Path) -> Result<A2mAlignment> {
    let file = File::open(path)?;
    read_a2m_from(BufReader::new(file))
}

/// Parse A2M text
///
/// Sequence lines of a record are concatenated; every record gets weight 1
/// and its header (without `>`) as label. Records with no residues are
/// skipped.
///
/// # Errors
/// * `InvalidA2m` - no records, or the first header carries no `/<start>-<end>`
pub fn read_a2m_from<R: BufRead>(reader: R) -> Result<A2mAlignment> {
    let mut records: Vec<(String, Vec<u8>)> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end();
        if let Some(header) = line.strip_prefix('>') {
            records.push((header.to_string(), Vec::new()));
        } else if let Some((_, residues)) = records.last_mut() {
            residues.extend_from_slice(line.trim().as_bytes());
        } else if !line.trim().is_empty() {
            return Err(PwmError::invalid_a2m("sequence data before the first header"));
        }
    }

    let (first_header, _) = records
        .first()
        .ok_or_else(|| PwmError::invalid_a2m("no records found"))?;
    let true_offset = parse_true_offset(first_header)?;
    if records[0].1.is_empty() {
        return Err(PwmError::invalid_a2m("reference record has no residues"));
    }

    let mut sequences = Vec::with_capacity(records.len());
    for (header, residues) in records {
        if residues.is_empty() {
            warn!(record = %header, "Skipping empty A2M record");
            continue;
        }
        sequences.push(Sequence::new(residues, header, 1.0));
    }

    debug!(records = sequences.len(), true_offset, "Read A2M alignment");
    Ok(A2mAlignment {
        sequences,
        true_offset,
    })
}

/// Start coordinate of a `name/<start>-<end>` header
pub fn parse_true_offset(header: &str) -> Result<i64> {
    let header = header.trim();
    let invalid = || PwmError::invalid_a2m(format!("header '{}' does not end in /<start>-<end>", header));

    let (_, range) = header.rsplit_once('/').ok_or_else(invalid)?;
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !numeric(start) || !numeric(end) {
        return Err(invalid());
    }
    start.parse().map_err(|_| invalid())
}

pub fn read_descriptors(path: &Path) -> Result<Vec<String>> {
    read_descriptors_from(File::open(path)?)
}

/// Descriptors from a mutation file
///
/// The descriptor is the first `;`-separated field. `#` comments, blank
/// lines and a `mutant` header are skipped.
pub fn read_descriptors_from<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut descriptors = Vec::new();
    for record in reader.records() {
        let record = record?;
        let descriptor = record.get(0).unwrap_or_default();
        if descriptor.is_empty() || descriptor == MUTANT_HEADER {
            continue;
        }
        descriptors.push(descriptor.to_string());
    }
    Ok(descriptors)
}
