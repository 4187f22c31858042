//! Mutation descriptors and their mapping onto the aligned reference
//!
//! A descriptor is either `WT` (case-insensitive) or a comma-separated list
//! of `<original><position><replacement>` edits in true residue numbering,
//! e.g. `A24G,C30T`. The true reference keeps lowercase symbols for columns
//! that were dropped from the alignment.

use crate::error::{PwmError, Result};
use std::fmt;

/// Map from true reference indices to aligned indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionMap {
    aligned: Vec<Option<usize>>,
    aligned_len: usize,
}

impl PositionMap {
    /// Every uppercase column of `true_reference` gets the next aligned
    /// index; lowercase columns are masked.
    pub fn from_reference(true_reference: &[u8]) -> Self {
        let mut next = 0;
        let aligned = true_reference
            .iter()
            .map(|symbol| {
                if symbol.is_ascii_lowercase() {
                    None
                } else {
                    next += 1;
                    Some(next - 1)
                }
            })
            .collect();
        Self {
            aligned,
            aligned_len: next,
        }
    }

    /// Length of the true reference
    pub fn true_len(&self) -> usize {
        self.aligned.len()
    }

    /// Number of unmasked columns
    pub fn aligned_len(&self) -> usize {
        self.aligned_len
    }

    pub fn get(&self, true_index: usize) -> Option<usize> {
        self.aligned.get(true_index).copied().flatten()
    }

    pub fn is_masked(&self, true_index: usize) -> bool {
        matches!(self.aligned.get(true_index), Some(None))
    }

    /// `(true_index, aligned_index)` for every unmasked column, ascending
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.aligned
            .iter()
            .enumerate()
            .filter_map(|(true_index, aligned)| aligned.map(|a| (true_index, a)))
    }
}

/// One parsed point substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub original: u8,
    /// Position as written in the descriptor
    pub position: i64,
    pub replacement: u8,
    /// Aligned index, when the edit maps onto an unmasked column
    pub aligned: Option<usize>,
}

/// Reason a well-formed edit cannot be scored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationIssue {
    OutOfRange { edit: String, index: i64, length: usize },
    Mismatch { edit: String, expected: u8, found: u8 },
    Masked { edit: String },
    Duplicate { edit: String, aligned: usize },
}

impl fmt::Display for MutationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationIssue::OutOfRange { edit, index, length } => write!(
                f,
                "Mutation {} is outside of reference: index {} not in [0, {})",
                edit, index, length
            ),
            MutationIssue::Mismatch {
                edit,
                expected,
                found,
            } => write!(
                f,
                "Mutation {} does not match reference: expected {} but reference has {}",
                edit, *expected as char, *found as char
            ),
            MutationIssue::Masked { edit } => {
                write!(f, "Mutation {} falls on a column removed from the alignment", edit)
            }
            MutationIssue::Duplicate { edit, aligned } => {
                write!(f, "Mutation {} repeats aligned position {}", edit, aligned)
            }
        }
    }
}

/// A parsed descriptor with its validation outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutant {
    descriptor: String,
    edits: Vec<Edit>,
    issues: Vec<MutationIssue>,
}

impl Mutant {
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn issues(&self) -> &[MutationIssue] {
        &self.issues
    }

    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn is_wild_type(&self) -> bool {
        self.edits.is_empty()
    }

    /// `(aligned_index, replacement)` for each mappable edit, in descriptor order
    pub fn substitutions(&self) -> impl Iterator<Item = (usize, u8)> + '_ {
        self.edits
            .iter()
            .filter_map(|edit| edit.aligned.map(|a| (a, edit.replacement)))
    }

    /// The aligned reference with every substitution applied
    ///
    /// # Errors
    /// * `InvalidMutant` - the mutant carries issues
    /// * `LengthMismatch` - a substitution falls outside `aligned_reference`
    pub fn apply(&self, aligned_reference: &[u8]) -> Result<Vec<u8>> {
        if !self.is_valid() {
            return Err(PwmError::InvalidMutant(self.descriptor.clone()));
        }
        let mut residues = aligned_reference.to_vec();
        for (aligned, replacement) in self.substitutions() {
            let slot = residues.get_mut(aligned).ok_or(PwmError::LengthMismatch {
                expected: aligned + 1,
                found: aligned_reference.len(),
            })?;
            *slot = replacement;
        }
        Ok(residues)
    }
}

/// Parses descriptors against one true reference
#[derive(Debug, Clone)]
pub struct MutantParser<'a> {
    true_reference: &'a [u8],
    positions: PositionMap,
    true_offset: i64,
}

impl<'a> MutantParser<'a> {
    /// `true_offset` is the residue number of the first reference column
    pub fn new(true_reference: &'a [u8], true_offset: i64) -> Self {
        Self {
            positions: PositionMap::from_reference(true_reference),
            true_reference,
            true_offset,
        }
    }

    pub fn position_map(&self) -> &PositionMap {
        &self.positions
    }

    /// Reference restricted to unmasked columns
    pub fn aligned_reference(&self) -> Vec<u8> {
        self.positions
            .entries()
            .map(|(true_index, _)| self.true_reference[true_index])
            .collect()
    }

    /// Parse a descriptor
    ///
    /// Semantic problems (out of range, wrong reference symbol, masked or
    /// repeated column) are recorded on the returned [`Mutant`].
    ///
    /// # Errors
    /// * `MalformedMutation` - an edit does not match `<symbol><digits><symbol>`
    pub fn parse(&self, descriptor: &str) -> Result<Mutant> {
        let descriptor = descriptor.trim();
        let mut mutant = Mutant {
            descriptor: descriptor.to_string(),
            edits: Vec::new(),
            issues: Vec::new(),
        };
        if descriptor.eq_ignore_ascii_case("wt") {
            return Ok(mutant);
        }

        for text in descriptor.split(',') {
            let text = text.trim();
            let (original, position, replacement) = parse_edit(text)?;
            let mut edit = Edit {
                original,
                position,
                replacement,
                aligned: None,
            };

            let index = position - self.true_offset;
            if index < 0 || index as usize >= self.true_reference.len() {
                mutant.issues.push(MutationIssue::OutOfRange {
                    edit: text.to_string(),
                    index,
                    length: self.true_reference.len(),
                });
                mutant.edits.push(edit);
                continue;
            }
            let index = index as usize;

            let found = self.true_reference[index];
            if found != original {
                mutant.issues.push(MutationIssue::Mismatch {
                    edit: text.to_string(),
                    expected: original,
                    found,
                });
            }

            match self.positions.get(index) {
                None => mutant.issues.push(MutationIssue::Masked {
                    edit: text.to_string(),
                }),
                Some(aligned) => {
                    if mutant.edits.iter().any(|e| e.aligned == Some(aligned)) {
                        mutant.issues.push(MutationIssue::Duplicate {
                            edit: text.to_string(),
                            aligned,
                        });
                    } else {
                        edit.aligned = Some(aligned);
                    }
                }
            }
            mutant.edits.push(edit);
        }

        Ok(mutant)
    }
}

/// Split `<symbol><digits><symbol>` where symbols are word characters
fn parse_edit(text: &str) -> Result<(u8, i64, u8)> {
    let malformed = || PwmError::MalformedMutation(text.to_string());
    let bytes = text.as_bytes();
    if bytes.len() < 3 {
        return Err(malformed());
    }

    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let original = bytes[0];
    let replacement = bytes[bytes.len() - 1];
    let digits = &bytes[1..bytes.len() - 1];
    if !is_word(original) || !is_word(replacement) || !digits.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }

    let position = std::str::from_utf8(digits)
        .ok()
        .and_then(|d| d.parse::<i64>().ok())
        .ok_or_else(malformed)?;
    Ok((original, position, replacement))
}
