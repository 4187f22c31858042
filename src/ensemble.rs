//! Weighted sequence ensembles
//!
//! An [`Ensemble`] is the immutable training set every model is derived
//! from. Its [`Summary`] is computed once, in a single pass, when the
//! ensemble is built.

use crate::error::{PwmError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Label given to sequences loaded without a label column
pub const UNLABELED: &str = "unlabeled";

/// A single training or test sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Residues, one byte per aligned column
    pub residues: Vec<u8>,
    /// Category label
    pub label: String,
    /// Non-negative weight
    pub weight: f64,
}

impl Sequence {
    pub fn new(residues: impl Into<Vec<u8>>, label: impl Into<String>, weight: f64) -> Self {
        Self {
            residues: residues.into(),
            label: label.into(),
            weight,
        }
    }

    /// Unlabeled sequence with unit weight
    pub fn unlabeled(residues: impl Into<Vec<u8>>) -> Self {
        Self::new(residues, UNLABELED, 1.0)
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }
}

/// Occurrence counts for one symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolCount {
    /// Occurrences over every column of every sequence
    pub global: usize,
    /// Number of sequences containing the symbol at least once
    pub sequences: usize,
}

/// Statistics derived once from an ensemble
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    symbol_counts: BTreeMap<u8, SymbolCount>,
    length_counts: BTreeMap<usize, usize>,
    total_weight: f64,
    num_sequences: usize,
}

impl Summary {
    fn from_sequences(sequences: &[Sequence]) -> Self {
        let mut symbol_counts: BTreeMap<u8, SymbolCount> = BTreeMap::new();
        let mut length_counts = BTreeMap::new();
        let mut total_weight = 0.0;

        for sequence in sequences {
            total_weight += sequence.weight;

            let mut unique = BTreeSet::new();
            for &symbol in &sequence.residues {
                unique.insert(symbol);
                symbol_counts.entry(symbol).or_default().global += 1;
            }
            for symbol in unique {
                symbol_counts.entry(symbol).or_default().sequences += 1;
            }

            *length_counts.entry(sequence.len()).or_insert(0) += 1;
        }

        Self {
            symbol_counts,
            length_counts,
            total_weight,
            num_sequences: sequences.len(),
        }
    }

    /// Distinct symbols in ascending byte order
    pub fn alphabet(&self) -> impl Iterator<Item = u8> + '_ {
        self.symbol_counts.keys().copied()
    }

    /// Alphabet size `D`
    pub fn alphabet_size(&self) -> usize {
        self.symbol_counts.len()
    }

    pub fn symbol_count(&self, symbol: u8) -> SymbolCount {
        self.symbol_counts.get(&symbol).copied().unwrap_or_default()
    }

    pub fn symbol_counts(&self) -> &BTreeMap<u8, SymbolCount> {
        &self.symbol_counts
    }

    /// Histogram from sequence length to number of sequences
    pub fn length_counts(&self) -> &BTreeMap<usize, usize> {
        &self.length_counts
    }

    /// Alignment length `L`, defined only when every sequence shares one length
    pub fn alignment_length(&self) -> Option<usize> {
        if self.length_counts.len() == 1 {
            self.length_counts.keys().next().copied()
        } else {
            None
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Number of sequences `N`
    pub fn num_sequences(&self) -> usize {
        self.num_sequences
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PADDING: usize = 8;

        writeln!(f, "Ensemble contains {} sequences", self.num_sequences)?;
        match self.alignment_length() {
            Some(length) => writeln!(f, "All sequences are of length {}", length)?,
            None => {
                for (length, count) in &self.length_counts {
                    writeln!(f, "{:>5} sequences found of length {}", count, length)?;
                }
            }
        }
        writeln!(f, "Total Weight of sequences in ensemble: {}", self.total_weight)?;
        writeln!(f, "Ensemble contains {} different characters", self.alphabet_size())?;

        write!(f, "Symbol:              ")?;
        for symbol in self.alphabet() {
            write!(f, "{:>width$}", symbol as char, width = PADDING)?;
        }
        write!(f, "\nFrequency (Global):  ")?;
        for count in self.symbol_counts.values() {
            write!(f, "{:>width$}", count.global, width = PADDING)?;
        }
        write!(f, "\nFrequency (Per-site):")?;
        for count in self.symbol_counts.values() {
            write!(f, "{:>width$}", count.sequences, width = PADDING)?;
        }
        writeln!(f)
    }
}

/// Immutable weighted collection of sequences
#[derive(Debug, Clone)]
pub struct Ensemble {
    sequences: Vec<Sequence>,
    summary: Summary,
}

impl Ensemble {
    /// Build an ensemble and its summary
    ///
    /// # Errors
    /// * `EmptyEnsemble` - no sequences were given
    /// * `InvalidWeight` - a weight is negative or NaN
    pub fn new(sequences: Vec<Sequence>) -> Result<Self> {
        if sequences.is_empty() {
            return Err(PwmError::EmptyEnsemble);
        }
        for (index, sequence) in sequences.iter().enumerate() {
            if sequence.weight.is_nan() || sequence.weight < 0.0 {
                return Err(PwmError::InvalidWeight {
                    index,
                    weight: sequence.weight,
                });
            }
        }

        let summary = Summary::from_sequences(&sequences);
        Ok(Self { sequences, summary })
    }

    /// Check that every sequence has the same length and return it
    pub fn verify_aligned(&self) -> Result<usize> {
        self.summary
            .alignment_length()
            .ok_or_else(|| PwmError::UnalignedEnsemble {
                lengths: self.summary.length_counts.keys().copied().collect(),
            })
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn alignment_length(&self) -> Option<usize> {
        self.summary.alignment_length()
    }

    pub fn alphabet_size(&self) -> usize {
        self.summary.alphabet_size()
    }

    pub fn total_weight(&self) -> f64 {
        self.summary.total_weight()
    }
}

/// Keep only sequences carrying `label`
pub fn filter_by_label(sequences: &mut Vec<Sequence>, label: &str) {
    sequences.retain(|sequence| sequence.label == label);
}

/// Draw `floor(fraction / 100 * N) + 1` sequences (at most `N`) without
/// replacement, seeded by `replicate`. Input order is preserved.
pub fn sample(sequences: &[Sequence], fraction: u32, replicate: u64) -> Result<Vec<Sequence>> {
    if !(1..=100).contains(&fraction) {
        return Err(PwmError::config(format!(
            "Fraction must be an integer between 1 and 100, got {}",
            fraction
        )));
    }
    if fraction == 100 {
        return Ok(sequences.to_vec());
    }

    let amount = ((fraction as f64 / 100.0 * sequences.len() as f64) as usize + 1).min(sequences.len());
    let mut rng = StdRng::seed_from_u64(replicate);
    let mut picked = rand::seq::index::sample(&mut rng, sequences.len(), amount).into_vec();
    picked.sort_unstable();

    Ok(picked.into_iter().map(|i| sequences[i].clone()).collect())
}

/// Drop every column that is lowercase in `true_reference`
///
/// Columns past the end of the reference are kept.
pub fn remove_insertion_columns(sequences: &mut [Sequence], true_reference: &[u8]) {
    for sequence in sequences.iter_mut() {
        sequence.residues = sequence
            .residues
            .iter()
            .enumerate()
            .filter(|(i, _)| !true_reference.get(*i).is_some_and(u8::is_ascii_lowercase))
            .map(|(_, &symbol)| symbol)
            .collect();
    }
}
