//! Sequence reweighting
//!
//! Redundant sequences in an alignment over-represent their family. With
//! similarity weighting each sequence counts `1 / n` where `n` is the number
//! of sequences (itself included) at least `p` percent identical to it.

use crate::ensemble::Sequence;
use crate::error::{PwmError, Result};
use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How ensemble weights are assigned before PWM construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WeightMode {
    /// Keep weights as loaded
    #[default]
    None,
    /// Every sequence weighs 1
    Uniform,
    /// Down-weight clusters of similar sequences
    Similarity,
}

impl fmt::Display for WeightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightMode::None => write!(f, "none"),
            WeightMode::Uniform => write!(f, "uniform"),
            WeightMode::Similarity => write!(f, "similarity"),
        }
    }
}

/// Reassign weights in place according to `mode`
///
/// `similarity` is the identity threshold in percent and is only read in
/// [`WeightMode::Similarity`].
pub fn apply(sequences: &mut [Sequence], mode: WeightMode, similarity: u32, parallel: bool) -> Result<()> {
    match mode {
        WeightMode::None => Ok(()),
        WeightMode::Uniform => {
            uniform(sequences);
            Ok(())
        }
        WeightMode::Similarity => by_similarity(sequences, similarity, parallel),
    }
}

pub fn uniform(sequences: &mut [Sequence]) {
    for sequence in sequences {
        sequence.weight = 1.0;
    }
}

/// Weight each sequence by the inverse size of its similarity neighbourhood
///
/// # Errors
/// * `Config` - threshold outside 1..=100
pub fn by_similarity(sequences: &mut [Sequence], threshold: u32, parallel: bool) -> Result<()> {
    if !(1..=100).contains(&threshold) {
        return Err(PwmError::config(format!(
            "Similarity threshold must be between 1 and 100, got {}",
            threshold
        )));
    }

    let snapshot: &[Sequence] = sequences;
    let neighbours = |sequence: &Sequence| {
        snapshot
            .iter()
            .filter(|other| is_similar(&sequence.residues, &other.residues, threshold))
            .count()
    };
    let counts: Vec<usize> = if parallel {
        snapshot.par_iter().map(neighbours).collect()
    } else {
        snapshot.iter().map(neighbours).collect()
    };

    for (sequence, count) in sequences.iter_mut().zip(counts) {
        sequence.weight = 1.0 / count as f64;
    }
    debug!(
        threshold,
        effective = sequences.iter().map(|s| s.weight).sum::<f64>(),
        "Applied similarity weights"
    );
    Ok(())
}

/// Fraction of identical columns, over the longer of the two lengths
pub fn identity(a: &[u8], b: &[u8]) -> f64 {
    let length = a.len().max(b.len());
    if length == 0 {
        return 1.0;
    }
    identical_columns(a, b) as f64 / length as f64
}

fn identical_columns(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).filter(|(x, y)| x == y).count()
}

fn is_similar(a: &[u8], b: &[u8], threshold: u32) -> bool {
    let length = a.len().max(b.len());
    identical_columns(a, b) * 100 >= threshold as usize * length
}
