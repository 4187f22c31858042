//! Incremental scoring of point mutants relative to a reference
//!
//! The full log-odds score is a sum of independent per-combination terms, and
//! a mutant with a handful of edits only changes the terms whose positions
//! include an edited column. [`WildTypeModel`] scores the reference once and
//! then, per mutant, swaps out just those terms.

use crate::combination::{self, MAX_ORDER};
use crate::ensemble::Ensemble;
use crate::error::{PwmError, Result};
use crate::mutant::Mutant;
use crate::pwm::{Order, Pwm, PwmBuilder};
use crate::score::{LogOdds, ScoreParams};
use tracing::{debug, info};

/// Highest order supported by incremental scoring
pub const MAX_WILD_TYPE_ORDER: usize = 3;

/// Reference score plus the cached reference-only frequency table
#[derive(Debug)]
pub struct WildTypeModel<'a> {
    ensemble: &'a Ensemble,
    reference: Vec<u8>,
    order: Order,
    cache: Pwm,
    log_odds: LogOdds,
    wt_score: f64,
}

impl<'a> WildTypeModel<'a> {
    /// Build the model serially; see [`WildTypeModel::with_builder`]
    pub fn build(ensemble: &'a Ensemble, reference: &[u8], order: Order, params: &ScoreParams) -> Result<Self> {
        Self::with_builder(ensemble, reference, &PwmBuilder::new(order), params)
    }

    /// Build the model with a configured builder
    ///
    /// # Errors
    /// * `UnsupportedOrder` - order 4 was requested
    /// * `LengthMismatch` - `reference` is not of the alignment length
    /// * any error of [`PwmBuilder::build_restricted`]
    pub fn with_builder(
        ensemble: &'a Ensemble,
        reference: &[u8],
        builder: &PwmBuilder,
        params: &ScoreParams,
    ) -> Result<Self> {
        let order = builder.order();
        if order.get() > MAX_WILD_TYPE_ORDER {
            return Err(PwmError::UnsupportedOrder {
                order: order.get(),
                context: "wild-type-relative scoring",
            });
        }

        let cache = builder.build_restricted(ensemble, reference)?;
        let log_odds = LogOdds::new(ensemble.summary(), cache.alignment_length(), params);
        let wt_score = cache.scorer(params).score(reference)?;
        info!(order = order.get(), wt_score, cached = cache.len(), "Wild-type model built");

        Ok(Self {
            ensemble,
            reference: reference.to_vec(),
            order,
            cache,
            log_odds,
            wt_score,
        })
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Full score of the reference sequence
    pub fn wt_score(&self) -> f64 {
        self.wt_score
    }

    pub fn reference(&self) -> &[u8] {
        &self.reference
    }

    /// Score a mutant by adjusting the reference score
    ///
    /// Edits are applied in ascending position order. Each edit replaces the
    /// terms that contain its position and none of the positions edited
    /// before it, so a term spanning several edits is replaced exactly once,
    /// by the edit at its lowest edited position, with every edited symbol in
    /// place.
    ///
    /// # Errors
    /// * `InvalidMutant` - the mutant carries issues or repeats a position
    /// * `LengthMismatch` - an edit lies outside the alignment
    pub fn evaluate(&self, mutant: &Mutant) -> Result<f64> {
        if !mutant.is_valid() {
            return Err(PwmError::InvalidMutant(mutant.descriptor().to_string()));
        }

        let length = self.reference.len();
        let mut edits: Vec<(usize, u8)> = mutant.substitutions().collect();
        edits.sort_unstable_by_key(|&(position, _)| position);
        if edits.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(PwmError::InvalidMutant(mutant.descriptor().to_string()));
        }

        let mut mutated = self.reference.clone();
        for &(position, replacement) in &edits {
            let slot = mutated.get_mut(position).ok_or(PwmError::LengthMismatch {
                expected: length,
                found: position + 1,
            })?;
            *slot = replacement;
        }

        let k = self.order.get();
        let mut score = self.wt_score;
        for (i, &(position, _)) in edits.iter().enumerate() {
            let applied: Vec<usize> = edits[..i].iter().map(|&(p, _)| p).collect();
            let combos = self.touched(position, &applied);

            let mut symbols = [0u8; MAX_ORDER];
            for combo in &combos {
                let positions = &combo[..k];
                fill(&mut symbols, positions, &self.reference);
                let frequency = self.cache.frequency_of(positions, &self.reference);
                score -= self.log_odds.term(&symbols[..k], frequency);
            }

            let frequencies = self.mutated_frequencies(position, &combos, &mutated);
            for (combo, frequency) in combos.iter().zip(frequencies) {
                let positions = &combo[..k];
                fill(&mut symbols, positions, &mutated);
                score += self.log_odds.term(&symbols[..k], frequency);
            }
        }

        debug!(mutant = mutant.descriptor(), score, "Evaluated mutant");
        Ok(score)
    }

    /// Combinations containing `position` and none of `applied`, ascending
    fn touched(&self, position: usize, applied: &[usize]) -> Vec<[usize; MAX_ORDER]> {
        let k = self.order.get();
        let others: Vec<usize> = (0..self.reference.len())
            .filter(|p| *p != position && !applied.contains(p))
            .collect();

        let mut combos = Vec::with_capacity(combination::count(others.len(), k - 1));
        if k == 1 {
            combos.push([position; MAX_ORDER]);
            return combos;
        }
        combination::for_each(&others, k - 1, |rest| {
            let mut combo = [0usize; MAX_ORDER];
            let split = rest.partition_point(|&p| p < position);
            combo[..split].copy_from_slice(&rest[..split]);
            combo[split] = position;
            combo[split + 1..k].copy_from_slice(&rest[split..]);
            combos.push(combo);
        });
        combos
    }

    /// Normalized frequency of each combination with the mutated symbols in place
    fn mutated_frequencies(&self, position: usize, combos: &[[usize; MAX_ORDER]], mutated: &[u8]) -> Vec<f64> {
        let k = self.order.get();
        let mut frequencies = vec![0.0; combos.len()];
        for sequence in self.ensemble.sequences() {
            if sequence.residues[position] != mutated[position] {
                continue;
            }
            for (frequency, combo) in frequencies.iter_mut().zip(combos) {
                if combo[..k].iter().all(|&p| sequence.residues[p] == mutated[p]) {
                    *frequency += sequence.weight;
                }
            }
        }

        let total_weight = self.ensemble.total_weight();
        for frequency in &mut frequencies {
            *frequency /= total_weight;
        }
        frequencies
    }
}

fn fill(symbols: &mut [u8; MAX_ORDER], positions: &[usize], residues: &[u8]) {
    for (slot, &p) in symbols.iter_mut().zip(positions) {
        *slot = residues[p];
    }
}
