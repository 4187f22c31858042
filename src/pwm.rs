//! Sparse position weight matrices of order 1 to 4
//!
//! A PWM of order `k` maps every observed k-combination of
//! `(position, symbol)` pairs to its weighted frequency in the ensemble.
//! Tables are partitioned by the leading position of the combination: the
//! partitions are disjoint, so they can be filled by independent workers
//! and joined by concatenation.

use crate::combination::{self, MAX_ORDER};
use crate::ensemble::{Ensemble, Sequence, Summary};
use crate::error::{PwmError, Result};
use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Correlation order of a PWM, always within `1..=4`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Order(u8);

impl Order {
    pub const ONE: Order = Order(1);
    pub const TWO: Order = Order(2);
    pub const THREE: Order = Order(3);
    pub const FOUR: Order = Order(4);

    pub fn new(k: usize) -> Result<Self> {
        if (1..=MAX_ORDER).contains(&k) {
            Ok(Order(k as u8))
        } else {
            Err(PwmError::InvalidOrder(k))
        }
    }

    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Orders `1..=self`, ascending
    pub fn up_to(self) -> impl Iterator<Item = Order> {
        (1..=self.0).map(Order)
    }
}

impl TryFrom<usize> for Order {
    type Error = PwmError;

    fn try_from(k: usize) -> Result<Self> {
        Order::new(k)
    }
}

impl From<Order> for usize {
    fn from(order: Order) -> usize {
        order.get()
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a PWM entry: `k` strictly increasing positions and the symbols
/// observed at them. Unused slots stay zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Combo {
    positions: [u32; MAX_ORDER],
    symbols: [u8; MAX_ORDER],
    len: u8,
}

impl Combo {
    /// Build a key from explicit positions and symbols
    ///
    /// Both slices must have the same length, at most [`MAX_ORDER`].
    pub fn new(positions: &[usize], symbols: &[u8]) -> Self {
        debug_assert_eq!(positions.len(), symbols.len());
        debug_assert!(positions.len() <= MAX_ORDER);
        let mut combo = Combo {
            positions: [0; MAX_ORDER],
            symbols: [0; MAX_ORDER],
            len: positions.len() as u8,
        };
        for (i, (&p, &s)) in positions.iter().zip(symbols).enumerate() {
            combo.positions[i] = p as u32;
            combo.symbols[i] = s;
        }
        combo
    }

    /// Key for the symbols `residues` carries at `positions`
    pub fn from_residues(positions: &[usize], residues: &[u8]) -> Self {
        let mut symbols = [0u8; MAX_ORDER];
        for (slot, &p) in symbols.iter_mut().zip(positions) {
            *slot = residues[p];
        }
        Self::new(positions, &symbols[..positions.len()])
    }

    pub fn order(&self) -> usize {
        self.len as usize
    }

    pub fn leader(&self) -> usize {
        self.positions[0] as usize
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions[..self.order()].iter().map(|&p| p as usize)
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols[..self.order()]
    }
}

/// Immutable order-k weighted frequency table
#[derive(Debug, Clone)]
pub struct Pwm {
    order: Order,
    length: usize,
    tables: Vec<AHashMap<Combo, f64>>,
    summary: Summary,
}

impl Pwm {
    pub fn order(&self) -> Order {
        self.order
    }

    /// Alignment length `L` the table was built over
    pub fn alignment_length(&self) -> usize {
        self.length
    }

    /// Summary of the ensemble the table was built from
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Normalized frequency of `combo`, zero when never observed
    pub fn frequency(&self, combo: &Combo) -> f64 {
        self.tables
            .get(combo.leader())
            .and_then(|table| table.get(combo))
            .copied()
            .unwrap_or(0.0)
    }

    /// Frequency of the symbols `residues` carries at `positions`
    pub fn frequency_of(&self, positions: &[usize], residues: &[u8]) -> f64 {
        self.frequency(&Combo::from_residues(positions, residues))
    }

    /// Stored entries whose positions are exactly `positions`
    pub fn entries_at<'a>(&'a self, positions: &'a [usize]) -> impl Iterator<Item = (&'a Combo, f64)> + 'a {
        positions
            .first()
            .and_then(|&leader| self.tables.get(leader))
            .into_iter()
            .flat_map(|table| table.iter())
            .filter(move |(combo, _)| combo.positions().eq(positions.iter().copied()))
            .map(|(combo, &frequency)| (combo, frequency))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Combo, f64)> + '_ {
        self.tables
            .iter()
            .flat_map(|table| table.iter().map(|(combo, &frequency)| (combo, frequency)))
    }

    /// Number of stored (observed) entries
    pub fn len(&self) -> usize {
        self.tables.iter().map(|table| table.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds [`Pwm`] tables from an aligned ensemble
#[derive(Debug, Clone, Copy)]
pub struct PwmBuilder {
    order: Order,
    parallel: bool,
}

impl PwmBuilder {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            parallel: false,
        }
    }

    /// Fill one partition per leading position on the rayon pool
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Count every k-combination of every sequence
    ///
    /// # Errors
    /// * `UnalignedEnsemble` - sequences differ in length
    /// * `ZeroTotalWeight` - weights sum to zero
    pub fn build(&self, ensemble: &Ensemble) -> Result<Pwm> {
        let length = ensemble.verify_aligned()?;
        let all: Vec<usize> = (0..length).collect();
        let sites: Vec<&[usize]> = vec![all.as_slice(); ensemble.len()];
        self.assemble(ensemble, length, &sites)
    }

    /// Count only combinations whose symbols all equal `reference`
    ///
    /// This is the per-term cache used for wild-type-relative scoring; it is
    /// much sparser than the full table.
    pub fn build_restricted(&self, ensemble: &Ensemble, reference: &[u8]) -> Result<Pwm> {
        let length = ensemble.verify_aligned()?;
        if reference.len() != length {
            return Err(PwmError::LengthMismatch {
                expected: length,
                found: reference.len(),
            });
        }

        let matching: Vec<Vec<usize>> = ensemble
            .sequences()
            .iter()
            .map(|sequence| {
                (0..length)
                    .filter(|&p| sequence.residues[p] == reference[p])
                    .collect()
            })
            .collect();
        let sites: Vec<&[usize]> = matching.iter().map(Vec::as_slice).collect();
        self.assemble(ensemble, length, &sites)
    }

    fn assemble(&self, ensemble: &Ensemble, length: usize, sites: &[&[usize]]) -> Result<Pwm> {
        let total_weight = ensemble.total_weight();
        if total_weight <= 0.0 {
            return Err(PwmError::ZeroTotalWeight);
        }

        let k = self.order.get();
        let sequences = ensemble.sequences();
        let leader = |p: usize| leader_table(p, k, sequences, sites, total_weight);

        let tables: Vec<AHashMap<Combo, f64>> = if self.parallel {
            debug!(order = k, workers = length, "Building PWM partitions in parallel");
            (0..length).into_par_iter().map(leader).collect()
        } else {
            (0..length).map(leader).collect()
        };

        let pwm = Pwm {
            order: self.order,
            length,
            tables,
            summary: ensemble.summary().clone(),
        };
        info!(order = k, entries = pwm.len(), "PWM built");
        Ok(pwm)
    }
}

/// Weighted counts of every combination led by position `p`
///
/// `sites[i]` lists, ascending, the positions of sequence `i` that may take
/// part in a combination.
fn leader_table(
    p: usize,
    k: usize,
    sequences: &[Sequence],
    sites: &[&[usize]],
    total_weight: f64,
) -> AHashMap<Combo, f64> {
    let mut table = AHashMap::new();
    let mut positions = [p; MAX_ORDER];

    for (sequence, sites) in sequences.iter().zip(sites) {
        let Ok(at) = sites.binary_search(&p) else {
            continue;
        };
        if k == 1 {
            *table.entry(Combo::from_residues(&positions[..1], &sequence.residues)).or_insert(0.0) +=
                sequence.weight;
            continue;
        }
        combination::for_each(&sites[at + 1..], k - 1, |rest| {
            positions[1..k].copy_from_slice(rest);
            let combo = Combo::from_residues(&positions[..k], &sequence.residues);
            *table.entry(combo).or_insert(0.0) += sequence.weight;
        });
    }

    for frequency in table.values_mut() {
        *frequency /= total_weight;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> Ensemble {
        Ensemble::new(vec![
            Sequence::new(b"AA".to_vec(), "x", 1.0),
            Sequence::new(b"AC".to_vec(), "x", 1.0),
            Sequence::new(b"CA".to_vec(), "x", 2.0),
        ])
        .unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_order_bounds() {
        assert!(matches!(Order::new(0), Err(PwmError::InvalidOrder(0))));
        assert!(matches!(Order::new(5), Err(PwmError::InvalidOrder(5))));
        assert_eq!(Order::new(3).unwrap(), Order::THREE);
        assert_eq!(
            Order::FOUR.up_to().map(Order::get).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_order_one_frequencies() {
        let pwm = PwmBuilder::new(Order::ONE).build(&toy()).unwrap();

        assert!(close(pwm.frequency(&Combo::new(&[0], b"A")), 0.5));
        assert!(close(pwm.frequency(&Combo::new(&[0], b"C")), 0.5));
        assert!(close(pwm.frequency(&Combo::new(&[1], b"A")), 0.75));
        assert!(close(pwm.frequency(&Combo::new(&[1], b"C")), 0.25));
        assert_eq!(pwm.frequency(&Combo::new(&[1], b"G")), 0.0);
        assert_eq!(pwm.len(), 4);
    }

    #[test]
    fn test_order_two_frequencies() {
        let pwm = PwmBuilder::new(Order::TWO).build(&toy()).unwrap();

        assert!(close(pwm.frequency_of(&[0, 1], b"AA"), 0.25));
        assert!(close(pwm.frequency_of(&[0, 1], b"AC"), 0.25));
        assert!(close(pwm.frequency_of(&[0, 1], b"CA"), 0.5));
        assert_eq!(pwm.frequency_of(&[0, 1], b"CC"), 0.0);
        assert_eq!(pwm.len(), 3);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let ensemble = Ensemble::new(vec![
            Sequence::new(b"ACDEA".to_vec(), "x", 0.5),
            Sequence::new(b"ACDDA".to_vec(), "x", 1.5),
            Sequence::new(b"CCEEA".to_vec(), "x", 1.0),
            Sequence::new(b"ADDEC".to_vec(), "x", 3.0),
        ])
        .unwrap();

        for order in Order::FOUR.up_to() {
            let serial = PwmBuilder::new(order).build(&ensemble).unwrap();
            let parallel = PwmBuilder::new(order).parallel(true).build(&ensemble).unwrap();
            assert_eq!(serial.len(), parallel.len());
            for (combo, frequency) in serial.iter() {
                assert_eq!(parallel.frequency(combo), frequency);
            }
        }
    }

    #[test]
    fn test_restricted_table() {
        let ensemble = toy();
        let pwm = PwmBuilder::new(Order::TWO)
            .build_restricted(&ensemble, b"AA")
            .unwrap();

        assert_eq!(pwm.len(), 1);
        assert!(close(pwm.frequency_of(&[0, 1], b"AA"), 0.25));

        let pwm = PwmBuilder::new(Order::ONE)
            .build_restricted(&ensemble, b"CA")
            .unwrap();
        assert!(close(pwm.frequency_of(&[0], b"CA"), 0.5));
        assert!(close(pwm.frequency_of(&[1], b"CA"), 0.75));
        assert_eq!(pwm.frequency(&Combo::new(&[0], b"A")), 0.0);

        assert!(matches!(
            PwmBuilder::new(Order::ONE).build_restricted(&ensemble, b"A"),
            Err(PwmError::LengthMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_rejects_unaligned_and_weightless() {
        let unaligned = Ensemble::new(vec![
            Sequence::unlabeled(b"AC".to_vec()),
            Sequence::unlabeled(b"ACG".to_vec()),
        ])
        .unwrap();
        assert!(matches!(
            PwmBuilder::new(Order::ONE).build(&unaligned),
            Err(PwmError::UnalignedEnsemble { .. })
        ));

        let weightless = Ensemble::new(vec![Sequence::new(b"AC".to_vec(), "x", 0.0)]).unwrap();
        assert!(matches!(
            PwmBuilder::new(Order::ONE).build(&weightless),
            Err(PwmError::ZeroTotalWeight)
        ));
    }

    #[test]
    fn test_entries_at() {
        let pwm = PwmBuilder::new(Order::TWO).build(&toy()).unwrap();
        let mut symbols: Vec<Vec<u8>> = pwm
            .entries_at(&[0, 1])
            .map(|(combo, _)| combo.symbols().to_vec())
            .collect();
        symbols.sort();
        assert_eq!(symbols, vec![b"AA".to_vec(), b"AC".to_vec(), b"CA".to_vec()]);
    }
}
