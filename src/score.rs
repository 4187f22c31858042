//! Log-odds scoring of fixed-length sequences against a [`Pwm`]
//!
//! Each k-combination of positions contributes
//! `ln(prod(normalizer(s_i)) * (freq + c)) / ln(D)`, where `D` is the alphabet
//! size of the ensemble and `c` the pseudocount. Without bias the normalizer
//! is `D` for every symbol; with bias it is `N * L / global_count(s)`.

use crate::combination;
use crate::ensemble::Summary;
use crate::error::{PwmError, Result};
use crate::pwm::Pwm;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Default pseudocount exponent: `c = 10^-6`
pub const DEFAULT_PSEUDOCOUNT_EXPONENT: f64 = 6.0;

/// Parameters of the log-odds transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreParams {
    /// Additive pseudocount `c`, keeps unseen combinations finite
    pub pseudocount: f64,
    /// Normalize by global symbol frequency instead of `D`
    pub bias: bool,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self::from_exponent(DEFAULT_PSEUDOCOUNT_EXPONENT)
    }
}

impl ScoreParams {
    pub fn new(pseudocount: f64) -> Self {
        Self {
            pseudocount,
            bias: false,
        }
    }

    /// Pseudocount `10^-exponent`
    pub fn from_exponent(exponent: f64) -> Self {
        Self::new(10f64.powf(-exponent))
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }
}

/// Precomputed per-symbol normalizers and log base
#[derive(Debug, Clone)]
pub struct LogOdds {
    pseudocount: f64,
    ln_base: f64,
    normalizers: [f64; 256],
}

impl LogOdds {
    /// Derive the transform from an ensemble summary and its alignment length
    ///
    /// A symbol never seen in the ensemble falls back to the unbiased
    /// normalizer `D`. With a single-symbol alphabet the natural log is used.
    pub fn new(summary: &Summary, length: usize, params: &ScoreParams) -> Self {
        let alphabet_size = summary.alphabet_size() as f64;
        let ln_base = if summary.alphabet_size() > 1 {
            alphabet_size.ln()
        } else {
            1.0
        };

        let mut normalizers = [alphabet_size; 256];
        if params.bias {
            let total_symbols = (summary.num_sequences() * length) as f64;
            for (&symbol, count) in summary.symbol_counts() {
                if count.global > 0 {
                    normalizers[symbol as usize] = total_symbols / count.global as f64;
                }
            }
        }

        Self {
            pseudocount: params.pseudocount,
            ln_base,
            normalizers,
        }
    }

    /// Log-odds contribution of one combination
    #[inline]
    pub fn term(&self, symbols: &[u8], frequency: f64) -> f64 {
        let normalizer: f64 = symbols
            .iter()
            .map(|&s| self.normalizers[s as usize])
            .product();
        (normalizer * (frequency + self.pseudocount)).ln() / self.ln_base
    }

    pub fn normalizer(&self, symbol: u8) -> f64 {
        self.normalizers[symbol as usize]
    }

    pub fn pseudocount(&self) -> f64 {
        self.pseudocount
    }
}

/// Scores candidate sequences against one PWM
#[derive(Debug, Clone)]
pub struct PwmScorer<'a> {
    pwm: &'a Pwm,
    log_odds: LogOdds,
    all_positions: Vec<usize>,
}

impl<'a> PwmScorer<'a> {
    pub fn new(pwm: &'a Pwm, params: &ScoreParams) -> Self {
        Self {
            log_odds: LogOdds::new(pwm.summary(), pwm.alignment_length(), params),
            all_positions: (0..pwm.alignment_length()).collect(),
            pwm,
        }
    }

    pub fn log_odds(&self) -> &LogOdds {
        &self.log_odds
    }

    /// Sum of log-odds terms over every k-combination of positions
    ///
    /// # Errors
    /// * `LengthMismatch` - `residues` is not of the alignment length
    pub fn score(&self, residues: &[u8]) -> Result<f64> {
        if residues.len() != self.pwm.alignment_length() {
            return Err(PwmError::LengthMismatch {
                expected: self.pwm.alignment_length(),
                found: residues.len(),
            });
        }

        let k = self.pwm.order().get();
        let mut symbols = [0u8; combination::MAX_ORDER];
        let mut total = 0.0;
        combination::for_each(&self.all_positions, k, |positions| {
            for (slot, &p) in symbols.iter_mut().zip(positions) {
                *slot = residues[p];
            }
            let frequency = self.pwm.frequency_of(positions, residues);
            total += self.log_odds.term(&symbols[..k], frequency);
        });

        trace!(order = k, score = total, "Scored sequence");
        Ok(total)
    }
}

impl Pwm {
    /// Score a single sequence; see [`PwmScorer`] for repeated use
    pub fn score(&self, residues: &[u8], params: &ScoreParams) -> Result<f64> {
        self.scorer(params).score(residues)
    }

    pub fn scorer(&self, params: &ScoreParams) -> PwmScorer<'_> {
        PwmScorer::new(self, params)
    }
}
