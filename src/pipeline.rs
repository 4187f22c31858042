//! End-to-end scoring runs
//!
//! [`ScoringPipeline`] owns a validated [`RunConfig`] and drives the two run
//! modes: scoring the sequences of a test table against PWMs learned from a
//! training table, and scoring the mutants of a mutation file against an A2M
//! alignment. When a thread count is configured the whole run executes
//! inside a dedicated rayon pool.

use crate::config::RunConfig;
use crate::ensemble::{self, Ensemble, Sequence, Summary};
use crate::error::{PwmError, Result};
use crate::io::{self, A2mAlignment, TableColumns};
use crate::logging::time_operation;
use crate::mutant::{Mutant, MutantParser};
use crate::output::{FailureLog, ScoreTable, FAILS_EXTENSION, SCORES_EXTENSION};
use crate::pwm::{Pwm, PwmBuilder};
use crate::score::PwmScorer;
use crate::weights::{self, WeightMode};
use crate::wildtype::{WildTypeModel, MAX_WILD_TYPE_ORDER};
use rayon::prelude::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Header of the label column in mutant score tables and in tabular
/// score tables whose test table has none
const LABEL_COLUMN: &str = "label";

/// Inputs of a tabular run
#[derive(Debug, Clone)]
pub struct TabularJob {
    pub training_file: PathBuf,
    pub train_columns: TableColumns,
    /// Keep only training sequences with this label
    pub train_label_value: Option<String>,
    pub testing_file: PathBuf,
    pub test_columns: TableColumns,
    /// Percentage of training sequences kept, 1..=100
    pub fraction: u32,
    /// Seed of the sub-sample
    pub replicate: u64,
    pub delimiter: u8,
    /// Output prefix; derived from the testing file when absent
    pub output: Option<PathBuf>,
}

/// Inputs of a mutant run
#[derive(Debug, Clone)]
pub struct MutantJob {
    pub alignment_file: PathBuf,
    pub mutations_file: PathBuf,
    pub output: Option<PathBuf>,
}

/// Outcome of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Items with scores
    pub scored: usize,
    /// Items written with empty score fields
    pub skipped: usize,
    pub scores_path: PathBuf,
    pub fails_path: Option<PathBuf>,
    /// Summary of the training ensemble
    pub summary: Summary,
}

/// Alignment cleaned of insertion columns and reweighted
#[derive(Debug, Clone)]
pub struct PreparedAlignment {
    pub ensemble: Ensemble,
    /// Reference with lowercase insertion columns
    pub true_reference: Vec<u8>,
    pub true_offset: i64,
}

impl PreparedAlignment {
    pub fn parser(&self) -> MutantParser<'_> {
        MutantParser::new(&self.true_reference, self.true_offset)
    }
}

/// Scores per order, ascending; `None` for items that could not be scored
pub type ScoreRow = Option<Vec<f64>>;

pub struct ScoringPipeline {
    config: RunConfig,
}

impl ScoringPipeline {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn parallel(&self) -> bool {
        self.config.scoring.threads
    }

    /// Run `f` inside a dedicated pool when a thread count is configured
    fn install<T, F>(&self, f: F) -> Result<T>
    where
        T: Send,
        F: FnOnce() -> Result<T> + Send,
    {
        let scoring = &self.config.scoring;
        if scoring.threads && scoring.num_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(scoring.num_threads)
                .build()?;
            pool.install(f)
        } else {
            f()
        }
    }

    /// PWMs of every order up to the configured one, ascending
    pub fn build_pwms(&self, ensemble: &Ensemble) -> Result<Vec<Pwm>> {
        let order = self.config.scoring.order()?;
        time_operation("build PWMs", || {
            order
                .up_to()
                .map(|k| PwmBuilder::new(k).parallel(self.parallel()).build(ensemble))
                .collect()
        })
    }

    /// Apply the configured weighting mode
    pub fn reweight(&self, sequences: &mut [Sequence]) -> Result<()> {
        let weighting = &self.config.weighting;
        if weighting.mode == WeightMode::None {
            return Ok(());
        }
        time_operation("reweight sequences", || {
            weights::apply(sequences, weighting.mode, weighting.similarity, self.parallel())
        })
    }

    /// Score each sequence at every order; wrong-length sequences get `None`
    pub fn score_sequences(&self, pwms: &[Pwm], sequences: &[Sequence]) -> Result<Vec<ScoreRow>> {
        let scorers: Vec<PwmScorer<'_>> = pwms
            .iter()
            .map(|pwm| pwm.scorer(&self.config.scoring.params_for(pwm.order())))
            .collect();
        let Some(length) = pwms.first().map(Pwm::alignment_length) else {
            return Ok(vec![None; sequences.len()]);
        };

        let score = |sequence: &Sequence| -> Result<ScoreRow> {
            if sequence.len() != length {
                warn!(
                    label = %sequence.label,
                    length = sequence.len(),
                    expected = length,
                    "Skipping test sequence of wrong length"
                );
                return Ok(None);
            }
            let scores = scorers
                .iter()
                .map(|scorer| scorer.score(&sequence.residues))
                .collect::<Result<Vec<f64>>>()?;
            Ok(Some(scores))
        };

        if self.parallel() {
            sequences.par_iter().map(score).collect()
        } else {
            sequences.iter().map(score).collect()
        }
    }

    /// Drop insertion columns and reweight, yielding the training ensemble
    pub fn prepare_alignment(&self, alignment: A2mAlignment) -> Result<PreparedAlignment> {
        let true_reference = alignment.reference().residues.clone();
        let mut sequences = alignment.sequences;

        ensemble::remove_insertion_columns(&mut sequences, &true_reference);
        self.reweight(&mut sequences)?;
        let ensemble = Ensemble::new(sequences)?;
        ensemble.verify_aligned()?;

        Ok(PreparedAlignment {
            ensemble,
            true_reference,
            true_offset: alignment.true_offset,
        })
    }

    /// Score every valid mutant; invalid mutants get `None`
    ///
    /// # Errors
    /// * `UnsupportedOrder` - wild-type-relative scoring above order 3
    pub fn score_mutants(&self, prepared: &PreparedAlignment, mutants: &[Mutant]) -> Result<Vec<ScoreRow>> {
        let scoring = &self.config.scoring;
        let order = scoring.order()?;
        let ensemble = &prepared.ensemble;
        let reference = prepared.parser().aligned_reference();

        let pwms;
        let scorer = if scoring.wild_type_relative {
            if order.get() > MAX_WILD_TYPE_ORDER {
                return Err(PwmError::UnsupportedOrder {
                    order: order.get(),
                    context: "wild-type-relative scoring",
                });
            }
            let models = time_operation("build wild-type models", || {
                order
                    .up_to()
                    .map(|k| {
                        let builder = PwmBuilder::new(k).parallel(self.parallel());
                        WildTypeModel::with_builder(ensemble, &reference, &builder, &scoring.params_for(k))
                    })
                    .collect::<Result<Vec<_>>>()
            })?;
            MutantScorer::WildType(models)
        } else {
            pwms = self.build_pwms(ensemble)?;
            let scorers = pwms
                .iter()
                .map(|pwm| pwm.scorer(&scoring.params_for(pwm.order())))
                .collect();
            MutantScorer::Full {
                scorers,
                reference: &reference,
            }
        };

        let score = |mutant: &Mutant| -> Result<ScoreRow> {
            if !mutant.is_valid() {
                return Ok(None);
            }
            scorer.score(mutant).map(Some)
        };
        time_operation("score mutants", || {
            if self.parallel() {
                mutants.par_iter().map(score).collect()
            } else {
                mutants.iter().map(score).collect()
            }
        })
    }

    /// Tabular mode: train table in, score table out
    pub fn run_tabular(&self, job: &TabularJob) -> Result<RunReport> {
        self.install(|| self.tabular(job))
    }

    /// Mutant mode: A2M alignment and mutation list in, score table and failure log out
    pub fn run_mutants(&self, job: &MutantJob) -> Result<RunReport> {
        self.install(|| self.mutants(job))
    }

    fn tabular(&self, job: &TabularJob) -> Result<RunReport> {
        let mut training = time_operation("read training table", || {
            io::read_table(&job.training_file, &job.train_columns, job.delimiter)
        })?;

        match (&job.train_columns.label, &job.train_label_value) {
            (Some(_), Some(value)) => {
                ensemble::filter_by_label(&mut training, value);
                info!(label = %value, kept = training.len(), "Filtered training sequences");
            }
            (Some(column), None) => {
                return Err(PwmError::config(format!(
                    "Label column {} given without a label value",
                    column
                )))
            }
            (None, Some(value)) => {
                return Err(PwmError::config(format!(
                    "Label value {} given without a label column",
                    value
                )))
            }
            (None, None) => {}
        }

        let mut training = ensemble::sample(&training, job.fraction, job.replicate)?;
        self.reweight(&mut training)?;
        let ensemble = Ensemble::new(training)?;
        debug!(summary = %ensemble.summary(), "Training ensemble");

        let pwms = self.build_pwms(&ensemble)?;

        let testing = time_operation("read testing table", || {
            io::read_table(&job.testing_file, &job.test_columns, job.delimiter)
        })?;
        let rows = time_operation("score sequences", || self.score_sequences(&pwms, &testing))?;

        let prefix = job
            .output
            .clone()
            .unwrap_or_else(|| self.default_prefix(&job.testing_file));
        let scores_path = with_extension(&prefix, SCORES_EXTENSION);
        let label_column = job.test_columns.label.as_deref().unwrap_or(LABEL_COLUMN);
        let mut table = ScoreTable::create(&scores_path, label_column, ',', self.config.scoring.order()?)?;

        let mut scored = 0;
        for (sequence, row) in testing.iter().zip(&rows) {
            table.write_row(&sequence.label, &as_fields(row))?;
            scored += usize::from(row.is_some());
        }
        table.finish()?;

        info!(path = %scores_path.display(), scored, "Wrote score table");
        Ok(RunReport {
            scored,
            skipped: rows.len() - scored,
            scores_path,
            fails_path: None,
            summary: ensemble.summary().clone(),
        })
    }

    fn mutants(&self, job: &MutantJob) -> Result<RunReport> {
        let alignment = time_operation("read alignment", || io::read_a2m(&job.alignment_file))?;
        let prepared = time_operation("prepare alignment", || self.prepare_alignment(alignment))?;
        debug!(summary = %prepared.ensemble.summary(), "Alignment ensemble");

        let descriptors = io::read_descriptors(&job.mutations_file)?;
        let parser = prepared.parser();
        let mutants = descriptors
            .iter()
            .map(|descriptor| parser.parse(descriptor))
            .collect::<Result<Vec<_>>>()?;
        info!(mutants = mutants.len(), "Parsed mutation file");

        let rows = self.score_mutants(&prepared, &mutants)?;

        let prefix = job
            .output
            .clone()
            .unwrap_or_else(|| self.default_prefix(&job.mutations_file));
        let scores_path = with_extension(&prefix, SCORES_EXTENSION);
        let fails_path = with_extension(&prefix, FAILS_EXTENSION);
        let mut table = ScoreTable::create(&scores_path, LABEL_COLUMN, ';', self.config.scoring.order()?)?;
        let mut fails = FailureLog::create(&fails_path)?;

        let mut scored = 0;
        for (mutant, row) in mutants.iter().zip(&rows) {
            for issue in mutant.issues() {
                warn!(mutant = mutant.descriptor(), "{}", issue);
                fails.report(issue)?;
            }
            table.write_row(mutant.descriptor(), &as_fields(row))?;
            scored += usize::from(row.is_some());
        }
        table.finish()?;
        fails.finish()?;

        info!(path = %scores_path.display(), scored, skipped = rows.len() - scored, "Wrote score table");
        Ok(RunReport {
            scored,
            skipped: rows.len() - scored,
            scores_path,
            fails_path: Some(fails_path),
            summary: prepared.ensemble.summary().clone(),
        })
    }

    /// File name of the input up to its first `.`, tagged with the
    /// similarity threshold and pseudocount when similarity weighting is on.
    /// Directories are dropped so outputs land in the working directory.
    pub fn default_prefix(&self, input: &Path) -> PathBuf {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = name.split('.').next().unwrap_or_default();

        let tag = match self.config.weighting.mode {
            WeightMode::Similarity => format!(
                "{}_{}_{}",
                stem, self.config.weighting.similarity, self.config.scoring.pseudocount_exponent
            ),
            _ => stem.to_string(),
        };
        PathBuf::from(tag)
    }
}

enum MutantScorer<'a> {
    Full {
        scorers: Vec<PwmScorer<'a>>,
        reference: &'a [u8],
    },
    WildType(Vec<WildTypeModel<'a>>),
}

impl MutantScorer<'_> {
    fn score(&self, mutant: &Mutant) -> Result<Vec<f64>> {
        match self {
            MutantScorer::Full { scorers, reference } => {
                let sequence = mutant.apply(reference)?;
                scorers.iter().map(|scorer| scorer.score(&sequence)).collect()
            }
            MutantScorer::WildType(models) => models.iter().map(|model| model.evaluate(mutant)).collect(),
        }
    }
}

fn as_fields(row: &ScoreRow) -> Vec<Option<f64>> {
    match row {
        Some(scores) => scores.iter().copied().map(Some).collect(),
        None => Vec::new(),
    }
}

fn with_extension(prefix: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(prefix.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}
