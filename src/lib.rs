//! Higher-order position weight matrices for scoring sequences and point
//! mutants against a weighted, aligned ensemble.
//!
//! The usual flow is [`io`] readers into an [`Ensemble`], a [`PwmBuilder`]
//! per order, then either [`Pwm::score`] for whole sequences or a
//! [`WildTypeModel`] for incremental scoring of mutants parsed by
//! [`MutantParser`]. [`pipeline::ScoringPipeline`] wires these together.

pub mod combination;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod io;
pub mod logging;
pub mod mutant;
pub mod output;
pub mod pipeline;
pub mod pwm;
pub mod score;
pub mod weights;
pub mod wildtype;

pub use ensemble::{Ensemble, Sequence, Summary};
pub use error::{PwmError, Result};
pub use mutant::{Mutant, MutantParser, MutationIssue, PositionMap};
pub use pwm::{Combo, Order, Pwm, PwmBuilder};
pub use score::{LogOdds, PwmScorer, ScoreParams};
pub use wildtype::WildTypeModel;
