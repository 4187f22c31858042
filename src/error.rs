//! Error handling for pwmfit
//!
//! Every fallible operation in the crate returns [`Result`]. Fatal kinds
//! abort a run; a semantically invalid mutation is not an error at all but a
//! [`MutationIssue`](crate::mutant::MutationIssue) carried by its `Mutant`.

use thiserror::Error;

/// Error type for all pwmfit operations
#[derive(Error, Debug)]
pub enum PwmError {
    /// No usable sequences were loaded
    #[error("Ensemble contains no sequences")]
    EmptyEnsemble,

    /// PWM construction requested on sequences of differing lengths
    #[error("Ensemble is not aligned: found {} distinct sequence lengths ({})", .lengths.len(), join_lengths(.lengths))]
    UnalignedEnsemble { lengths: Vec<usize> },

    /// Correlation order outside 1..=4
    #[error("PWM order {0} is invalid (must be between 1 and 4)")]
    InvalidOrder(usize),

    /// Order is valid in general but not for the requested operation
    #[error("Order {order} is not supported for {context}")]
    UnsupportedOrder { order: usize, context: &'static str },

    /// Requested field absent from tabular input
    #[error("{column} is not a column in {file}")]
    UnknownColumn { column: String, file: String },

    /// Mutation descriptor does not match `<symbol><position><symbol>`
    #[error("Not able to match mutation '{0}'")]
    MalformedMutation(String),

    /// Sequence weight is negative or not a number
    #[error("Invalid weight {weight} for sequence {index}")]
    InvalidWeight { index: usize, weight: f64 },

    /// Sum of weights is zero, frequencies cannot be normalized
    #[error("Total ensemble weight is zero")]
    ZeroTotalWeight,

    /// Candidate sequence length differs from the alignment length
    #[error("Sequence of length {found} cannot be scored against alignment length {expected}")]
    LengthMismatch { expected: usize, found: usize },

    /// An invalid mutant was handed to a scorer
    #[error("Mutant '{0}' is invalid and cannot be scored")]
    InvalidMutant(String),

    /// A2M header or record layout not understood
    #[error("Invalid A2M input: {0}")]
    InvalidA2m(String),

    /// I/O errors (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-file reader errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Parse error for numeric or other structured data
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Thread pool build error: {0}")]
    ThreadPoolBuildError(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_lengths(lengths: &[usize]) -> String {
    lengths
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PwmError {
    /// Create an UnknownColumn error
    pub fn unknown_column(column: impl Into<String>, file: impl Into<String>) -> Self {
        Self::UnknownColumn {
            column: column.into(),
            file: file.into(),
        }
    }

    /// Create an InvalidA2m error
    pub fn invalid_a2m(message: impl Into<String>) -> Self {
        Self::InvalidA2m(message.into())
    }

    /// Create a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}

/// Result type alias for pwmfit operations
pub type Result<T> = std::result::Result<T, PwmError>;
