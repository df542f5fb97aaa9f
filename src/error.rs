//! Error types for the retrosynthetic MCTS engine.
//!
//! Most failure modes are recoverable and are absorbed where they happen (a
//! bad rule application is skipped, a failed value estimate becomes a
//! sentinel score). `MctsError` is reserved for the handful of conditions
//! that abort a single target's search outright.

/// Error types for the MCTS algorithm.
#[derive(thiserror::Error, Debug)]
pub enum MctsError {
    /// The target molecule could not be parsed or sanitized.
    #[error("invalid input target: {0}")]
    InputInvalid(String),

    /// The expansion policy could not be evaluated for the root retron.
    #[error("policy evaluation failed: {0}")]
    PolicyEvaluationFailed(String),

    /// Configuration is unusable (e.g. `evaluation_type = gcn` with no network supplied).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The search was stopped before it could produce a result.
    #[error("search stopped: {0}")]
    SearchStopped(String),
}

/// Result type for MCTS operations.
pub type Result<T> = std::result::Result<T, MctsError>;
