use std::fmt;

/// Error type returned when a block fails structural validation, before it
/// is ever handed to the chain store.
#[derive(Debug)]
pub enum ValidationError {
    /// Block is invalid according to a validity predicate.
    Invalid(&'static str),
    /// Block is invalid with a dynamic error message.
    Custom(String),
}

/// High-level errors that can occur in the consensus engine and chain store.
#[derive(Debug)]
pub enum ConsensusError {
    /// Underlying structural validation failure (B1/B2 etc.).
    Validation(ValidationError),
    /// Block's declared parent is not present in the store.
    UnknownParent(String),
    /// A transaction in the block is not applicable to the post-state it is
    /// being evaluated against (insufficient balance/stake, self-transfer).
    NonApplicableTransaction(String),
    /// Replaying a candidate chain's transactions failed partway through.
    ReplayFailed(String),
    /// Storage-related failure, e.g. a missing block a pointer refers to.
    Storage(String),
    /// Catch-all for other issues.
    Other(String),
}

impl From<ValidationError> for ConsensusError {
    fn from(e: ValidationError) -> Self {
        ConsensusError::Validation(e)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Invalid(msg) => write!(f, "invalid block: {msg}"),
            ValidationError::Custom(msg) => write!(f, "invalid block: {msg}"),
        }
    }
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusError::Validation(e) => write!(f, "{e}"),
            ConsensusError::UnknownParent(hash) => write!(f, "unknown parent block: {hash}"),
            ConsensusError::NonApplicableTransaction(reason) => {
                write!(f, "non-applicable transaction: {reason}")
            }
            ConsensusError::ReplayFailed(reason) => write!(f, "replay failed: {reason}"),
            ConsensusError::Storage(msg) => write!(f, "storage error: {msg}"),
            ConsensusError::Other(msg) => write!(f, "consensus error: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for ConsensusError {}
