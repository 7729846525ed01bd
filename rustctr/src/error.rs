use thiserror::Error;

/// Configuration mistakes. Fatal: raised while settings are validated,
/// before any file-group is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown error method key `{0}` (expected lsq, parametric, empirical or scikits)")]
    UnknownErrorMethod(String),
    #[error("unknown index-selection policy {0} (expected 0, 1 or 2)")]
    UnknownPolicy(u8),
}

/// Why one file-group produced no record. Non-fatal: the group is dropped
/// from the aggregate table with a diagnostic and the batch keeps going.
#[derive(Debug, Error)]
pub enum GroupFailure {
    #[error("left photopeak would not fit")]
    LeftPeak,
    #[error("right photopeak would not fit")]
    RightPeak,
    #[error("only {0} coincident samples after index selection")]
    InsufficientData(usize),
    #[error("delay distribution would not fit")]
    DelayFit,
    #[error("missing channel file F{0}")]
    MissingChannel(u8),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
