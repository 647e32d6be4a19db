use thiserror::Error;

/// Errors surfaced by score-file parsing, configuration, and tree parsing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("the input file is not a DMST score file")]
    UnknownFileType,

    #[error("could not read {0} from the score file")]
    MissingHeaderField(&'static str),

    #[error("unsupported score type `{0}` (expected `subset_scores`)")]
    UnsupportedScoreType(String),

    #[error("unsupported score order `{0}` (expected `colex_order`)")]
    UnsupportedScoreOrder(String),

    #[error("the score file contains too few scores: no score for {0}")]
    MissingScore(String),

    #[error("instances are limited to 32 variables, got {0}")]
    TooManyVariables(u32),

    #[error("the maximum width must be at least 1")]
    ZeroWidth,

    #[error("estimated table memory {estimate_mib} MiB exceeds the configured limit {limit_mib} MiB")]
    MemoryLimit { estimate_mib: u64, limit_mib: u64 },

    #[error("malformed tree string at byte {0}")]
    MalformedTree(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
