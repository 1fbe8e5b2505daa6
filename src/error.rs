use std::fmt;

/// Errors surfaced by the engine. All are fatal to the current run: once a
/// block's walk set might be inconsistent there is no local recovery, so the
/// caller is expected to abort rather than retry.
#[derive(Debug)]
pub enum GraphWalkerError {
    /// A block's on-disk sizes are inconsistent with its own header
    /// (`beg_pos` not non-decreasing, `beg_pos[n] != csr.len()`, ...).
    Corrupt(String),
    /// An expected block or log file is absent and cannot be created.
    MissingFile(String),
    /// A walk spill or log append failed.
    QueueWriteError(String),
    /// A walk record would not fit the 24/26/14-bit packed layout.
    OverflowEncoding(String),
    /// A configuration value is structurally invalid (e.g. a non-power-of-two group size).
    ConfigInvalid(String),
    Io(std::io::Error),
}

impl fmt::Display for GraphWalkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphWalkerError::Corrupt(msg) => write!(f, "corrupt block store: {}", msg),
            GraphWalkerError::MissingFile(path) => write!(f, "missing file: {}", path),
            GraphWalkerError::QueueWriteError(msg) => write!(f, "walk queue write failed: {}", msg),
            GraphWalkerError::OverflowEncoding(msg) => write!(
                f,
                "walk record overflow: {} (consider widening the packed record format)",
                msg
            ),
            GraphWalkerError::ConfigInvalid(msg) => write!(f, "invalid configuration: {}", msg),
            GraphWalkerError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for GraphWalkerError {}

impl From<std::io::Error> for GraphWalkerError {
    fn from(e: std::io::Error) -> Self {
        GraphWalkerError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, GraphWalkerError>;
