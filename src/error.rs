use thiserror::Error;

/// Errors produced while multiplexing.
#[derive(Error, Debug)]
pub enum MuxError {
    /// Underlying writer failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A bit-level write exceeded its buffer.
    #[error("bit buffer overflow: {0}")]
    Overflow(String),

    /// A bit-level structure finished off a byte boundary.
    #[error("bit buffer not byte-aligned: {0}")]
    Alignment(String),

    /// A PSI section exceeded the single-section length limit.
    #[error("PSI section too large: {0}")]
    SectionTooLarge(String),

    /// Malformed or inconsistent caller input.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MuxError>;
