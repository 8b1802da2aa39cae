use thiserror::Error;

/// Errors surfaced by the load and restore paths. Everything else in the core
/// (unmapped bus accesses, undefined opcodes) resolves to hardware behaviour
/// instead of an error value.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("invalid ROM image: {0}")]
    InvalidRom(String),
    #[error("invalid save state: {0}")]
    InvalidState(String),
    #[error("battery RAM is {actual} bytes, cartridge expects {expected}")]
    InvalidSram { expected: usize, actual: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<bincode::error::DecodeError> for EmulatorError {
    fn from(err: bincode::error::DecodeError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for EmulatorError {
    fn from(err: bincode::error::EncodeError) -> Self {
        Self::InvalidState(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EmulatorError>;
