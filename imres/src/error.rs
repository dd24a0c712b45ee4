use crate::Tag;
use thiserror::Error;
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResError {
    #[error("truncated chunk header")]
    TruncatedHeader,
    #[error("chunk declares {declared} bytes but only {available} remain")]
    TruncatedChunk { declared: u32, available: usize },
    #[error("invalid chunk tag")]
    InvalidTag,

    #[error("{0} is not a resource family")]
    NotAFamily(Tag),
    #[error("missing music header chunk")]
    MissingHeader,
}

pub type Result<T> = std::result::Result<T, ResError>;
