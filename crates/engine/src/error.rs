use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("no active queue")]
    Empty,
    #[error("fusion mix produced no tracks")]
    EmptyResult,
    #[error("index {index} is outside a queue of {len} tracks")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("failed to load {url}: {reason}")]
    Load { url: String, reason: String },
    #[error("audio engine already released")]
    Released,
}
