use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObserveError {
    /// Neither a frame scheduler nor the tick fallback is available on this thread.
    #[error("no way to deliver change events: no frame scheduler installed and tick fallback disabled")]
    NoScheduler,

    #[error("no element with {identifier} = {id} in sequence")]
    NotFound { identifier: String, id: String },
}

pub type Result<T> = std::result::Result<T, ObserveError>;
