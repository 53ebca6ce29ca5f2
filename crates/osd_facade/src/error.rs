use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OsdFacadeError {
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("internal error: {0}")]
    Internal(String),
}
