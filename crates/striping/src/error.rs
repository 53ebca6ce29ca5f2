use thiserror::Error;

#[derive(Error, Debug)]
pub enum StripingError {
    #[error("malformed striping-policy record: {0}")]
    MalformedRecord(String),

    #[error("invalid striping policy: {0}")]
    InvalidPolicy(String),
}
