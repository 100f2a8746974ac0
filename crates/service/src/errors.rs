use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("bad request")]
    BadRequest,
    #[error("resource not found")]
    ResourceNotFound,
    #[error("failed to parse file: {0}")]
    Parse(String),
    #[error("failed to persist storage: {0}")]
    Persistence(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn parse(what: impl std::fmt::Display) -> Self { Self::Parse(what.to_string()) }
}
