use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("URL canonicalization failed: {0}")]
    Canonicalization(String),
    #[error("URL is missing required component: {0}")]
    MissingComponent(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
