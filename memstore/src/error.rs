use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

pub type Result<T> = std::result::Result<T, Error>;
