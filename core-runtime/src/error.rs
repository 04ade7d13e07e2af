use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging already initialized: {0}")]
    LoggingAlreadyInitialized(String),
}

pub type Result<T> = std::result::Result<T, Error>;
