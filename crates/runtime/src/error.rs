use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error(transparent)]
    Connector(#[from] connector::Error),

    #[error(transparent)]
    Capability(#[from] capabilities::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
