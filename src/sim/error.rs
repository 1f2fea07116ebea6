use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build road network: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid bind host '{0}'")]
    BindHost(String),
}
