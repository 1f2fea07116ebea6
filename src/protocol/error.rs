//! Codec error types

use thiserror::Error;

/// A datagram that could not be turned into a [`super::Message`].
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload of {0} bytes exceeds datagram limit")]
    TooLarge(usize),
}
