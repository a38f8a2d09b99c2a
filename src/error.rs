//! Main Crate Error

use std::net::SocketAddr;

use crate::common::Id;

#[derive(thiserror::Error, Debug)]
/// Chord crate error enum.
pub enum Error {
    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),

    #[error("Failed to parse packet bytes: {0}")]
    BencodeError(#[from] serde_bencode::Error),

    /// The node configuration was rejected before starting.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An address on the wire or in the configuration could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Indicates that a response transaction_id doesn't match the request.
    #[error("Invalid transaction_id: expected {expected}, got {got}")]
    InvalidTransactionId { expected: u32, got: u32 },

    /// A frame on the wire exceeded [crate::rpc::MAX_FRAME_SIZE].
    #[error("Frame of {0} bytes is too large")]
    FrameTooLarge(usize),

    /// A remote peer could not be reached, it is presumed dead for this round.
    #[error("Node {address} is unreachable: {source}")]
    Unreachable {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The remote peer answered with an error message.
    #[error("Remote error {code}: {description}")]
    Remote { code: i32, description: String },

    /// The remote peer answered with a response to a different request.
    #[error("Unexpected response")]
    UnexpectedResponse,

    /// Resolving the owner of an identifier did not terminate within the hop bound.
    #[error("Failed to resolve the owner of {target:?} within {hops} hops")]
    RoutingFailure { target: Id, hops: usize },

    /// The owning node holds no value for this key.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The node was shut down.
    #[error("Node was shutdown")]
    Shutdown,
}

impl Error {
    /// Returns `true` if this error means the peer failed to answer at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Unreachable { .. })
    }
}
