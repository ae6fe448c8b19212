//! Error collection of quoit.
use crate::dht::Did;

/// A wrap `Result` contains custom errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the ring, the storage layer and the RPC plumbing.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Failed to bind listening endpoint: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Transport failure: {0}")]
    Transport(#[source] std::io::Error),

    #[error("Bincode serialization error")]
    BincodeSerialize(#[source] bincode::Error),

    #[error("Bincode deserialization error")]
    BincodeDeserialize(#[source] bincode::Error),

    #[error("Frame of {0} bytes exceeds the wire limit")]
    OversizedFrame(usize),

    #[error("Lookup for {0} exceeded the hop ceiling")]
    LookupExhausted(Did),

    #[error("No address known for node {0}")]
    UnknownPeer(Did),

    #[error("Identifier {0} is already occupied by another node")]
    IdCollision(Did),

    #[error("Ring state lock poisoned")]
    SyncLock,

    #[error("Finger index {0} out of range")]
    FingerIndex(usize),

    #[error("Invalid hexadecimal ring identifier")]
    BadHexId,

    #[error("Remote {0} returned no result")]
    NullReply(&'static str),

    #[error("Unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}
