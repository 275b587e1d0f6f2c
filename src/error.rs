//! Main Crate Error

use std::fmt::{self, Display, Formatter};

use crate::common::{ErrorCode, Peer};
use crate::rpc::RpcError;

/// Alias for results returned by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
/// Kvdht crate error enum.
pub enum Error {
    /// Two ids (or an id and a key) of different lengths were compared.
    #[error("Id length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Ids can't be empty.
    #[error("Invalid Id size: {0}")]
    InvalidIdSize(usize),

    /// Failed to parse an [crate::Id] from a hex string.
    #[error("Invalid Id encoding: {0}")]
    InvalidIdEncoding(String),

    /// The k-bucket this peer belongs to is full.
    #[error("No space left in the k-bucket to store the peer")]
    NoSpace,

    /// A configuration value makes the requested operation impossible.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Every candidate was queried and none of them had the value.
    ///
    /// Contains the errors of the peers that couldn't be queried.
    #[error("Value not found, errors contacting peers: [{0}]")]
    NotFound(PeerErrors),

    /// A value for this key is already stored in the network.
    #[error("A value with this key is already set in the DHT")]
    AlreadySet,

    /// Not enough storers were found, or not enough of them stored the value.
    #[error("Failed to set value: {reason}, errors: [{errors}]")]
    SettingFailed {
        reason: SettingFailure,
        errors: PeerErrors,
    },

    /// A peer rpc failed in a way that aborts the whole operation.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Handling a request against the local node failed.
    #[error("Local request handling failed: {0}")]
    Server(ErrorCode),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),

    #[error("Failed to parse packet bytes: {0}")]
    BencodeError(#[from] serde_bencode::Error),

    /// A decoded message is missing fields or carries invalid values.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The thread running the operation went away without a result.
    #[error("Operation was interrupted before producing a result")]
    Interrupted,
}

/// Failure reported by a [crate::Storage] implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Storage failure: {0}")]
pub struct StorageError(pub String);

/// Why [crate::Dht::set_value] gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingFailure {
    /// The lookup found fewer storers than `min_num_stores`.
    NotEnoughStorers { found: usize, required: usize },
    /// Fewer than `min_num_stores` storers acknowledged the write.
    NotEnoughReplicas { stored: usize, required: usize },
}

impl Display for SettingFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SettingFailure::NotEnoughStorers { found, required } => write!(
                f,
                "unable to find the minimum amount of storers ({required}) in the network, found {found}"
            ),
            SettingFailure::NotEnoughReplicas { stored, required } => write!(
                f,
                "value was stored at {stored} peers, less than the minimum ({required})"
            ),
        }
    }
}

/// An rpc error attributed to the peer that caused it.
#[derive(Debug, Clone)]
pub struct PeerError {
    pub peer: Peer,
    pub error: RpcError,
}

impl Display for PeerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.peer, self.error)
    }
}

/// Aggregated peer errors collected during a lookup or a replication.
#[derive(Debug, Clone, Default)]
pub struct PeerErrors(pub Vec<PeerError>);

impl PeerErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PeerError> {
        self.0.iter()
    }
}

impl From<Vec<PeerError>> for PeerErrors {
    fn from(errors: Vec<PeerError>) -> Self {
        PeerErrors(errors)
    }
}

impl Display for PeerErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{error}")?;
        }

        Ok(())
    }
}
