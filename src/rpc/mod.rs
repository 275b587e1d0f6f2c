//! Peer rpc, and the concurrent lookup and replication built on it.

mod config;
pub mod lookup;
mod put_query;
mod query;
mod socket;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt::Debug;
use std::net::SocketAddr;

use crate::common::messages::{
    GetValueRequestArguments, GetValueResponseArguments, StoreValueRequestArguments,
    StoreValueResponseArguments,
};
use crate::common::ErrorCode;

pub use config::*;
pub use lookup::{LookupSession, SearchCandidate};
pub(crate) use put_query::PutQuery;
pub(crate) use query::{IterativeQuery, QueryOutcome};
pub use socket::{KrpcSocket, DEFAULT_REQUEST_TIMEOUT};

/// Requests a node sends to other peers.
///
/// The implementation is responsible for sending the local node id as the requester id.
pub trait Rpc: Debug + Send + Sync {
    /// Ask `to` for the value of a key, or the `k` peers closest to it it knows about.
    fn get_value(
        &self,
        to: SocketAddr,
        request: GetValueRequestArguments,
    ) -> Result<GetValueResponseArguments, RpcError>;

    /// Ask `to` to store a value.
    fn store_value(
        &self,
        to: SocketAddr,
        request: StoreValueRequestArguments,
    ) -> Result<StoreValueResponseArguments, RpcError>;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Failure of a single rpc.
pub enum RpcError {
    /// The request couldn't be sent, or no response arrived in time.
    #[error("Peer is unreachable")]
    Unreachable,

    /// The response couldn't be decoded, or doesn't match the request.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The peer answered with an error.
    #[error("Peer responded with error {0}")]
    Remote(ErrorCode),

    /// The local node was shut down.
    #[error("Rpc was shut down")]
    Shutdown,
}

impl RpcError {
    /// Errors that only disqualify the peer that caused them, so lookups carry on
    /// with the remaining peers.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            RpcError::Unreachable
                | RpcError::InvalidResponse(_)
                | RpcError::Remote(ErrorCode::InvalidRequest)
                | RpcError::Remote(ErrorCode::InternalServerError)
                | RpcError::Remote(ErrorCode::MethodUnknown)
        )
    }

    /// Errors counted as a failed replica while storing, anything else aborts the store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, RpcError::Unreachable | RpcError::InvalidResponse(_))
    }
}
