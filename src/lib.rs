#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

mod common;
mod error;

#[cfg(feature = "async")]
pub mod async_dht;
mod dht;
pub mod rpc;
pub mod server;

pub use crate::common::{
    Distance, Id, KBucket, MemoryStorage, Peer, PeerStore, RoutingTable, Storage, ID_SIZE,
    MAX_BUCKET_SIZE_K,
};
pub use bytes::Bytes;
pub use dht::{Dht, DhtBuilder, Testnet};
pub use error::{Error, PeerError, PeerErrors, Result, SettingFailure, StorageError};
pub use rpc::Config;

pub mod messages {
    //! Wire messages exchanged between peers.
    pub use crate::common::messages::*;
}
