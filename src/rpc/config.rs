use std::{sync::Arc, time::Duration};

use crate::common::{Id, PeerStore, Storage, MAX_BUCKET_SIZE_K};

use super::DEFAULT_REQUEST_TIMEOUT;

/// Default number of concurrent workers searching for a value.
pub const DEFAULT_NUM_WORKERS_GET: usize = 3;
/// Default number of concurrent workers searching for storers, and storing at them.
pub const DEFAULT_NUM_WORKERS_SET: usize = 3;
/// Default number of closest peers asked for in each request while searching for a value.
pub const DEFAULT_NUM_PEER_RETURNED_GET: usize = 10;
/// Default number of closest peers asked for in each request while searching for storers.
pub const DEFAULT_NUM_PEER_RETURNED_SET: usize = 10;
/// Default maximum number of peers a value is stored at.
pub const DEFAULT_MAX_NUM_STORES: usize = 5;
/// Default minimum number of peers a value must be stored at.
pub const DEFAULT_MIN_NUM_STORES: usize = 2;

#[derive(Debug, Clone)]
/// Dht Configurations
pub struct Config {
    /// Id of this node.
    ///
    /// Defaults to the id of [Config::peer_store] if set, or a random [crate::ID_SIZE] bytes Id.
    pub id: Option<Id>,
    /// Addresses (`host:port`) of peers to bootstrap from when the node starts.
    ///
    /// Defaults to an empty list, starting a new overlay.
    pub bootstrap: Vec<String>,
    /// Explicit port to listen on.
    ///
    /// Defaults to None, binding to a random port.
    pub port: Option<u16>,
    /// UDP socket request timeout duration.
    ///
    /// A peer that doesn't respond within this duration is considered unreachable.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// Capacity of each k-bucket of the default [crate::RoutingTable].
    ///
    /// Defaults to [MAX_BUCKET_SIZE_K]
    pub bucket_size: usize,
    /// Defaults to [DEFAULT_NUM_WORKERS_GET]
    pub num_workers_get: usize,
    /// Defaults to [DEFAULT_NUM_WORKERS_SET]
    pub num_workers_set: usize,
    /// Defaults to [DEFAULT_NUM_PEER_RETURNED_GET]
    pub num_peer_returned_get: usize,
    /// Defaults to [DEFAULT_NUM_PEER_RETURNED_SET]
    pub num_peer_returned_set: usize,
    /// Maximum number of peers to store a value at, must be larger than 0 to set values.
    ///
    /// Defaults to [DEFAULT_MAX_NUM_STORES]
    pub max_num_stores: usize,
    /// Minimum number of peers that must store a value for [crate::Dht::set_value] to succeed.
    ///
    /// Defaults to [DEFAULT_MIN_NUM_STORES]
    pub min_num_stores: usize,
    /// Peer store to use instead of a [crate::RoutingTable].
    pub peer_store: Option<Arc<dyn PeerStore>>,
    /// Storage to use instead of a [crate::MemoryStorage].
    pub storage: Option<Arc<dyn Storage>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: None,
            bootstrap: Vec::new(),
            port: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            bucket_size: MAX_BUCKET_SIZE_K,
            num_workers_get: DEFAULT_NUM_WORKERS_GET,
            num_workers_set: DEFAULT_NUM_WORKERS_SET,
            num_peer_returned_get: DEFAULT_NUM_PEER_RETURNED_GET,
            num_peer_returned_set: DEFAULT_NUM_PEER_RETURNED_SET,
            max_num_stores: DEFAULT_MAX_NUM_STORES,
            min_num_stores: DEFAULT_MIN_NUM_STORES,
            peer_store: None,
            storage: None,
        }
    }
}
