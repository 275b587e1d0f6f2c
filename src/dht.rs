//! Dht node.

use std::{
    net::{SocketAddr, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::{
    common::{
        messages::GetValueRequestArguments, Id, MemoryStorage, Peer, PeerStore, RoutingTable,
        Storage,
    },
    rpc::{
        Config, IterativeQuery, KrpcSocket, LookupSession, PutQuery, QueryOutcome, Rpc,
        SearchCandidate,
    },
    server::Server,
    Error, PeerError, Result, SettingFailure,
};

#[derive(Debug, Clone)]
/// Dht node.
///
/// Cloning is cheap, all clones share the same node, which shuts down
/// once the last clone is dropped.
pub struct Dht {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    config: Config,
    address: SocketAddr,
    server: Server,
    rpc: Arc<dyn Rpc>,
    socket: Option<Arc<KrpcSocket>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(socket) = &self.socket {
            socket.shutdown();
        }
    }
}

#[derive(Debug, Default, Clone)]
/// A builder for [Dht].
pub struct DhtBuilder(Config);

impl DhtBuilder {
    /// Set this node's id.
    pub fn id(mut self, id: Id) -> Self {
        self.0.id = Some(id);

        self
    }

    /// Set bootstrapping nodes.
    pub fn bootstrap(mut self, bootstrap: &[String]) -> Self {
        self.0.bootstrap = bootstrap.to_vec();

        self
    }

    /// Set the port to listen on.
    pub fn port(mut self, port: u16) -> Self {
        self.0.port = Some(port);

        self
    }

    /// Set the request timeout.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.0.request_timeout = request_timeout;

        self
    }

    /// Set the capacity of the default routing table's k-buckets.
    pub fn bucket_size(mut self, bucket_size: usize) -> Self {
        self.0.bucket_size = bucket_size;

        self
    }

    pub fn num_workers_get(mut self, num_workers_get: usize) -> Self {
        self.0.num_workers_get = num_workers_get;

        self
    }

    pub fn num_workers_set(mut self, num_workers_set: usize) -> Self {
        self.0.num_workers_set = num_workers_set;

        self
    }

    pub fn num_peer_returned_get(mut self, num_peer_returned_get: usize) -> Self {
        self.0.num_peer_returned_get = num_peer_returned_get;

        self
    }

    pub fn num_peer_returned_set(mut self, num_peer_returned_set: usize) -> Self {
        self.0.num_peer_returned_set = num_peer_returned_set;

        self
    }

    pub fn max_num_stores(mut self, max_num_stores: usize) -> Self {
        self.0.max_num_stores = max_num_stores;

        self
    }

    pub fn min_num_stores(mut self, min_num_stores: usize) -> Self {
        self.0.min_num_stores = min_num_stores;

        self
    }

    /// Use a custom [PeerStore] instead of a [RoutingTable].
    pub fn peer_store(mut self, peer_store: Arc<dyn PeerStore>) -> Self {
        self.0.peer_store = Some(peer_store);

        self
    }

    /// Use a custom [Storage] instead of a [MemoryStorage].
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.0.storage = Some(storage);

        self
    }

    /// Create a Dht node listening on a UDP socket.
    pub fn build(self) -> Result<Dht> {
        Dht::new(self.0)
    }

    /// Create a Dht node sending its requests through a custom [Rpc].
    ///
    /// `address` is the address other peers reach this node at, and the
    /// transport is expected to pass incoming requests to [Dht::server].
    pub fn build_with_rpc(self, address: SocketAddr, rpc: Arc<dyn Rpc>) -> Result<Dht> {
        Dht::with_rpc(self.0, address, rpc)
    }
}

impl Dht {
    /// Create a new Dht node listening on a UDP socket.
    pub fn new(config: Config) -> Result<Self> {
        let (config, server) = Dht::prepare(config)?;

        let socket = KrpcSocket::bind(config.port, config.request_timeout, server.clone())?;

        let dht = Dht {
            inner: Arc::new(Inner {
                address: socket.local_addr(),
                server,
                rpc: socket.clone(),
                socket: Some(socket),
                config,
            }),
        };

        dht.bootstrap_all();

        Ok(dht)
    }

    /// Returns a builder to edit settings before creating a Dht node.
    pub fn builder() -> DhtBuilder {
        DhtBuilder::default()
    }

    fn with_rpc(config: Config, address: SocketAddr, rpc: Arc<dyn Rpc>) -> Result<Self> {
        let (config, server) = Dht::prepare(config)?;

        let dht = Dht {
            inner: Arc::new(Inner {
                address,
                server,
                rpc,
                socket: None,
                config,
            }),
        };

        dht.bootstrap_all();

        Ok(dht)
    }

    /// Validate the config and set up the local peer store, storage and server.
    fn prepare(mut config: Config) -> Result<(Config, Server)> {
        if config.num_workers_get == 0 || config.num_workers_set == 0 {
            return Err(Error::InvalidConfig("number of workers must be larger than 0"));
        }

        let peer_store = match config.peer_store.take() {
            Some(peer_store) => {
                if let Some(id) = &config.id {
                    if id != peer_store.local_id() {
                        return Err(Error::InvalidConfig(
                            "peer store local id doesn't match the configured id",
                        ));
                    }
                }

                peer_store
            }
            None => {
                if config.bucket_size == 0 {
                    return Err(Error::InvalidConfig("bucket size must be larger than 0"));
                }

                let id = config.id.clone().unwrap_or_else(Id::random);

                Arc::new(RoutingTable::with_bucket_size(id, config.bucket_size))
            }
        };

        config.id = Some(peer_store.local_id().clone());

        let storage = config
            .storage
            .take()
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        Ok((config, Server::new(peer_store, storage)))
    }

    // === Getters ===

    /// Returns the id of this node.
    pub fn id(&self) -> &Id {
        self.inner.server.id()
    }

    /// Returns the address this node is reachable at.
    ///
    /// For UDP nodes, the address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.address
    }

    pub fn peer_store(&self) -> &Arc<dyn PeerStore> {
        self.inner.server.peer_store()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.inner.server.storage()
    }

    /// Handler of incoming requests, for custom [Rpc] transports.
    pub fn server(&self) -> &Server {
        &self.inner.server
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // === Public Methods ===

    /// Stop listening for requests, later requests fail with [crate::rpc::RpcError::Shutdown].
    ///
    /// No-op for nodes using a custom [Rpc].
    pub fn shutdown(&self) {
        if let Some(socket) = &self.inner.socket {
            socket.shutdown();
        }
    }

    /// Join an overlay through a peer listening at `address`.
    ///
    /// Sends it a get_value request for this node's own id, and adds it to
    /// the peer store with the id it responds with.
    pub fn bootstrap(&self, address: SocketAddr) -> Result<()> {
        let response = self.inner.rpc.get_value(
            address,
            GetValueRequestArguments {
                key: self.id().clone(),
                k: 0,
            },
        )?;

        if &response.responder_id == self.id() {
            debug!(?address, "Bootstrapped to self");
            return Ok(());
        }

        let peer = Peer::new(response.responder_id, address);
        self.peer_store().add_peer(peer.clone())?;

        debug!(%peer, "Bootstrapped");

        Ok(())
    }

    /// Find the value stored for `key` in the overlay.
    ///
    /// Fails with [Error::NotFound] if no reachable peer has it.
    pub fn get_value(&self, key: &Id) -> Result<Bytes> {
        let config = &self.inner.config;
        let server = &self.inner.server;

        let session = LookupSession::unbounded();
        session.add(self.self_candidate(key)?);

        // Ask ourselves first, the same way a remote peer would be asked.
        let response = server
            .handle_get_value(
                None,
                &GetValueRequestArguments {
                    key: key.clone(),
                    k: config.num_peer_returned_get,
                },
            )
            .map_err(Error::Server)?;
        session.mark_searched(self.id());

        if let Some(value) = response.value {
            debug!(?key, "Found value locally");
            return Ok(value);
        }

        session.merge(self.candidates(key, response.nodes)?);

        let query = IterativeQuery::new(
            key,
            config.num_peer_returned_get,
            &session,
            server,
            self.inner.rpc.as_ref(),
        );
        query.run(config.num_workers_get);

        let (outcome, errors) = query.into_parts();
        self.evict(&errors);

        match outcome {
            Some(QueryOutcome::Value { from, value }) => {
                debug!(?key, %from, "Found value");
                Ok(value)
            }
            Some(QueryOutcome::Failed(error)) => Err(error),
            None => {
                debug!(?key, errors = errors.len(), "Value not found");
                Err(Error::NotFound(errors.into()))
            }
        }
    }

    /// Store a value at the `max_num_stores` peers closest to `key` that can be found.
    ///
    /// Fails with [Error::AlreadySet] if a value is already stored for this key,
    /// and with [Error::SettingFailed] if fewer than `min_num_stores` peers
    /// could be found or could store it.
    pub fn set_value(&self, key: &Id, value: Bytes) -> Result<()> {
        let config = &self.inner.config;
        let server = &self.inner.server;

        if config.max_num_stores == 0 {
            return Err(Error::InvalidConfig("max_num_stores must be larger than 0"));
        }

        let session = LookupSession::bounded(config.max_num_stores);
        session.add_if_closer(vec![self.self_candidate(key)?]);

        let response = server
            .handle_get_value(
                None,
                &GetValueRequestArguments {
                    key: key.clone(),
                    k: config.num_peer_returned_set,
                },
            )
            .map_err(Error::Server)?;
        session.mark_searched(self.id());

        if response.value.is_some() {
            debug!(?key, "Value already set locally");
            return Err(Error::AlreadySet);
        }

        session.add_if_closer(self.candidates(key, response.nodes)?);

        let query = IterativeQuery::new(
            key,
            config.num_peer_returned_set,
            &session,
            server,
            self.inner.rpc.as_ref(),
        );
        query.run(config.num_workers_set);

        let (outcome, errors) = query.into_parts();

        match outcome {
            Some(QueryOutcome::Value { from, .. }) => {
                debug!(?key, %from, "Value already set in the overlay");
                return Err(Error::AlreadySet);
            }
            Some(QueryOutcome::Failed(error)) => return Err(error),
            None => {}
        }

        let storers = session.peers();

        if storers.len() < config.min_num_stores {
            debug!(?key, found = storers.len(), "Not enough storers");

            return Err(Error::SettingFailed {
                reason: SettingFailure::NotEnoughStorers {
                    found: storers.len(),
                    required: config.min_num_stores,
                },
                errors: errors.into(),
            });
        }

        self.evict(&errors);

        let total = storers.len();
        let failures = PutQuery::new(key, value, server, self.inner.rpc.as_ref())
            .run(storers, config.num_workers_set)?;
        let stored = total - failures.len();

        if stored < config.min_num_stores {
            debug!(?key, stored, "Not enough replicas");

            return Err(Error::SettingFailed {
                reason: SettingFailure::NotEnoughReplicas {
                    stored,
                    required: config.min_num_stores,
                },
                errors: failures.into(),
            });
        }

        debug!(?key, stored, "Value stored");

        Ok(())
    }

    // === Private Methods ===

    fn local_peer(&self) -> Peer {
        Peer::new(self.id().clone(), self.inner.address)
    }

    fn self_candidate(&self, key: &Id) -> Result<SearchCandidate> {
        let distance = self.peer_store().distance(self.id(), key)?;

        Ok(SearchCandidate::new(self.local_peer(), distance))
    }

    fn candidates(&self, key: &Id, peers: Vec<Peer>) -> Result<Vec<SearchCandidate>> {
        peers
            .into_iter()
            .map(|peer| {
                let distance = self.peer_store().distance(&peer.id, key)?;
                Ok(SearchCandidate::new(peer, distance))
            })
            .collect()
    }

    /// Remove peers that failed during a lookup from the peer store.
    fn evict(&self, errors: &[PeerError]) {
        for PeerError { peer, error } in errors {
            if let Err(remove_error) = self.peer_store().remove_peer(peer) {
                debug!(%peer, ?remove_error, "Failed to evict peer");
            } else {
                debug!(%peer, ?error, "Evicted peer");
            }
        }
    }

    fn bootstrap_all(&self) {
        for bootstrap in &self.inner.config.bootstrap {
            let address = match bootstrap.to_socket_addrs() {
                Ok(mut addresses) => match addresses.next() {
                    Some(address) => address,
                    None => continue,
                },
                Err(error) => {
                    debug!(?bootstrap, ?error, "Failed to resolve bootstrap address");
                    continue;
                }
            };

            if let Err(error) = self.bootstrap(address) {
                debug!(?bootstrap, ?error, "Failed to bootstrap");
            }
        }

        info!(
            id = %self.id(),
            address = ?self.local_addr(),
            peers = self.peer_store().peers().len(),
            "Dht node started"
        );
    }
}

/// Create a testnet of Dht nodes on localhost, to run tests against.
#[derive(Debug)]
pub struct Testnet {
    pub bootstrap: Vec<String>,
    pub nodes: Vec<Dht>,
}

impl Testnet {
    /// Start `count` nodes, each bootstrapping through up to 3 random nodes started before it.
    pub fn new(count: usize) -> Result<Testnet> {
        let mut rng = rand::thread_rng();

        let mut nodes: Vec<Dht> = vec![];
        let mut bootstrap: Vec<String> = vec![];

        for _ in 0..count {
            let known = bootstrap
                .choose_multiple(&mut rng, 3)
                .cloned()
                .collect::<Vec<String>>();

            let node = Dht::builder().bootstrap(&known).build()?;

            bootstrap.push(format!("127.0.0.1:{}", node.local_addr().port()));
            nodes.push(node);
        }

        Ok(Testnet { bootstrap, nodes })
    }
}

#[cfg(test)]
mod test {
    use crate::common::ErrorCode;
    use crate::rpc::testing::{Fault, MemoryNetwork};
    use crate::rpc::RpcError;

    use super::*;

    fn id(byte: u8) -> Id {
        Id::from_bytes([byte]).unwrap()
    }

    fn stored(node: &Dht, key: &Id) -> Option<Bytes> {
        node.storage().get(key.as_bytes()).unwrap()
    }

    #[test]
    fn closest_node_stores() {
        let network = MemoryNetwork::new();

        let nodes = [0b00000001u8, 0b00000011, 0b00000111, 0b00001111]
            .iter()
            .map(|byte| {
                network.node(
                    id(*byte),
                    Dht::builder().max_num_stores(1).min_num_stores(1),
                )
            })
            .collect::<Vec<_>>();
        MemoryNetwork::connect_all(&nodes);

        let key = id(0b00000000);
        let value = Bytes::from_static(&[0b00100001]);

        nodes[3].set_value(&key, value.clone()).unwrap();

        assert_eq!(stored(&nodes[0], &key), Some(value.clone()));
        for node in &nodes[1..] {
            assert_eq!(stored(node, &key), None);
        }

        for node in &nodes {
            assert_eq!(node.get_value(&key).unwrap(), value);
        }
    }

    #[test]
    fn set_value_twice() {
        let network = MemoryNetwork::new();

        let nodes = (1..=4u8)
            .map(|byte| {
                network.node(
                    id(byte),
                    Dht::builder().max_num_stores(1).min_num_stores(1),
                )
            })
            .collect::<Vec<_>>();
        MemoryNetwork::connect_all(&nodes);

        let key = id(0);
        nodes[0]
            .set_value(&key, Bytes::from_static(b"first"))
            .unwrap();

        // Stored locally
        assert!(matches!(
            nodes[0].set_value(&key, Bytes::from_static(b"second")),
            Err(Error::AlreadySet)
        ));
        // Found in the overlay
        assert!(matches!(
            nodes[3].set_value(&key, Bytes::from_static(b"second")),
            Err(Error::AlreadySet)
        ));

        assert_eq!(
            nodes[2].get_value(&key).unwrap(),
            Bytes::from_static(b"first")
        );
    }

    #[test]
    fn value_not_found() {
        let network = MemoryNetwork::new();

        let nodes = (1..=3u8)
            .map(|byte| network.node(id(byte), Dht::builder()))
            .collect::<Vec<_>>();
        MemoryNetwork::connect_all(&nodes);

        match nodes[0].get_value(&id(0)) {
            Err(Error::NotFound(errors)) => assert!(errors.is_empty()),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn unreachable_peer_is_recorded_and_evicted() {
        let network = MemoryNetwork::new();

        let a = network.node(id(1), Dht::builder());
        let b = network.node(id(2), Dht::builder());
        let c = network.node(id(3), Dht::builder());

        a.peer_store()
            .add_peer(Peer::new(b.id().clone(), b.local_addr()))
            .unwrap();
        a.peer_store()
            .add_peer(Peer::new(c.id().clone(), c.local_addr()))
            .unwrap();

        network.fail(b.local_addr(), Fault::All(RpcError::Unreachable));

        match a.get_value(&id(0)) {
            Err(Error::NotFound(errors)) => {
                assert_eq!(errors.len(), 1);
                let error = errors.iter().next().unwrap();
                assert_eq!(&error.peer.id, b.id());
                assert_eq!(error.error, RpcError::Unreachable);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }

        assert_eq!(
            a.peer_store().peers(),
            vec![Peer::new(c.id().clone(), c.local_addr())]
        );
    }

    #[test]
    fn wrong_responder_is_an_invalid_response() {
        let network = MemoryNetwork::new();

        let a = network.node(id(1), Dht::builder());
        let b = network.node(id(2), Dht::builder());
        MemoryNetwork::connect_all(&[a.clone(), b.clone()]);

        b.storage()
            .set(id(0).as_bytes(), Bytes::from_static(b"value"))
            .unwrap();

        network.fail(b.local_addr(), Fault::WrongResponder);

        match a.get_value(&id(0)) {
            Err(Error::NotFound(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(
                    errors.iter().next().unwrap().error,
                    RpcError::InvalidResponse(_)
                ));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(a.peer_store().peers().is_empty());
    }

    #[test]
    fn fatal_error_aborts_lookup() {
        let network = MemoryNetwork::new();

        let nodes = (1..=3u8)
            .map(|byte| network.node(id(byte), Dht::builder()))
            .collect::<Vec<_>>();
        MemoryNetwork::connect_all(&nodes);

        network.fail(
            nodes[1].local_addr(),
            Fault::All(RpcError::Remote(ErrorCode::Generic)),
        );

        assert!(matches!(
            nodes[0].get_value(&id(0)),
            Err(Error::Rpc(RpcError::Remote(ErrorCode::Generic)))
        ));
        // Only expected errors get a peer evicted.
        assert_eq!(nodes[0].peer_store().peers().len(), 2);
    }

    #[test]
    fn not_enough_storers() {
        let network = MemoryNetwork::new();

        let nodes = (1..=2u8)
            .map(|byte| network.node(id(byte), Dht::builder().min_num_stores(3)))
            .collect::<Vec<_>>();
        MemoryNetwork::connect_all(&nodes);

        let key = id(0);

        match nodes[0].set_value(&key, Bytes::from_static(b"value")) {
            Err(Error::SettingFailed {
                reason: SettingFailure::NotEnoughStorers { found, required },
                ..
            }) => {
                assert_eq!(found, 2);
                assert_eq!(required, 3);
            }
            other => panic!("expected SettingFailed, got {:?}", other),
        }

        for node in &nodes {
            assert_eq!(stored(node, &key), None);
        }
    }

    #[test]
    fn not_enough_replicas() {
        let network = MemoryNetwork::new();

        let nodes = (1..=3u8)
            .map(|byte| {
                network.node(
                    id(byte),
                    Dht::builder().max_num_stores(3).min_num_stores(3),
                )
            })
            .collect::<Vec<_>>();
        MemoryNetwork::connect_all(&nodes);

        network.fail(nodes[2].local_addr(), Fault::Stores(RpcError::Unreachable));

        let key = id(0);

        match nodes[0].set_value(&key, Bytes::from_static(b"value")) {
            Err(Error::SettingFailed {
                reason: SettingFailure::NotEnoughReplicas { stored, required },
                errors,
            }) => {
                assert_eq!(stored, 2);
                assert_eq!(required, 3);
                assert_eq!(errors.len(), 1);
                assert_eq!(&errors.iter().next().unwrap().peer.id, nodes[2].id());
            }
            other => panic!("expected SettingFailed, got {:?}", other),
        }

        assert_eq!(stored(&nodes[2], &key), None);
    }

    #[test]
    fn partial_replica_failure_is_tolerated() {
        let network = MemoryNetwork::new();

        let nodes = (1..=3u8)
            .map(|byte| {
                network.node(
                    id(byte),
                    Dht::builder().max_num_stores(3).min_num_stores(2),
                )
            })
            .collect::<Vec<_>>();
        MemoryNetwork::connect_all(&nodes);

        network.fail(nodes[2].local_addr(), Fault::Stores(RpcError::Unreachable));

        let key = id(0);
        nodes[0]
            .set_value(&key, Bytes::from_static(b"value"))
            .unwrap();

        assert!(stored(&nodes[0], &key).is_some());
        assert!(stored(&nodes[1], &key).is_some());
        assert_eq!(stored(&nodes[2], &key), None);
    }

    #[test]
    fn fatal_store_error_aborts() {
        let network = MemoryNetwork::new();

        let nodes = (1..=3u8)
            .map(|byte| {
                network.node(
                    id(byte),
                    Dht::builder().max_num_stores(3).min_num_stores(1),
                )
            })
            .collect::<Vec<_>>();
        MemoryNetwork::connect_all(&nodes);

        network.fail(
            nodes[1].local_addr(),
            Fault::Stores(RpcError::Remote(ErrorCode::InternalServerError)),
        );

        assert!(matches!(
            nodes[0].set_value(&id(0), Bytes::from_static(b"value")),
            Err(Error::Rpc(RpcError::Remote(ErrorCode::InternalServerError)))
        ));
    }

    #[test]
    fn invalid_config() {
        let network = MemoryNetwork::new();
        let node = network.node(id(1), Dht::builder().max_num_stores(0));

        assert!(matches!(
            node.set_value(&id(0), Bytes::from_static(b"value")),
            Err(Error::InvalidConfig(_))
        ));

        assert!(matches!(
            Dht::builder().num_workers_get(0).build(),
            Err(Error::InvalidConfig(_))
        ));

        let peer_store = Arc::new(RoutingTable::new(Id::random()));
        assert!(matches!(
            Dht::builder()
                .id(Id::random())
                .peer_store(peer_store)
                .build(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn key_length_mismatch() {
        let network = MemoryNetwork::new();
        let node = network.node(id(1), Dht::builder());

        let key = Id::from_bytes([0u8, 0]).unwrap();

        assert!(matches!(
            node.get_value(&key),
            Err(Error::LengthMismatch { .. })
        ));
        assert!(matches!(
            node.set_value(&key, Bytes::from_static(b"value")),
            Err(Error::LengthMismatch { .. })
        ));
    }

    #[test]
    fn bootstrap() {
        let network = MemoryNetwork::new();

        let a = network.node(id(1), Dht::builder());
        let b = network.node(id(2), Dht::builder());

        b.bootstrap(a.local_addr()).unwrap();

        assert_eq!(
            a.peer_store().peers(),
            vec![Peer::new(b.id().clone(), b.local_addr())]
        );
        assert_eq!(
            b.peer_store().peers(),
            vec![Peer::new(a.id().clone(), a.local_addr())]
        );

        // Bootstrapping to an unknown address
        assert!(matches!(
            b.bootstrap("10.0.0.2:1".parse().unwrap()),
            Err(Error::Rpc(RpcError::Unreachable))
        ));
    }

    #[test]
    fn bootstrap_through_config() {
        let network = MemoryNetwork::new();

        let a = network.node(id(1), Dht::builder());
        let b = network.node(
            id(2),
            Dht::builder().bootstrap(&[a.local_addr().to_string()]),
        );

        assert!(b
            .peer_store()
            .peers()
            .contains(&Peer::new(a.id().clone(), a.local_addr())));
    }

    #[test]
    fn lookup_discovers_peers() {
        let network = MemoryNetwork::new();

        // A chain: each node only knows the next one.
        let nodes = (1..=6u8)
            .map(|byte| network.node(id(byte << 2), Dht::builder().min_num_stores(1)))
            .collect::<Vec<_>>();

        for pair in nodes.windows(2) {
            pair[0]
                .peer_store()
                .add_peer(Peer::new(pair[1].id().clone(), pair[1].local_addr()))
                .unwrap();
        }

        let key = id(0b11111111);
        nodes[5]
            .set_value(&key, Bytes::from_static(b"value"))
            .unwrap();

        assert_eq!(
            nodes[0].get_value(&key).unwrap(),
            Bytes::from_static(b"value")
        );
        assert!(nodes[0].peer_store().peers().len() > 1);
    }
}
