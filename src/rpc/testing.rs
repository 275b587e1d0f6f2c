//! In-memory network of nodes with fault injection, to test lookups without sockets.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::common::messages::{
    GetValueRequestArguments, GetValueResponseArguments, StoreValueRequestArguments,
    StoreValueResponseArguments,
};
use crate::common::{Id, Peer};
use crate::server::Server;
use crate::{Dht, DhtBuilder};

use super::{Rpc, RpcError};

#[derive(Debug, Clone)]
pub(crate) enum Fault {
    /// Every request to the node fails with this error.
    All(RpcError),
    /// Only store_value requests fail with this error.
    Stores(RpcError),
    /// The node responds with someone else's id.
    WrongResponder,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryNetwork {
    servers: RwLock<HashMap<SocketAddr, Server>>,
    faults: RwLock<HashMap<SocketAddr, Fault>>,
    next_port: AtomicU16,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Build a node with this id on the network.
    pub fn node(self: &Arc<Self>, id: Id, builder: DhtBuilder) -> Dht {
        let port = self.next_port.fetch_add(1, Ordering::Relaxed) + 1;
        let address = SocketAddr::from(([10, 0, 0, 1], port));

        let rpc = MemoryRpc {
            network: self.clone(),
            local: Peer::new(id.clone(), address),
        };

        let dht = builder
            .id(id)
            .build_with_rpc(address, Arc::new(rpc))
            .unwrap();

        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address, dht.server().clone());

        dht
    }

    /// Add every node to every other node's peer store.
    pub fn connect_all(nodes: &[Dht]) {
        for a in nodes {
            for b in nodes {
                let _ = a
                    .peer_store()
                    .add_peer(Peer::new(b.id().clone(), b.local_addr()));
            }
        }
    }

    pub fn fail(&self, address: SocketAddr, fault: Fault) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address, fault);
    }

    fn route(&self, to: SocketAddr, store: bool) -> Result<(Server, Option<Fault>), RpcError> {
        let fault = self
            .faults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&to)
            .cloned();

        match &fault {
            Some(Fault::All(error)) => return Err(error.clone()),
            Some(Fault::Stores(error)) if store => return Err(error.clone()),
            _ => {}
        }

        let server = self
            .servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&to)
            .cloned()
            .ok_or(RpcError::Unreachable)?;

        Ok((server, fault))
    }
}

#[derive(Debug)]
pub(crate) struct MemoryRpc {
    network: Arc<MemoryNetwork>,
    local: Peer,
}

impl Rpc for MemoryRpc {
    fn get_value(
        &self,
        to: SocketAddr,
        request: GetValueRequestArguments,
    ) -> Result<GetValueResponseArguments, RpcError> {
        let (server, fault) = self.network.route(to, false)?;

        let mut response = server
            .handle_get_value(Some(self.local.clone()), &request)
            .map_err(RpcError::Remote)?;

        if let Some(Fault::WrongResponder) = fault {
            response.responder_id = Id::random();
        }

        Ok(response)
    }

    fn store_value(
        &self,
        to: SocketAddr,
        request: StoreValueRequestArguments,
    ) -> Result<StoreValueResponseArguments, RpcError> {
        let (server, fault) = self.network.route(to, true)?;

        let mut response = server
            .handle_store_value(Some(self.local.clone()), request)
            .map_err(RpcError::Remote)?;

        if let Some(Fault::WrongResponder) = fault {
            response.responder_id = Id::random();
        }

        Ok(response)
    }
}
