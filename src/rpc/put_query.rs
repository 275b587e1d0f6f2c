//! Replication of a value to the storers found by an [super::IterativeQuery].

use std::sync::{Mutex, PoisonError};
use std::thread;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::common::messages::StoreValueRequestArguments;
use crate::common::{Id, Peer};
use crate::server::Server;
use crate::{Error, PeerError};

use super::{Rpc, RpcError};

#[derive(Debug)]
/// Stores a value at a list of peers with a pool of workers fed by a channel.
///
/// Replicas are independent best-effort requests, nothing is rolled back
/// when some of them fail.
pub(crate) struct PutQuery<'a> {
    key: &'a Id,
    value: Bytes,
    server: &'a Server,
    rpc: &'a dyn Rpc,

    failures: Mutex<Vec<PeerError>>,
    fatal: Mutex<Option<RpcError>>,
}

impl<'a> PutQuery<'a> {
    pub fn new(key: &'a Id, value: Bytes, server: &'a Server, rpc: &'a dyn Rpc) -> Self {
        PutQuery {
            key,
            value,
            server,
            rpc,
            failures: Mutex::new(Vec::new()),
            fatal: Mutex::new(None),
        }
    }

    /// Store the value at every peer in `storers` using `workers` workers.
    ///
    /// Returns the peers that failed to store it, or the first error that
    /// isn't a plain storing failure.
    pub fn run(self, storers: Vec<Peer>, workers: usize) -> Result<Vec<PeerError>, Error> {
        trace!(key = ?self.key, storers = storers.len(), "PutQuery start");

        let (sender, receiver) = flume::unbounded::<Peer>();

        for peer in storers {
            let _ = sender.send(peer);
        }
        drop(sender);

        thread::scope(|scope| {
            for _ in 0..workers {
                let receiver = receiver.clone();
                let this = &self;

                scope.spawn(move || {
                    while let Ok(peer) = receiver.recv() {
                        if this.aborted() {
                            return;
                        }
                        this.store(peer);
                    }
                });
            }
        });

        if let Some(error) = self
            .fatal
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            return Err(Error::Rpc(error));
        }

        let failures = self
            .failures
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        trace!(key = ?self.key, failures = failures.len(), "PutQuery done");

        Ok(failures)
    }

    // === Private Methods ===

    fn store(&self, peer: Peer) {
        match self.request(&peer) {
            Ok(()) => {
                trace!(key = ?self.key, %peer, "Stored value");
            }
            Err(error) if error.is_store_failure() => {
                debug!(key = ?self.key, %peer, ?error, "Failed to store value");

                self.failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(PeerError { peer, error });
            }
            Err(error) => {
                debug!(key = ?self.key, %peer, ?error, "Storing aborted by fatal error");

                let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
                if fatal.is_none() {
                    *fatal = Some(error);
                }
            }
        }
    }

    fn request(&self, peer: &Peer) -> Result<(), RpcError> {
        let request = StoreValueRequestArguments {
            key: self.key.clone(),
            value: self.value.clone(),
        };

        let response = if &peer.id == self.server.id() {
            self.server
                .handle_store_value(None, request)
                .map_err(RpcError::Remote)?
        } else {
            self.rpc.store_value(peer.address, request)?
        };

        if response.responder_id != peer.id {
            return Err(RpcError::InvalidResponse(format!(
                "expected responder id {}, got {}",
                peer.id, response.responder_id
            )));
        }

        Ok(())
    }

    fn aborted(&self) -> bool {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
