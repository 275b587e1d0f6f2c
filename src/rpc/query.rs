//! Iterative search of the peers closest to a key, run by a pool of workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::common::messages::{GetValueRequestArguments, GetValueResponseArguments};
use crate::common::{Id, Peer};
use crate::server::Server;
use crate::{Error, PeerError};

use super::{LookupSession, Rpc, RpcError, SearchCandidate};

#[derive(Debug)]
/// The first terminal event observed by any worker.
pub(crate) enum QueryOutcome {
    /// A peer had a value for the key.
    Value { from: Peer, value: Bytes },
    /// A failure that isn't attributable to a single misbehaving peer.
    Failed(Error),
}

#[derive(Debug)]
/// An iterative process of concurrently querying the closest unsearched candidate
/// in a [LookupSession], merging the closer peers it returns into the session and
/// the peer store, and repeating until:
///
/// - a worker finds a value or hits a fatal error (first one wins),
/// - a bounded session stops changing,
/// - or no unsearched candidate is left.
///
/// Workers only check for termination between requests, an inflight request
/// is never interrupted.
pub(crate) struct IterativeQuery<'a> {
    key: &'a Id,
    /// Closest peers to ask for in each request.
    k: usize,
    session: &'a LookupSession,
    server: &'a Server,
    rpc: &'a dyn Rpc,

    done: AtomicBool,
    outcome: Mutex<Option<QueryOutcome>>,
    errors: Mutex<Vec<PeerError>>,
}

impl<'a> IterativeQuery<'a> {
    pub fn new(
        key: &'a Id,
        k: usize,
        session: &'a LookupSession,
        server: &'a Server,
        rpc: &'a dyn Rpc,
    ) -> Self {
        IterativeQuery {
            key,
            k,
            session,
            server,
            rpc,
            done: AtomicBool::new(false),
            outcome: Mutex::new(None),
            errors: Mutex::new(Vec::new()),
        }
    }

    // === Public Methods ===

    /// Run `workers` workers until the query is done, blocking the current thread.
    pub fn run(&self, workers: usize) {
        trace!(key = ?self.key, workers, "IterativeQuery start");

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(move || self.work());
            }
        });

        trace!(
            key = ?self.key,
            errors = self.lock_errors().len(),
            "IterativeQuery done"
        );
    }

    /// Returns the published outcome, if any, and the expected errors recorded against peers.
    pub fn into_parts(self) -> (Option<QueryOutcome>, Vec<PeerError>) {
        (
            self.outcome
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
            self.errors
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    // === Private Methods ===

    fn work(&self) {
        loop {
            if self.done.load(Ordering::Acquire) {
                return;
            }

            let candidate = match self.session.next_unsearched() {
                Some(candidate) => candidate,
                // This worker's share of the search space is exhausted.
                None => return,
            };

            let response = match self.visit(&candidate) {
                Ok(response) => response,
                Err(error) if error.is_expected() => {
                    debug!(peer = %candidate.peer, ?error, "Lookup request failed");

                    self.lock_errors().push(PeerError {
                        peer: candidate.peer,
                        error,
                    });
                    continue;
                }
                Err(error) => {
                    debug!(peer = %candidate.peer, ?error, "Lookup aborted by fatal error");

                    self.publish(QueryOutcome::Failed(Error::Rpc(error)));
                    return;
                }
            };

            if let Some(value) = response.value {
                self.publish(QueryOutcome::Value {
                    from: candidate.peer,
                    value,
                });
                return;
            }

            let mut candidates = Vec::with_capacity(response.nodes.len());

            for peer in response.nodes {
                match self.server.peer_store().add_peer(peer.clone()) {
                    Ok(()) | Err(Error::NoSpace) => {}
                    Err(error) => {
                        self.publish(QueryOutcome::Failed(error));
                        return;
                    }
                }

                match self.server.peer_store().distance(&peer.id, self.key) {
                    Ok(distance) => candidates.push(SearchCandidate::new(peer, distance)),
                    Err(error) => {
                        self.publish(QueryOutcome::Failed(error));
                        return;
                    }
                }
            }

            let changed = self.session.merge(candidates);

            if self.session.is_bounded() && changed == 0 {
                trace!(key = ?self.key, "Closest peers converged");

                self.done.store(true, Ordering::Release);
                return;
            }
        }
    }

    /// Send a get_value request to the candidate, answering locally if it is this node,
    /// and validate the response.
    fn visit(&self, candidate: &SearchCandidate) -> Result<GetValueResponseArguments, RpcError> {
        let request = GetValueRequestArguments {
            key: self.key.clone(),
            k: self.k,
        };

        let response = if &candidate.peer.id == self.server.id() {
            self.server
                .handle_get_value(None, &request)
                .map_err(RpcError::Remote)?
        } else {
            self.rpc.get_value(candidate.peer.address, request)?
        };

        if response.responder_id != candidate.peer.id {
            return Err(RpcError::InvalidResponse(format!(
                "expected responder id {}, got {}",
                candidate.peer.id, response.responder_id
            )));
        }

        if let Some(peer) = response
            .nodes
            .iter()
            .find(|p| p.id.len() != self.key.len())
        {
            return Err(RpcError::InvalidResponse(format!(
                "returned peer id of length {}, expected {}",
                peer.id.len(),
                self.key.len()
            )));
        }

        Ok(response)
    }

    /// Store the outcome unless another worker already did, and stop all workers.
    fn publish(&self, outcome: QueryOutcome) {
        let mut published = self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if published.is_none() {
            trace!(key = ?self.key, ?outcome, "Lookup outcome published");
            *published = Some(outcome);
        }

        self.done.store(true, Ordering::Release);
    }

    fn lock_errors(&self) -> std::sync::MutexGuard<'_, Vec<PeerError>> {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
