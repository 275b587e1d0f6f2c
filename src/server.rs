//! Handling of incoming requests against the local peer store and storage.
//!
//! The same handlers answer remote requests received by the socket, and the
//! local "self-check" every lookup starts with.

use std::{net::SocketAddr, sync::Arc};

use tracing::debug;

use crate::common::{
    messages::{
        GetValueRequestArguments, GetValueResponseArguments, MessageType, RequestSpecific,
        RequestTypeSpecific, ResponseSpecific, StoreValueRequestArguments,
        StoreValueResponseArguments,
    },
    ErrorCode, Id, Peer, PeerStore, Storage,
};
use crate::Error;

#[derive(Debug, Clone)]
/// Answers get_value and store_value requests.
pub struct Server {
    peer_store: Arc<dyn PeerStore>,
    storage: Arc<dyn Storage>,
}

impl Server {
    pub fn new(peer_store: Arc<dyn PeerStore>, storage: Arc<dyn Storage>) -> Self {
        Server {
            peer_store,
            storage,
        }
    }

    // === Getters ===

    /// Id of the local node, sent as the responder id.
    pub fn id(&self) -> &Id {
        self.peer_store.local_id()
    }

    pub fn peer_store(&self) -> &Arc<dyn PeerStore> {
        &self.peer_store
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // === Public Methods ===

    /// Handle a request received from `from`, returning the response or error to send back.
    pub fn handle_request(&self, from: SocketAddr, request: RequestSpecific) -> MessageType {
        let requester = Some(Peer::new(request.requester_id, from));

        let result = match request.request_type {
            RequestTypeSpecific::GetValue(arguments) => self
                .handle_get_value(requester, &arguments)
                .map(ResponseSpecific::GetValue),
            RequestTypeSpecific::StoreValue(arguments) => self
                .handle_store_value(requester, arguments)
                .map(ResponseSpecific::StoreValue),
        };

        match result {
            Ok(response) => MessageType::Response(response),
            Err(code) => MessageType::Error(code.into()),
        }
    }

    /// Return the value stored for the key, or the `k` closest peers to it.
    ///
    /// `requester` is None when the local node queries itself.
    pub fn handle_get_value(
        &self,
        requester: Option<Peer>,
        request: &GetValueRequestArguments,
    ) -> Result<GetValueResponseArguments, ErrorCode> {
        self.validate(requester, &request.key)?;

        let value = self.storage.get(request.key.as_bytes()).map_err(|error| {
            debug!(?error, key = ?request.key, "Failed to read from storage");
            ErrorCode::InternalServerError
        })?;

        if value.is_some() {
            return Ok(GetValueResponseArguments {
                responder_id: self.id().clone(),
                value,
                nodes: vec![],
            });
        }

        let nodes = self
            .peer_store
            .closest_peers(&request.key, request.k)
            .map_err(|error| {
                debug!(?error, key = ?request.key, "Failed to find closest peers");
                ErrorCode::InternalServerError
            })?
            .into_iter()
            .map(|(peer, _)| peer)
            .collect();

        Ok(GetValueResponseArguments {
            responder_id: self.id().clone(),
            value: None,
            nodes,
        })
    }

    /// Store the value, overwriting any previous value for the same key.
    pub fn handle_store_value(
        &self,
        requester: Option<Peer>,
        request: StoreValueRequestArguments,
    ) -> Result<StoreValueResponseArguments, ErrorCode> {
        self.validate(requester, &request.key)?;

        let key = &request.key;
        self.storage
            .set(key.as_bytes(), request.value)
            .map_err(|error| {
                debug!(?error, key = ?key, "Failed to write to storage");
                ErrorCode::InternalServerError
            })?;

        Ok(StoreValueResponseArguments {
            responder_id: self.id().clone(),
        })
    }

    // === Private Methods ===

    /// Reject keys and requesters from an overlay with a different id length,
    /// and remember valid requesters as peers.
    fn validate(&self, requester: Option<Peer>, key: &Id) -> Result<(), ErrorCode> {
        if key.len() != self.id().len() {
            debug!(?key, "Request key length mismatch");
            return Err(ErrorCode::InvalidRequest);
        }

        if let Some(requester) = requester {
            match self.peer_store.add_peer(requester) {
                Ok(()) | Err(Error::NoSpace) => {}
                Err(Error::LengthMismatch { .. }) => return Err(ErrorCode::InvalidRequest),
                Err(error) => {
                    debug!(?error, "Failed to add requester to the peer store");
                    return Err(ErrorCode::InternalServerError);
                }
            }
        }

        Ok(())
    }
}
