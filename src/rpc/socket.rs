//! UDP socket layer managing incoming/outgoing requests and responses.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use crate::common::messages::{
    GetValueRequestArguments, GetValueResponseArguments, Message, MessageType, RequestSpecific,
    RequestTypeSpecific, ResponseSpecific, StoreValueRequestArguments,
    StoreValueResponseArguments,
};
use crate::server::Server;

use super::{Rpc, RpcError};

/// Largest UDP payload.
const MTU: usize = 65507;

/// Default request timeout before abandoning an inflight request to a non-responding peer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000); // 2 seconds
/// How long the receiving thread blocks on an empty socket before checking for shutdown.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug)]
/// A UdpSocket wrapper that formats and correlates requests and responses.
///
/// A background thread answers incoming requests through the [Server], and
/// hands responses to the caller waiting for them.
pub struct KrpcSocket {
    socket: UdpSocket,
    local_addr: SocketAddr,
    server: Server,
    request_timeout: Duration,
    next_tid: AtomicU16,
    inflight_requests: Mutex<HashMap<u16, InflightRequest>>,
    shutdown: AtomicBool,
}

#[derive(Debug)]
struct InflightRequest {
    to: SocketAddr,
    sender: flume::Sender<MessageType>,
}

impl KrpcSocket {
    /// Bind to `port` (or an ephemeral one) on all interfaces and start receiving.
    pub fn bind(
        port: Option<u16>,
        request_timeout: Duration,
        server: Server,
    ) -> Result<Arc<Self>, std::io::Error> {
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(0))))?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;

        let local_addr = socket.local_addr()?;

        let socket = Arc::new(KrpcSocket {
            socket,
            local_addr,
            server,
            request_timeout,
            next_tid: AtomicU16::new(0),
            inflight_requests: Mutex::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
        });

        let receiver = socket.clone();
        thread::Builder::new()
            .name(format!("kvdht-socket-{}", local_addr.port()))
            .spawn(move || receiver.run())?;

        Ok(socket)
    }

    // === Getters ===

    /// Returns the address the socket is listening to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    // === Public Methods ===

    /// Stop the receiving thread, inflight and future requests fail with [RpcError::Shutdown].
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Send a request and block until its response, error, or timeout.
    pub fn request(
        &self,
        to: SocketAddr,
        request_type: RequestTypeSpecific,
    ) -> Result<MessageType, RpcError> {
        if self.is_shutdown() {
            return Err(RpcError::Shutdown);
        }

        let transaction_id = self.tid();
        let (sender, receiver) = flume::bounded(1);

        self.lock_inflight()
            .insert(transaction_id, InflightRequest { to, sender });

        let message = Message {
            transaction_id,
            message_type: MessageType::Request(RequestSpecific {
                requester_id: self.server.id().clone(),
                request_type,
            }),
        };

        if let Err(error) = self.send(to, &message) {
            debug!(?error, ?to, "Error sending request message");
            self.lock_inflight().remove(&transaction_id);

            return Err(RpcError::Unreachable);
        }

        match receiver.recv_timeout(self.request_timeout) {
            Ok(message_type) => Ok(message_type),
            Err(flume::RecvTimeoutError::Timeout) => {
                self.lock_inflight().remove(&transaction_id);
                trace!(?to, transaction_id, "Request timed out");

                Err(RpcError::Unreachable)
            }
            Err(flume::RecvTimeoutError::Disconnected) => Err(RpcError::Shutdown),
        }
    }

    // === Private Methods ===

    fn run(self: Arc<Self>) {
        let mut buf = vec![0u8; MTU];

        while !self.is_shutdown() {
            match self.socket.recv_from(&mut buf) {
                Ok((amt, from)) => self.handle_packet(&buf[..amt], from),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    trace!(
                        context = "socket_error",
                        ?e,
                        "recv_from failed unexpectedly"
                    );
                }
            }
        }

        // Dropping the senders wakes up every waiting caller.
        self.lock_inflight().clear();

        debug!(local_addr = ?self.local_addr, "Socket shut down");
    }

    fn handle_packet(&self, bytes: &[u8], from: SocketAddr) {
        // A packet read just before shutdown is neither answered nor delivered.
        if self.is_shutdown() {
            trace!(?from, "Dropped packet received after shutdown");
            return;
        }

        if from.port() == 0 {
            trace!(
                context = "socket_validation",
                message = "Response from port 0"
            );
            return;
        }

        let message = match Message::from_bytes(bytes) {
            Ok(message) => message,
            Err(error) => {
                trace!(
                    context = "socket_error",
                    ?error,
                    ?from,
                    message = ?String::from_utf8_lossy(bytes),
                    "Received invalid message."
                );
                return;
            }
        };

        trace!(context = "socket_message_receiving", ?message, ?from);

        match message.message_type {
            MessageType::Request(request) => {
                let response = Message {
                    transaction_id: message.transaction_id,
                    message_type: self.server.handle_request(from, request),
                };

                if let Err(error) = self.send(from, &response) {
                    debug!(?error, ?from, "Error sending response message");
                }
            }
            message_type => {
                let inflight = self.lock_inflight().remove(&message.transaction_id);

                match inflight {
                    Some(request) if compare_socket_addr(&request.to, &from) => {
                        let _ = request.sender.send(message_type);
                    }
                    Some(request) => {
                        trace!(
                            context = "socket_validation",
                            message = "Response from wrong address"
                        );
                        // Keep waiting for the right peer.
                        self.lock_inflight()
                            .insert(message.transaction_id, request);
                    }
                    None => {
                        trace!(
                            context = "socket_validation",
                            message = "Unexpected response id"
                        );
                    }
                }
            }
        }
    }

    /// Increments next_tid and returns the previous value.
    fn tid(&self) -> u16 {
        // Wrapping around is fine, a transaction id is only alive for the
        // request timeout.
        self.next_tid.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a raw message
    fn send(&self, address: SocketAddr, message: &Message) -> crate::Result<()> {
        self.socket.send_to(&message.to_bytes()?, address)?;
        trace!(context = "socket_message_sending", ?message, ?address);
        Ok(())
    }

    fn lock_inflight(&self) -> std::sync::MutexGuard<'_, HashMap<u16, InflightRequest>> {
        self.inflight_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Rpc for KrpcSocket {
    fn get_value(
        &self,
        to: SocketAddr,
        request: GetValueRequestArguments,
    ) -> Result<GetValueResponseArguments, RpcError> {
        match self.request(to, RequestTypeSpecific::GetValue(request))? {
            MessageType::Response(ResponseSpecific::GetValue(response)) => Ok(response),
            MessageType::Error(error) => Err(RpcError::Remote(error.code)),
            other => Err(RpcError::InvalidResponse(format!(
                "unexpected response to get_value: {other:?}"
            ))),
        }
    }

    fn store_value(
        &self,
        to: SocketAddr,
        request: StoreValueRequestArguments,
    ) -> Result<StoreValueResponseArguments, RpcError> {
        match self.request(to, RequestTypeSpecific::StoreValue(request))? {
            MessageType::Response(ResponseSpecific::StoreValue(response)) => Ok(response),
            MessageType::Error(error) => Err(RpcError::Remote(error.code)),
            other => Err(RpcError::InvalidResponse(format!(
                "unexpected response to store_value: {other:?}"
            ))),
        }
    }
}

// Same as SocketAddr::eq but ignores the ip if it is unspecified for testing reasons.
fn compare_socket_addr(a: &SocketAddr, b: &SocketAddr) -> bool {
    if a.port() != b.port() {
        return false;
    }

    if a.ip().is_unspecified() {
        return true;
    }

    a.ip() == b.ip()
}
