//! Serialize and deserialize Krpc style messages.

mod internal;

use std::convert::{TryFrom, TryInto};
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

use bytes::Bytes;

use crate::common::{Id, Peer};
use crate::{Error, Result};

#[derive(Debug, PartialEq, Clone)]
pub struct Message {
    pub transaction_id: u16,

    pub message_type: MessageType,
}

#[derive(Debug, PartialEq, Clone)]
pub enum MessageType {
    Request(RequestSpecific),

    Response(ResponseSpecific),

    Error(ErrorSpecific),
}

#[derive(Debug, PartialEq, Clone)]
pub struct ErrorSpecific {
    pub code: ErrorCode,
    pub description: String,
}

/// Error codes sent in error messages, matched by value on the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Generic = 201,
    InternalServerError = 202,
    InvalidRequest = 203,
    MethodUnknown = 204,
}

impl ErrorCode {
    pub fn code(&self) -> i64 {
        *self as i64
    }
}

impl TryFrom<i64> for ErrorCode {
    type Error = Error;

    fn try_from(code: i64) -> Result<ErrorCode> {
        match code {
            201 => Ok(ErrorCode::Generic),
            202 => Ok(ErrorCode::InternalServerError),
            203 => Ok(ErrorCode::InvalidRequest),
            204 => Ok(ErrorCode::MethodUnknown),
            _ => Err(Error::InvalidMessage(format!("Unknown error code {code}"))),
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let description = match self {
            ErrorCode::Generic => "Generic Error",
            ErrorCode::InternalServerError => "Internal Server Error",
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::MethodUnknown => "Method Unknown",
        };

        write!(f, "{} {}", self.code(), description)
    }
}

impl From<ErrorCode> for ErrorSpecific {
    fn from(code: ErrorCode) -> Self {
        ErrorSpecific {
            code,
            description: code.to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct RequestSpecific {
    pub requester_id: Id,
    pub request_type: RequestTypeSpecific,
}

#[derive(Debug, PartialEq, Clone)]
pub enum RequestTypeSpecific {
    GetValue(GetValueRequestArguments),
    StoreValue(StoreValueRequestArguments),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ResponseSpecific {
    GetValue(GetValueResponseArguments),
    StoreValue(StoreValueResponseArguments),
}

// === Get Value ===

#[derive(Debug, PartialEq, Clone)]
pub struct GetValueRequestArguments {
    pub key: Id,
    /// How many closest peers to return if the value isn't found.
    pub k: usize,
}

#[derive(Debug, PartialEq, Clone)]
pub struct GetValueResponseArguments {
    pub responder_id: Id,
    pub value: Option<Bytes>,
    /// Closest peers to the key known to the responder, empty if `value` is set.
    pub nodes: Vec<Peer>,
}

// === Store Value ===

#[derive(Debug, PartialEq, Clone)]
pub struct StoreValueRequestArguments {
    pub key: Id,
    pub value: Bytes,
}

#[derive(Debug, PartialEq, Clone)]
pub struct StoreValueResponseArguments {
    pub responder_id: Id,
}

impl Message {
    fn into_serde_message(self) -> internal::DHTMessage {
        internal::DHTMessage {
            transaction_id: self.transaction_id.to_be_bytes().to_vec(),
            variant: match self.message_type {
                MessageType::Request(RequestSpecific {
                    requester_id,
                    request_type,
                }) => internal::DHTMessageVariant::Request(match request_type {
                    RequestTypeSpecific::GetValue(args) => internal::DHTRequestSpecific::GetValue {
                        arguments: internal::DHTGetValueRequestArguments {
                            id: requester_id.to_vec(),
                            key: args.key.to_vec(),
                            k: args.k as i64,
                        },
                    },
                    RequestTypeSpecific::StoreValue(args) => {
                        internal::DHTRequestSpecific::StoreValue {
                            arguments: internal::DHTStoreValueRequestArguments {
                                id: requester_id.to_vec(),
                                key: args.key.to_vec(),
                                v: args.value.to_vec(),
                            },
                        }
                    }
                }),

                MessageType::Response(res) => {
                    internal::DHTMessageVariant::Response(internal::DHTResponseSpecific {
                        arguments: match res {
                            ResponseSpecific::GetValue(args) => internal::DHTResponseArguments {
                                id: args.responder_id.to_vec(),
                                v: args.value.map(|v| v.to_vec()),
                                nodes: Some(nodes_to_serde(&args.nodes)),
                            },
                            ResponseSpecific::StoreValue(args) => internal::DHTResponseArguments {
                                id: args.responder_id.to_vec(),
                                v: None,
                                nodes: None,
                            },
                        },
                    })
                }

                MessageType::Error(err) => {
                    internal::DHTMessageVariant::Error(internal::DHTErrorSpecific {
                        error_info: (err.code.code(), err.description),
                    })
                }
            },
        }
    }

    fn from_serde_message(msg: internal::DHTMessage) -> Result<Message> {
        Ok(Message {
            transaction_id: transaction_id(msg.transaction_id)?,
            message_type: match msg.variant {
                internal::DHTMessageVariant::Request(req_variant) => {
                    MessageType::Request(match req_variant {
                        internal::DHTRequestSpecific::GetValue { arguments } => RequestSpecific {
                            requester_id: Id::from_bytes(arguments.id)?,
                            request_type: RequestTypeSpecific::GetValue(GetValueRequestArguments {
                                key: Id::from_bytes(arguments.key)?,
                                k: {
                                    let k = arguments.k;
                                    k.try_into().map_err(|_| {
                                        Error::InvalidMessage(format!("Invalid k: {}", k))
                                    })
                                }?,
                            }),
                        },
                        internal::DHTRequestSpecific::StoreValue { arguments } => {
                            RequestSpecific {
                                requester_id: Id::from_bytes(arguments.id)?,
                                request_type: RequestTypeSpecific::StoreValue(
                                    StoreValueRequestArguments {
                                        key: Id::from_bytes(arguments.key)?,
                                        value: arguments.v.into(),
                                    },
                                ),
                            }
                        }
                    })
                }

                internal::DHTMessageVariant::Response(internal::DHTResponseSpecific {
                    arguments,
                }) => {
                    let responder_id = Id::from_bytes(arguments.id)?;

                    MessageType::Response(match (arguments.v, arguments.nodes) {
                        (None, None) => {
                            ResponseSpecific::StoreValue(StoreValueResponseArguments {
                                responder_id,
                            })
                        }
                        (v, nodes) => ResponseSpecific::GetValue(GetValueResponseArguments {
                            responder_id,
                            value: v.map(Bytes::from),
                            nodes: nodes_from_serde(nodes.unwrap_or_default())?,
                        }),
                    })
                }

                internal::DHTMessageVariant::Error(err) => {
                    let (code, description) = err.error_info;

                    MessageType::Error(ErrorSpecific {
                        // Unknown codes from other implementations are treated as generic.
                        code: ErrorCode::try_from(code).unwrap_or(ErrorCode::Generic),
                        description,
                    })
                }
            },
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.clone().into_serde_message().to_bytes()?)
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Message> {
        Message::from_serde_message(internal::DHTMessage::from_bytes(bytes.as_ref())?)
    }

    /// Return the Id of the sender of the Message.
    ///
    /// This is less straightforward than it seems because not all messages are sent
    /// with an Id (error messages for example).
    pub fn get_author_id(&self) -> Option<&Id> {
        match &self.message_type {
            MessageType::Request(arguments) => Some(&arguments.requester_id),
            MessageType::Response(ResponseSpecific::GetValue(arguments)) => {
                Some(&arguments.responder_id)
            }
            MessageType::Response(ResponseSpecific::StoreValue(arguments)) => {
                Some(&arguments.responder_id)
            }
            MessageType::Error(_) => None,
        }
    }
}

fn transaction_id(bytes: Vec<u8>) -> Result<u16> {
    let bytes: [u8; 2] = bytes.as_slice().try_into().map_err(|_| {
        Error::InvalidMessage(format!("Invalid transaction id length: {}", bytes.len()))
    })?;

    Ok(u16::from_be_bytes(bytes))
}

fn nodes_to_serde(nodes: &[Peer]) -> Vec<internal::DHTNode> {
    nodes
        .iter()
        .map(|peer| internal::DHTNode {
            id: peer.id.to_vec(),
            a: peer.address.to_string(),
        })
        .collect()
}

fn nodes_from_serde(nodes: Vec<internal::DHTNode>) -> Result<Vec<Peer>> {
    nodes
        .into_iter()
        .map(|node| {
            let address: SocketAddr = node
                .a
                .parse()
                .map_err(|_| Error::InvalidMessage(format!("Invalid node address: {}", node.a)))?;

            Ok(Peer::new(Id::from_bytes(node.id)?, address))
        })
        .collect()
}
