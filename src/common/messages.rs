//! Serialize and deserialize ring protocol messages.

mod internal;

use std::net::SocketAddr;

use bytes::Bytes;

use crate::common::Id;
use crate::{Error, Result};

/// Version advertised in every outgoing message.
pub const VERSION: [u8; 4] = [b'C', b'H', 0, 1];

/// Generic error.
pub const ERROR_GENERIC: i32 = 201;
/// Protocol error, for example a `store` sent to a node that does not own the key.
pub const ERROR_PROTOCOL: i32 = 203;
/// Method unknown.
pub const ERROR_METHOD_UNKNOWN: i32 = 204;

#[derive(Debug, PartialEq, Clone)]
pub struct Message {
    pub transaction_id: u32,

    /// The version of the requester or responder.
    pub version: Option<[u8; 4]>,

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
    pub code: i32,
    pub description: String,
}

#[derive(Debug, PartialEq, Clone)]
/// Remote operations a node serves.
pub enum RequestSpecific {
    /// Liveness check.
    Ping,
    /// One step of owner resolution for `target`.
    FindSuccessor { target: Id },
    GetPredecessor,
    GetSuccessors,
    /// `candidate` proposes itself as the receiver's predecessor.
    Notify { candidate: SocketAddr },
    Store { key: String, value: Bytes },
    Fetch { key: String },
}

#[derive(Debug, PartialEq, Clone)]
pub enum ResponseSpecific {
    Ping,
    /// `found` means `node` owns the target, otherwise ask `node` next.
    FindSuccessor { found: bool, node: SocketAddr },
    GetPredecessor { predecessor: Option<SocketAddr> },
    GetSuccessors { successors: Vec<SocketAddr> },
    Notify { accepted: bool },
    Store,
    Fetch { value: Option<Bytes> },
}

impl RequestSpecific {
    /// Method name, as sent on the wire.
    pub fn method(&self) -> &'static str {
        match self {
            RequestSpecific::Ping => "ping",
            RequestSpecific::FindSuccessor { .. } => "find_successor",
            RequestSpecific::GetPredecessor => "get_predecessor",
            RequestSpecific::GetSuccessors => "get_successors",
            RequestSpecific::Notify { .. } => "notify",
            RequestSpecific::Store { .. } => "store",
            RequestSpecific::Fetch { .. } => "fetch",
        }
    }
}

impl ResponseSpecific {
    /// Method name, as sent on the wire.
    pub fn method(&self) -> &'static str {
        match self {
            ResponseSpecific::Ping => "ping",
            ResponseSpecific::FindSuccessor { .. } => "find_successor",
            ResponseSpecific::GetPredecessor { .. } => "get_predecessor",
            ResponseSpecific::GetSuccessors { .. } => "get_successors",
            ResponseSpecific::Notify { .. } => "notify",
            ResponseSpecific::Store => "store",
            ResponseSpecific::Fetch { .. } => "fetch",
        }
    }
}

impl Message {
    fn into_serde_message(self) -> internal::DHTMessage {
        internal::DHTMessage {
            transaction_id: self.transaction_id.to_be_bytes(),
            version: self.version,
            variant: match self.message_type {
                MessageType::Request(request) => {
                    internal::DHTMessageVariant::Request(match request {
                        RequestSpecific::Ping => internal::DHTRequestSpecific::Ping {
                            arguments: internal::DHTNoArguments {},
                        },
                        RequestSpecific::FindSuccessor { target } => {
                            internal::DHTRequestSpecific::FindSuccessor {
                                arguments: internal::DHTFindSuccessorRequestArguments {
                                    target: target.to_bytes(),
                                },
                            }
                        }
                        RequestSpecific::GetPredecessor => {
                            internal::DHTRequestSpecific::GetPredecessor {
                                arguments: internal::DHTNoArguments {},
                            }
                        }
                        RequestSpecific::GetSuccessors => {
                            internal::DHTRequestSpecific::GetSuccessors {
                                arguments: internal::DHTNoArguments {},
                            }
                        }
                        RequestSpecific::Notify { candidate } => {
                            internal::DHTRequestSpecific::Notify {
                                arguments: internal::DHTNotifyRequestArguments {
                                    node: candidate.to_string(),
                                },
                            }
                        }
                        RequestSpecific::Store { key, value } => {
                            internal::DHTRequestSpecific::Store {
                                arguments: internal::DHTStoreRequestArguments {
                                    key,
                                    v: value.to_vec().into_boxed_slice(),
                                },
                            }
                        }
                        RequestSpecific::Fetch { key } => internal::DHTRequestSpecific::Fetch {
                            arguments: internal::DHTFetchRequestArguments { key },
                        },
                    })
                }

                MessageType::Response(response) => {
                    internal::DHTMessageVariant::Response(match response {
                        ResponseSpecific::Ping => internal::DHTResponseSpecific::Ping {
                            arguments: internal::DHTNoArguments {},
                        },
                        ResponseSpecific::FindSuccessor { found, node } => {
                            internal::DHTResponseSpecific::FindSuccessor {
                                arguments: internal::DHTFindSuccessorResponseArguments {
                                    found: if found { 1 } else { 0 },
                                    node: node.to_string(),
                                },
                            }
                        }
                        ResponseSpecific::GetPredecessor { predecessor } => {
                            internal::DHTResponseSpecific::GetPredecessor {
                                arguments: internal::DHTGetPredecessorResponseArguments {
                                    node: predecessor.map(|address| address.to_string()),
                                },
                            }
                        }
                        ResponseSpecific::GetSuccessors { successors } => {
                            internal::DHTResponseSpecific::GetSuccessors {
                                arguments: internal::DHTGetSuccessorsResponseArguments {
                                    nodes: successors.iter().map(|a| a.to_string()).collect(),
                                },
                            }
                        }
                        ResponseSpecific::Notify { accepted } => {
                            internal::DHTResponseSpecific::Notify {
                                arguments: internal::DHTNotifyResponseArguments {
                                    accepted: if accepted { 1 } else { 0 },
                                },
                            }
                        }
                        ResponseSpecific::Store => internal::DHTResponseSpecific::Store {
                            arguments: internal::DHTNoArguments {},
                        },
                        ResponseSpecific::Fetch { value } => {
                            internal::DHTResponseSpecific::Fetch {
                                arguments: internal::DHTFetchResponseArguments {
                                    v: value.map(|v| v.to_vec().into_boxed_slice()),
                                },
                            }
                        }
                    })
                }

                MessageType::Error(err) => {
                    internal::DHTMessageVariant::Error(internal::DHTErrorSpecific {
                        error_info: (err.code, err.description),
                    })
                }
            },
        }
    }

    fn from_serde_message(msg: internal::DHTMessage) -> Result<Message> {
        Ok(Message {
            transaction_id: u32::from_be_bytes(msg.transaction_id),
            version: msg.version,
            message_type: match msg.variant {
                internal::DHTMessageVariant::Request(request) => {
                    MessageType::Request(match request {
                        internal::DHTRequestSpecific::Ping { .. } => RequestSpecific::Ping,
                        internal::DHTRequestSpecific::FindSuccessor { arguments } => {
                            RequestSpecific::FindSuccessor {
                                target: Id::from_bytes(arguments.target),
                            }
                        }
                        internal::DHTRequestSpecific::GetPredecessor { .. } => {
                            RequestSpecific::GetPredecessor
                        }
                        internal::DHTRequestSpecific::GetSuccessors { .. } => {
                            RequestSpecific::GetSuccessors
                        }
                        internal::DHTRequestSpecific::Notify { arguments } => {
                            RequestSpecific::Notify {
                                candidate: parse_address(&arguments.node)?,
                            }
                        }
                        internal::DHTRequestSpecific::Store { arguments } => {
                            RequestSpecific::Store {
                                key: arguments.key,
                                value: Bytes::from(arguments.v.into_vec()),
                            }
                        }
                        internal::DHTRequestSpecific::Fetch { arguments } => {
                            RequestSpecific::Fetch { key: arguments.key }
                        }
                    })
                }

                internal::DHTMessageVariant::Response(response) => {
                    MessageType::Response(match response {
                        internal::DHTResponseSpecific::Ping { .. } => ResponseSpecific::Ping,
                        internal::DHTResponseSpecific::FindSuccessor { arguments } => {
                            ResponseSpecific::FindSuccessor {
                                found: arguments.found > 0,
                                node: parse_address(&arguments.node)?,
                            }
                        }
                        internal::DHTResponseSpecific::GetPredecessor { arguments } => {
                            ResponseSpecific::GetPredecessor {
                                predecessor: match arguments.node {
                                    Some(node) => Some(parse_address(&node)?),
                                    None => None,
                                },
                            }
                        }
                        internal::DHTResponseSpecific::GetSuccessors { arguments } => {
                            ResponseSpecific::GetSuccessors {
                                successors: arguments
                                    .nodes
                                    .iter()
                                    .map(|node| parse_address(node))
                                    .collect::<Result<Vec<_>>>()?,
                            }
                        }
                        internal::DHTResponseSpecific::Notify { arguments } => {
                            ResponseSpecific::Notify {
                                accepted: arguments.accepted > 0,
                            }
                        }
                        internal::DHTResponseSpecific::Store { .. } => ResponseSpecific::Store,
                        internal::DHTResponseSpecific::Fetch { arguments } => {
                            ResponseSpecific::Fetch {
                                value: arguments.v.map(|v| Bytes::from(v.into_vec())),
                            }
                        }
                    })
                }

                internal::DHTMessageVariant::Error(err) => MessageType::Error(ErrorSpecific {
                    code: err.error_info.0,
                    description: err.error_info.1,
                }),
            },
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.clone().into_serde_message().to_bytes()?)
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Message> {
        Message::from_serde_message(internal::DHTMessage::from_bytes(bytes.as_ref())?)
    }

    /// Build the error reply for a request that failed [Message::from_bytes].
    ///
    /// Returns `None` if even the transaction id can not be read, or if the
    /// message is not a request.
    pub fn error_for_malformed<T: AsRef<[u8]>>(bytes: T) -> Option<Message> {
        let header = internal::DHTMessageHeader::from_bytes(bytes.as_ref()).ok()?;

        if header.kind != "q" {
            return None;
        }

        let error = match header.method.as_deref() {
            Some(method) if METHODS.contains(&method) => ErrorSpecific {
                code: ERROR_PROTOCOL,
                description: "Protocol Error".to_string(),
            },
            _ => ErrorSpecific {
                code: ERROR_METHOD_UNKNOWN,
                description: "Method Unknown".to_string(),
            },
        };

        Some(Message {
            transaction_id: u32::from_be_bytes(header.transaction_id),
            version: Some(VERSION),
            message_type: MessageType::Error(error),
        })
    }
}

/// Every method a node answers to.
pub const METHODS: [&str; 7] = [
    "ping",
    "find_successor",
    "get_predecessor",
    "get_successors",
    "notify",
    "store",
    "fetch",
];

fn parse_address(address: &str) -> Result<SocketAddr> {
    address
        .parse()
        .map_err(|_| Error::InvalidAddress(address.to_string()))
}
