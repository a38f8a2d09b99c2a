use std::net::SocketAddr;

use tracing::trace;

use crate::common::{MessageType, Node, RequestSpecific, ResponseSpecific};
use crate::rpc::RequestHandler;

use super::{LocalNode, NextHop};

impl RequestHandler for LocalNode {
    fn handle_request(&self, from: SocketAddr, request: RequestSpecific) -> MessageType {
        trace!(context = "handle_request", ?from, method = request.method());

        let response = match request {
            RequestSpecific::Ping => ResponseSpecific::Ping,
            RequestSpecific::FindSuccessor { target } => match self.find_successor_step(target) {
                NextHop::Owner(node) => ResponseSpecific::FindSuccessor {
                    found: true,
                    node: node.address,
                },
                NextHop::Forward(node) => ResponseSpecific::FindSuccessor {
                    found: false,
                    node: node.address,
                },
            },
            RequestSpecific::GetPredecessor => ResponseSpecific::GetPredecessor {
                predecessor: self.state().predecessor.map(|node| node.address),
            },
            RequestSpecific::GetSuccessors => ResponseSpecific::GetSuccessors {
                successors: self.state().successors.iter().map(|n| n.address).collect(),
            },
            RequestSpecific::Notify { candidate } => ResponseSpecific::Notify {
                accepted: self.notify(Node::new(candidate, &self.space)),
            },
            RequestSpecific::Store { key, value } => match self.store_local(key, value) {
                Ok(()) => ResponseSpecific::Store,
                Err(error) => return MessageType::Error(error),
            },
            RequestSpecific::Fetch { key } => ResponseSpecific::Fetch {
                value: self.fetch_local(&key),
            },
        };

        MessageType::Response(response)
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use crate::common::{ErrorSpecific, Id, ERROR_PROTOCOL};
    use crate::core::test_utils::SimulatedNetwork;

    use super::*;

    #[test]
    fn singleton_answers() {
        let network = SimulatedNetwork::new(16);
        let node = network.node(1);
        node.create();

        let from: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let own = node.node().address;

        assert_eq!(
            node.handle_request(from, RequestSpecific::Ping),
            MessageType::Response(ResponseSpecific::Ping)
        );
        assert_eq!(
            node.handle_request(from, RequestSpecific::FindSuccessor { target: Id(42) }),
            MessageType::Response(ResponseSpecific::FindSuccessor {
                found: true,
                node: own
            })
        );
        assert_eq!(
            node.handle_request(from, RequestSpecific::GetPredecessor),
            MessageType::Response(ResponseSpecific::GetPredecessor { predecessor: None })
        );
        assert_eq!(
            node.handle_request(from, RequestSpecific::GetSuccessors),
            MessageType::Response(ResponseSpecific::GetSuccessors {
                successors: vec![own]
            })
        );
        assert_eq!(
            node.handle_request(from, RequestSpecific::Notify { candidate: own }),
            MessageType::Response(ResponseSpecific::Notify { accepted: false })
        );
    }

    #[test]
    fn notify_then_get_predecessor() {
        let network = SimulatedNetwork::new(16);
        let node = network.node(1);
        node.create();

        let candidate: SocketAddr = "127.0.0.1:2".parse().unwrap();

        assert_eq!(
            node.handle_request(candidate, RequestSpecific::Notify { candidate }),
            MessageType::Response(ResponseSpecific::Notify { accepted: true })
        );
        assert_eq!(
            node.handle_request(candidate, RequestSpecific::GetPredecessor),
            MessageType::Response(ResponseSpecific::GetPredecessor {
                predecessor: Some(candidate)
            })
        );
    }

    #[test]
    fn store_and_fetch() {
        let network = SimulatedNetwork::new(16);
        let node = network.node(1);
        node.create();

        let from: SocketAddr = "127.0.0.1:9".parse().unwrap();

        assert_eq!(
            node.handle_request(
                from,
                RequestSpecific::Store {
                    key: "a".into(),
                    value: Bytes::from_static(b"1")
                }
            ),
            MessageType::Response(ResponseSpecific::Store)
        );
        assert_eq!(
            node.handle_request(from, RequestSpecific::Fetch { key: "a".into() }),
            MessageType::Response(ResponseSpecific::Fetch {
                value: Some(Bytes::from_static(b"1"))
            })
        );
        assert_eq!(
            node.handle_request(from, RequestSpecific::Fetch { key: "b".into() }),
            MessageType::Response(ResponseSpecific::Fetch { value: None })
        );
    }

    #[test]
    fn store_outside_interval_is_an_error() {
        let network = SimulatedNetwork::new(16);
        let node = network.node(1);
        node.create();

        let own = node.node().id;
        node.state().predecessor = Some(Node {
            id: node.space().reduce(own.0.wrapping_sub(1)),
            address: "127.0.0.1:2".parse().unwrap(),
        });

        let key = (0..)
            .map(|i| format!("key-{i}"))
            .find(|key| node.space().hash_key(key) != own)
            .unwrap();

        assert!(matches!(
            node.handle_request(
                "127.0.0.1:9".parse().unwrap(),
                RequestSpecific::Store {
                    key,
                    value: Bytes::new()
                }
            ),
            MessageType::Error(ErrorSpecific {
                code: ERROR_PROTOCOL,
                ..
            })
        ));
    }
}
