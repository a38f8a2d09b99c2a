//! Chord ring protocol: routing, membership and periodic maintenance of a
//! single node.

mod handle_request;
mod info;
mod maintenance;
mod membership;
mod router;
pub(crate) mod scheduler;
mod state;
mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::common::{IdSpace, MessageType, Node, RequestSpecific, ResponseSpecific};
use crate::rpc::{Config, RequestHandler, Transport};
use crate::{Error, Result};

use state::NodeState;

pub use info::Info;
pub use router::NextHop;

#[derive(Debug)]
/// A node's view of the ring, and the operations that keep it converging.
///
/// Shared between the inbound server and the periodic tasks. The state lock is
/// only taken for in-memory reads and updates; calls to other nodes always
/// happen with it released.
pub struct LocalNode {
    node: Node,
    space: IdSpace,
    max_hops: usize,
    label: Option<String>,
    state: Mutex<NodeState>,
    transport: Arc<dyn Transport>,
}

impl LocalNode {
    /// Create a node listening at `address`, initially a singleton ring.
    pub fn new(address: SocketAddr, config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let space = IdSpace::new(config.ring_bits)?;
        let node = Node::new(address, &space);

        Ok(LocalNode {
            node,
            space,
            max_hops: config.max_hops,
            label: config.label.clone(),
            state: Mutex::new(NodeState::new(node, config.successors)),
            transport,
        })
    }

    // === Getters ===

    /// This node's descriptor.
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn space(&self) -> &IdSpace {
        &self.space
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Lock the ring state.
    ///
    /// A panic while holding the lock never leaves the state half updated, so
    /// a poisoned lock is recovered rather than propagated.
    pub(crate) fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Call `to`, answering in-process when it is this node.
    pub(crate) fn call(&self, to: SocketAddr, request: RequestSpecific) -> Result<ResponseSpecific> {
        if to != self.node.address {
            return self.transport.call(to, request);
        }

        match self.handle_request(self.node.address, request) {
            MessageType::Response(response) => Ok(response),
            MessageType::Error(error) => Err(Error::Remote {
                code: error.code,
                description: error.description,
            }),
            MessageType::Request(_) => Err(Error::UnexpectedResponse),
        }
    }
}
