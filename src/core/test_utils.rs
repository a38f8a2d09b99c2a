//! In-memory networks for driving the ring protocol by hand.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::common::{IdSpace, MessageType, RequestSpecific, ResponseSpecific};
use crate::rpc::{Config, RequestHandler, Transport};
use crate::{Error, Result};

use super::LocalNode;

#[derive(Debug, Default)]
struct Registry {
    nodes: RwLock<HashMap<SocketAddr, Weak<LocalNode>>>,
    down: RwLock<HashSet<SocketAddr>>,
}

/// Delivers calls directly to the target's request handler.
#[derive(Debug)]
struct SimulatedTransport {
    from: SocketAddr,
    registry: Arc<Registry>,
}

impl Transport for SimulatedTransport {
    fn call(&self, to: SocketAddr, request: RequestSpecific) -> Result<ResponseSpecific> {
        let unreachable = || Error::Unreachable {
            address: to,
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };

        if self.registry.down.read().unwrap().contains(&to) {
            return Err(unreachable());
        }

        let node = self
            .registry
            .nodes
            .read()
            .unwrap()
            .get(&to)
            .and_then(Weak::upgrade)
            .ok_or_else(unreachable)?;

        match node.handle_request(self.from, request) {
            MessageType::Response(response) => Ok(response),
            MessageType::Error(error) => Err(Error::Remote {
                code: error.code,
                description: error.description,
            }),
            MessageType::Request(_) => Err(Error::UnexpectedResponse),
        }
    }

    fn close_all(&self) {}
}

/// A ring of [LocalNode]s wired together in memory.
///
/// Nothing runs in the background: tests call `stabilize`, `fix_fingers` and
/// `check_predecessor` themselves, so every round is deterministic.
#[derive(Debug)]
pub(crate) struct SimulatedNetwork {
    space: IdSpace,
    registry: Arc<Registry>,
    // Keeps nodes alive for as long as the network.
    nodes: RwLock<Vec<Arc<LocalNode>>>,
}

impl SimulatedNetwork {
    pub fn new(bits: u8) -> Self {
        SimulatedNetwork {
            space: IdSpace::new(bits).unwrap(),
            registry: Arc::new(Registry::default()),
            nodes: RwLock::new(vec![]),
        }
    }

    pub fn space(&self) -> &IdSpace {
        &self.space
    }

    /// A new singleton node listening at `127.0.0.1:port`.
    pub fn node(&self, port: u16) -> Arc<LocalNode> {
        let address = SocketAddr::from(([127, 0, 0, 1], port));

        let config = Config {
            ring_bits: self.space.bits(),
            ..Default::default()
        };

        let transport = Arc::new(SimulatedTransport {
            from: address,
            registry: self.registry.clone(),
        });

        let node = Arc::new(LocalNode::new(address, &config, transport).unwrap());

        self.registry
            .nodes
            .write()
            .unwrap()
            .insert(address, Arc::downgrade(&node));
        self.nodes.write().unwrap().push(node.clone());

        node
    }

    pub fn get(&self, address: SocketAddr) -> Option<Arc<LocalNode>> {
        self.registry
            .nodes
            .read()
            .unwrap()
            .get(&address)
            .and_then(Weak::upgrade)
    }

    /// Make every call to `address` fail from now on.
    pub fn kill(&self, address: SocketAddr) {
        self.registry.down.write().unwrap().insert(address);
    }

    /// `count` nodes joined one after the other through the first, stabilized
    /// until converged, with full successor lists and finger tables.
    pub fn converged_ring(&self, count: usize) -> Vec<Arc<LocalNode>> {
        let nodes: Vec<_> = (0..count).map(|i| self.node(4000 + i as u16)).collect();

        nodes[0].create();
        for node in &nodes[1..] {
            node.join(nodes[0].node().address).unwrap();
        }

        let mut rounds = 0;
        while !Self::is_converged(&nodes) {
            assert!(rounds < 10 * count, "ring did not converge");

            for node in &nodes {
                node.stabilize();
            }
            rounds += 1;
        }

        // Let successor lists fill up.
        for _ in 0..3 {
            for node in &nodes {
                node.stabilize();
            }
        }

        for node in &nodes {
            node.fix_fingers().unwrap();
        }

        nodes
    }

    /// Successors and predecessors of `nodes` form a single cycle sorted by id.
    pub fn is_converged(nodes: &[Arc<LocalNode>]) -> bool {
        let mut ring: Vec<_> = nodes.iter().map(|n| *n.node()).collect();
        ring.sort_by_key(|n| n.id);

        let by_address: HashMap<_, _> = nodes.iter().map(|n| (n.node().address, n)).collect();

        ring.iter().enumerate().all(|(i, node)| {
            let state = by_address[&node.address].state();

            let successor = ring[(i + 1) % ring.len()];
            let predecessor = if ring.len() == 1 {
                None
            } else {
                Some(ring[(i + ring.len() - 1) % ring.len()])
            };

            state.successor() == successor && state.predecessor == predecessor
        })
    }
}

/// Answers every `find_successor` by forwarding to the other of two nodes.
#[derive(Debug)]
pub(crate) struct CyclicTransport {
    a: SocketAddr,
    b: SocketAddr,
    calls: AtomicUsize,
}

impl CyclicTransport {
    pub fn new(a: SocketAddr, b: SocketAddr) -> Self {
        CyclicTransport {
            a,
            b,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for CyclicTransport {
    fn call(&self, to: SocketAddr, request: RequestSpecific) -> Result<ResponseSpecific> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match request {
            RequestSpecific::FindSuccessor { .. } => Ok(ResponseSpecific::FindSuccessor {
                found: false,
                node: if to == self.a { self.b } else { self.a },
            }),
            RequestSpecific::Ping => Ok(ResponseSpecific::Ping),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    fn close_all(&self) {}
}
