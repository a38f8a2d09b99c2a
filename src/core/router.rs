//! Resolve identifiers to the node that owns them.

use std::net::SocketAddr;

use tracing::debug;

use crate::common::{Id, Node, RequestSpecific, ResponseSpecific};
use crate::{Error, Result};

use super::LocalNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Outcome of one local routing step.
pub enum NextHop {
    /// This node owns the target.
    Owner(Node),
    /// Ask this node next.
    Forward(Node),
}

impl LocalNode {
    /// One step of owner resolution using local state only.
    ///
    /// If `target` lies in `(self, successor]` the successor owns it, otherwise
    /// forward to the closest preceding finger, or to the successor when no
    /// finger precedes the target.
    pub fn find_successor_step(&self, target: Id) -> NextHop {
        let state = self.state();
        let successor = state.successor();

        if target.in_interval(self.node.id, successor.id, true) {
            return NextHop::Owner(successor);
        }

        NextHop::Forward(
            state
                .finger_table
                .closest_preceding(self.node.id, target)
                .copied()
                .unwrap_or(successor),
        )
    }

    /// Resolve the owner of `target`, starting from this node.
    pub fn find_successor(&self, target: Id) -> Result<Node> {
        self.resolve_from(self.node.address, target)
    }

    /// Resolve the owner of `target`, starting from the node at `start`.
    ///
    /// Each step asks the current candidate, which either names the owner or
    /// the next candidate. A candidate that does not answer is routed around
    /// through the successor list of the node that pointed at it. Gives up
    /// with [Error::RoutingFailure] after `max_hops` steps, so stale or cyclic
    /// routing data can never make it loop forever.
    pub fn resolve_from(&self, start: SocketAddr, target: Id) -> Result<Node> {
        let mut candidate = start;
        // Last node that answered, and every node that failed to, during this
        // lookup.
        let mut previous: Option<SocketAddr> = None;
        let mut failed: Vec<SocketAddr> = vec![];

        for hop in 0..self.max_hops {
            let (found, node) = match self.call(candidate, RequestSpecific::FindSuccessor { target }) {
                Ok(ResponseSpecific::FindSuccessor { found, node }) => (found, node),
                Ok(_) => return Err(Error::UnexpectedResponse),
                Err(error) if error.is_unreachable() => {
                    if self.state().forget_finger(&candidate) {
                        debug!(?candidate, "Cleared finger table after an unreachable finger");
                    }
                    failed.push(candidate);

                    let next = match previous {
                        Some(previous) => self.route_around(previous, target, &failed)?,
                        None => None,
                    };

                    match next {
                        Some(NextHop::Owner(owner)) => return Ok(owner),
                        Some(NextHop::Forward(next)) => {
                            candidate = next.address;
                            continue;
                        }
                        None => return Err(error),
                    }
                }
                Err(error) => return Err(error),
            };

            if failed.contains(&node) {
                // Pointed back at a node that already failed, try its
                // successors instead.
                match self.route_around(candidate, target, &failed)? {
                    Some(NextHop::Owner(owner)) => return Ok(owner),
                    Some(NextHop::Forward(next)) => {
                        previous = Some(candidate);
                        candidate = next.address;
                        continue;
                    }
                    None => {
                        return Err(Error::RoutingFailure {
                            target,
                            hops: hop + 1,
                        })
                    }
                }
            }

            if found {
                let owner = Node::new(node, &self.space);
                debug!(?target, owner = ?owner.address, hops = hop + 1, "Resolved owner");

                return Ok(owner);
            }

            debug!(?target, from = ?candidate, to = ?node, hop, "Forwarded lookup");

            previous = Some(candidate);
            candidate = node;
        }

        Err(Error::RoutingFailure {
            target,
            hops: self.max_hops,
        })
    }

    /// Next step from `from` using only its successor list, skipping `failed`.
    ///
    /// The first live successor `s` with `target` in `(from, s]` owns it,
    /// otherwise forward to the furthest live successor. `None` if no live
    /// successor is left.
    fn route_around(
        &self,
        from: SocketAddr,
        target: Id,
        failed: &[SocketAddr],
    ) -> Result<Option<NextHop>> {
        let successors = match self.call(from, RequestSpecific::GetSuccessors)? {
            ResponseSpecific::GetSuccessors { successors } => successors,
            _ => return Err(Error::UnexpectedResponse),
        };

        let from_id = self.space.hash_address(&from);
        let alive: Vec<Node> = successors
            .into_iter()
            .filter(|address| !failed.contains(address))
            .map(|address| Node::new(address, &self.space))
            .collect();

        let next = match alive
            .iter()
            .find(|successor| target.in_interval(from_id, successor.id, true))
        {
            Some(owner) => Some(NextHop::Owner(*owner)),
            None => alive.last().map(|successor| NextHop::Forward(*successor)),
        };

        debug!(?target, ?from, ?failed, ?next, "Routed around unreachable nodes");

        Ok(next)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::core::test_utils::{CyclicTransport, SimulatedNetwork};
    use crate::rpc::Config;

    use super::*;

    #[test]
    fn singleton_owns_every_target() {
        let network = SimulatedNetwork::new(16);
        let node = network.node(1);
        node.create();

        for target in [0, 1, node.node().id.0, u16::MAX as u64] {
            assert_eq!(node.find_successor(Id(target)).unwrap(), *node.node());
        }
    }

    #[test]
    fn owner_is_successor_of_target() {
        let network = SimulatedNetwork::new(16);
        let nodes = network.converged_ring(12);

        let mut ring: Vec<Node> = nodes.iter().map(|n| *n.node()).collect();
        ring.sort_by_key(|n| n.id);

        for i in 0..500u64 {
            let target = network.space().reduce(i.wrapping_mul(0x9e37_79b9_7f4a_7c15));
            let from = &nodes[i as usize % nodes.len()];

            let owner = from.find_successor(target).unwrap();

            // The owner is the first node clockwise from the target.
            let expected = ring
                .iter()
                .find(|n| n.id >= target)
                .copied()
                .unwrap_or(ring[0]);
            assert_eq!(owner, expected, "{target:?}");

            let index = ring.iter().position(|n| n == &owner).unwrap();
            let predecessor = ring[(index + ring.len() - 1) % ring.len()];
            assert!(target.in_interval(predecessor.id, owner.id, true));
        }
    }

    #[test]
    fn empty_finger_table_still_resolves() {
        let network = SimulatedNetwork::new(16);
        let nodes = network.converged_ring(8);

        for node in &nodes {
            node.state().finger_table.clear();
        }

        let mut ring: Vec<Node> = nodes.iter().map(|n| *n.node()).collect();
        ring.sort_by_key(|n| n.id);

        for node in &ring {
            let owner = nodes[0].find_successor(node.id).unwrap();
            assert_eq!(owner, *node);
        }
    }

    #[test]
    fn forwarding_cycle_is_bounded() {
        let a: SocketAddr = "127.0.0.1:7001".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:7002".parse().unwrap();

        let config = Config {
            max_hops: 16,
            ..Default::default()
        };

        let transport = Arc::new(CyclicTransport::new(a, b));
        let node = LocalNode::new("127.0.0.1:7000".parse().unwrap(), &config, transport.clone())
            .unwrap();
        let space = *node.space();
        node.state().successors.reset(Node::new(a, &space));

        // Anything outside (self, a] has to be forwarded.
        let target = (0..)
            .map(|i| space.hash_key(&format!("target-{i}")))
            .find(|id| !id.in_interval(node.node().id, Node::new(a, &space).id, true))
            .unwrap();

        let result = node.find_successor(target);

        assert!(matches!(
            result,
            Err(Error::RoutingFailure { hops: 16, .. })
        ));
        // The first hop is answered locally.
        assert_eq!(transport.calls(), 15);
    }

    #[test]
    fn dead_successor_is_routed_around() {
        let network = SimulatedNetwork::new(16);
        let nodes = network.converged_ring(4);

        let mut ring: Vec<Node> = nodes.iter().map(|n| *n.node()).collect();
        ring.sort_by_key(|n| n.id);

        // Kill the successor of ring[0], then ask ring[0] for a target right
        // after it. The dead node is also its first finger.
        let dead = ring[1];
        network.kill(dead.address);

        let asker = network.get(ring[0].address).unwrap();
        let owner = asker
            .find_successor(network.space().reduce(dead.id.0 + 1))
            .unwrap();

        assert_eq!(owner, ring[2]);
        // The dead finger is gone with the whole table.
        assert!(asker.state().finger_table.to_vec().is_empty());
    }

    #[test]
    fn dead_far_finger_is_routed_around() {
        let network = SimulatedNetwork::new(16);
        let nodes = network.converged_ring(12);

        let mut ring: Vec<Node> = nodes.iter().map(|n| *n.node()).collect();
        ring.sort_by_key(|n| n.id);

        let asker = network.get(ring[0].address).unwrap();
        let successors = asker.state().successors.to_vec();
        let fingers = asker.state().finger_table.to_vec();

        let dead = *fingers
            .iter()
            .rev()
            .find(|finger| **finger != *asker.node() && !successors.contains(*finger))
            .unwrap();
        network.kill(dead.address);

        let alive: Vec<Node> = ring.iter().filter(|n| **n != dead).copied().collect();
        let target = network.space().reduce(dead.id.0 + 1);
        let expected = alive
            .iter()
            .find(|n| n.id >= target)
            .copied()
            .unwrap_or(alive[0]);

        for node in &alive {
            let local = network.get(node.address).unwrap();

            assert_eq!(local.find_successor(target).unwrap(), expected, "from {node}");
        }
    }

    #[test]
    fn every_candidate_unreachable() {
        let network = SimulatedNetwork::new(16);
        let node = network.node(1);
        node.create();

        // Our only successor never answers.
        let dead = Node::new("127.0.0.1:9999".parse().unwrap(), network.space());
        node.state().successors.reset(dead);

        let target = (0..)
            .map(|i| network.space().hash_key(&format!("target-{i}")))
            .find(|id| !id.in_interval(node.node().id, dead.id, true))
            .unwrap();

        let result = node.find_successor(target);

        assert!(result.unwrap_err().is_unreachable());
    }
}
