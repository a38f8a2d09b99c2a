//! Periodic finger table rebuilds and predecessor liveness checks.

use tracing::debug;

use crate::common::{Id, Node, RequestSpecific};
use crate::Result;

use super::LocalNode;

impl LocalNode {
    /// Rebuild the whole finger table.
    ///
    /// Slot `i` gets the owner of `(self + 2^(i-1)) mod 2^m`. A slot whose
    /// start falls in `(previous start, previous owner]` is owned by the
    /// previous owner too, so it is not resolved again. If any slot fails to
    /// resolve, the round is aborted and the previous table is kept.
    pub fn fix_fingers(&self) -> Result<()> {
        let bits = self.space.bits();
        let mut fingers: Vec<Node> = Vec::with_capacity(bits as usize);
        let mut previous: Option<(Id, Node)> = None;

        for slot in 1..=bits {
            let start = self.space.finger_start(self.node.id, slot);

            let owner = match previous {
                Some((previous_start, previous_owner))
                    if previous_owner.id != previous_start
                        && start.in_interval(previous_start, previous_owner.id, true) =>
                {
                    previous_owner
                }
                _ => match self.find_successor(start) {
                    Ok(owner) => owner,
                    Err(error) => {
                        debug!(slot, ?start, ?error, "Aborted finger table round");
                        return Err(error);
                    }
                },
            };

            fingers.push(owner);
            previous = Some((start, owner));
        }

        self.state().finger_table.replace(fingers);

        Ok(())
    }

    /// Ping our predecessor, forget it if it does not answer.
    ///
    /// Returns `true` if the predecessor was cleared.
    pub fn check_predecessor(&self) -> bool {
        let predecessor = self.state().predecessor;

        let Some(predecessor) = predecessor else {
            return false;
        };

        if let Err(error) = self.call(predecessor.address, RequestSpecific::Ping) {
            let mut state = self.state();

            // Only if nobody replaced it while we were waiting.
            if state.predecessor == Some(predecessor) {
                state.predecessor = None;

                debug!(predecessor = ?predecessor.address, ?error, "Cleared failed predecessor");

                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;

    use crate::core::test_utils::SimulatedNetwork;
    use crate::Error;

    use super::*;

    #[test]
    fn singleton_fingers_point_at_self() {
        let network = SimulatedNetwork::new(16);
        let node = network.node(1);
        node.create();

        node.fix_fingers().unwrap();

        assert_eq!(node.state().finger_table.to_vec(), vec![*node.node(); 16]);
    }

    #[test]
    fn fingers_are_owners_of_starts() {
        let network = SimulatedNetwork::new(16);
        let nodes = network.converged_ring(10);

        let mut ring: Vec<Node> = nodes.iter().map(|n| *n.node()).collect();
        ring.sort_by_key(|n| n.id);

        let owner_of = |target: Id| {
            ring.iter()
                .find(|n| n.id >= target)
                .copied()
                .unwrap_or(ring[0])
        };

        for node in &nodes {
            let fingers = node.state().finger_table.to_vec();
            assert_eq!(fingers.len(), 16);

            for slot in 1..=16u8 {
                let start = node.space().finger_start(node.node().id, slot);
                assert_eq!(
                    fingers[slot as usize - 1],
                    owner_of(start),
                    "slot {slot} of {:?}",
                    node.node().id
                );
            }
        }
    }

    #[test]
    fn fix_fingers_is_idempotent() {
        let network = SimulatedNetwork::new(16);
        let nodes = network.converged_ring(6);

        let before: Vec<_> = nodes.iter().map(|n| n.state().finger_table.clone()).collect();

        for node in &nodes {
            node.fix_fingers().unwrap();
        }

        let after: Vec<_> = nodes.iter().map(|n| n.state().finger_table.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn failed_round_keeps_previous_table() {
        let network = SimulatedNetwork::new(8);
        let node = network.node(1);
        node.create();

        let own = *node.node();

        // A successor that never answers, at an address hashing right after
        // us. Slot 1 is resolved locally, slot 2 has to be forwarded to it.
        let dead = (2..=u16::MAX)
            .map(|port| Node::new(SocketAddr::from(([127, 0, 0, 1], port)), node.space()))
            .find(|candidate| candidate.id == node.space().reduce(own.id.0 + 1))
            .unwrap();

        node.state().successors.reset(dead);
        node.state().finger_table.replace(vec![own; 8]);
        let previous = node.state().finger_table.clone();

        let result = node.fix_fingers();

        assert!(matches!(result, Err(Error::Unreachable { address, .. }) if address == dead.address));
        assert_eq!(node.state().finger_table, previous);
    }

    #[test]
    fn dead_predecessor_is_cleared() {
        let network = SimulatedNetwork::new(16);
        let nodes = network.converged_ring(3);

        let node = &nodes[0];
        let predecessor = node.state().predecessor.unwrap();

        assert!(!node.check_predecessor());
        assert_eq!(node.state().predecessor, Some(predecessor));

        network.kill(predecessor.address);

        assert!(node.check_predecessor());
        assert_eq!(node.state().predecessor, None);
        assert!(!node.check_predecessor());
    }

    #[test]
    fn ring_heals_after_failure() {
        let network = SimulatedNetwork::new(16);
        let nodes = network.converged_ring(8);

        let dead = *nodes[2].node();
        network.kill(dead.address);

        let alive: Vec<_> = nodes
            .iter()
            .filter(|n| n.node() != &dead)
            .cloned()
            .collect();

        for _ in 0..10 {
            for node in &alive {
                node.check_predecessor();
                node.stabilize();
            }
        }
        // The first sweep may trip over fingers still pointing at the dead
        // node, which clears them.
        for node in &alive {
            let _ = node.fix_fingers();
        }
        for node in &alive {
            node.fix_fingers().unwrap();
        }

        assert!(SimulatedNetwork::is_converged(&alive));

        for node in &alive {
            assert!(node.state().finger_table.iter().all(|n| n != &dead));
        }
    }
}
