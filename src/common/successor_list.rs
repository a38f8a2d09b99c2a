//! The next `r` nodes clockwise, kept for fault tolerance.

use std::net::SocketAddr;

use crate::common::Node;

#[derive(Debug, Clone, PartialEq)]
/// Successor list of a node.
///
/// Index 0 is the immediate successor, the rest caches the successor's own
/// successors. Never longer than the replication factor, never empty: when
/// every entry is evicted it falls back to the owning node itself.
pub struct SuccessorList {
    own: Node,
    capacity: usize,
    successors: Vec<Node>,
}

impl SuccessorList {
    /// A singleton list, `[own]`. A zero `capacity` is treated as 1.
    pub fn new(own: Node, capacity: usize) -> Self {
        SuccessorList {
            own,
            capacity: capacity.max(1),
            successors: vec![own],
        }
    }

    /// The immediate successor.
    pub fn first(&self) -> &Node {
        // Never empty, but fall back to own rather than index.
        self.successors.first().unwrap_or(&self.own)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.successors.iter()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.successors.clone()
    }

    /// Drop everything and point at `node` alone.
    pub fn reset(&mut self, node: Node) {
        self.successors.clear();
        self.successors.push(node);
    }

    /// Put `node` in front as the immediate successor, keeping the rest as
    /// backups.
    pub fn promote(&mut self, node: Node) {
        let rest: Vec<Node> = std::mem::take(&mut self.successors);

        self.rebuild(node, rest.into_iter());
    }

    /// `[first] + fetched[..r-1]`, where `fetched` is `first`'s own list.
    ///
    /// Our own node and repeated entries are skipped, since they add no
    /// redundancy.
    pub fn refresh(&mut self, first: Node, fetched: Vec<Node>) {
        self.successors.clear();

        self.rebuild(first, fetched.into_iter());
    }

    /// Remove every entry at `address`, returns `true` if anything was removed.
    pub fn evict(&mut self, address: &SocketAddr) -> bool {
        let before = self.successors.len();

        self.successors.retain(|n| &n.address != address);

        let evicted = self.successors.len() != before;

        if self.successors.is_empty() {
            self.successors.push(self.own);
        }

        evicted
    }

    fn rebuild(&mut self, first: Node, rest: impl Iterator<Item = Node>) {
        let mut successors = Vec::with_capacity(self.capacity);
        successors.push(first);

        for node in rest {
            if successors.len() >= self.capacity {
                break;
            }

            if node.same_address(&self.own) || successors.iter().any(|n| n.same_address(&node))
            {
                continue;
            }

            successors.push(node);
        }

        self.successors = successors;
    }
}
