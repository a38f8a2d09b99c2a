//! Mutable ring descriptor of a node.

use crate::common::{FingerTable, Node, SuccessorList};

use super::storage::Bucket;

#[derive(Debug, Clone)]
/// Everything a node knows about its neighborhood, plus the values it stores.
///
/// Guarded by a single lock in [super::LocalNode], never held across a call
/// to another node.
pub struct NodeState {
    pub finger_table: FingerTable,
    pub successors: SuccessorList,
    /// `None` until some node notifies us, or after it failed a liveness check.
    pub predecessor: Option<Node>,
    pub bucket: Bucket,
}

impl NodeState {
    /// A singleton ring: we are our own successor, with no predecessor.
    pub fn new(own: Node, successors: usize) -> Self {
        NodeState {
            finger_table: FingerTable::new(),
            successors: SuccessorList::new(own, successors),
            predecessor: None,
            bucket: Bucket::default(),
        }
    }

    pub fn successor(&self) -> Node {
        *self.successors.first()
    }

    /// Drop every finger pointing at `address`.
    ///
    /// The table is only ever replaced whole, so a dead finger clears it;
    /// routing falls back to the successor list until the next rebuild.
    pub fn forget_finger(&mut self, address: &std::net::SocketAddr) -> bool {
        if self.finger_table.iter().any(|n| &n.address == address) {
            self.finger_table.clear();
            return true;
        }

        false
    }
}
