//! Struct and implementation of a node descriptor on the ring.
use std::fmt::{self, Display, Formatter};
use std::net::SocketAddr;

use crate::common::{Id, IdSpace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// A node on the ring: its address and the identifier derived from it.
pub struct Node {
    pub id: Id,
    pub address: SocketAddr,
}

impl Node {
    /// Creates a node descriptor, hashing the address into `space`.
    ///
    /// The address is the only identity that travels on the wire; the id is
    /// recomputed by every node that learns about this one.
    pub fn new(address: SocketAddr, space: &IdSpace) -> Node {
        Node {
            id: space.hash_address(&address),
            address,
        }
    }

    /// Returns `true` if both descriptors point at the same peer.
    pub fn same_address(&self, other: &Node) -> bool {
        self.address == other.address
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}
