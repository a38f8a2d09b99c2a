//! Chord identifiers and the cyclic identifier space they live in.
use std::fmt::{self, Debug, Formatter};
use std::net::SocketAddr;

use crate::{Error, Result};

/// The largest supported ring, identifiers are stored in a `u64`.
pub const MAX_RING_BITS: u8 = 64;
/// Default number of bits `m` of the ring, the ring has `2^m` positions.
pub const DEFAULT_RING_BITS: u8 = 64;

#[derive(Clone, Copy, PartialEq, Ord, PartialOrd, Eq, Hash)]
/// A position on the ring, either a node's or a key's.
pub struct Id(pub u64);

impl Id {
    /// Returns `true` if `self` lies strictly between `start` and `end` walking
    /// clockwise, with `self == end` counted as inside iff `inclusive`.
    ///
    /// When `start == end` the interval is the full ring: every identifier other
    /// than `start` is inside, and `start` itself is inside iff `inclusive`.
    pub fn in_interval(&self, start: Id, end: Id, inclusive: bool) -> bool {
        if inclusive && *self == end {
            return true;
        }

        if start < end {
            start < *self && *self < end
        } else {
            // Wraps around zero, or covers the full ring.
            *self > start || *self < end
        }
    }

    /// Big endian bytes, as sent on the wire.
    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_bytes(bytes: [u8; 8]) -> Id {
        Id(u64::from_be_bytes(bytes))
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({:x})", self.0)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The ring of `2^m` identifiers.
///
/// This is the only place the ring size is defined; hashing and finger offsets
/// both go through it so they can never disagree.
pub struct IdSpace {
    bits: u8,
}

impl IdSpace {
    /// Create an identifier space of `2^bits` positions, `bits` in `1..=64`.
    pub fn new(bits: u8) -> Result<Self> {
        if bits == 0 || bits > MAX_RING_BITS {
            return Err(Error::InvalidConfig(format!(
                "ring bits must be within 1..={MAX_RING_BITS}, got {bits}"
            )));
        }

        Ok(IdSpace { bits })
    }

    /// Number of bits `m`, which is also the number of finger table slots.
    pub fn bits(&self) -> u8 {
        self.bits
    }

    fn mask(&self) -> u64 {
        if self.bits == MAX_RING_BITS {
            u64::MAX
        } else {
            (1 << self.bits) - 1
        }
    }

    /// SHA-1 of `data` reduced modulo `2^m`.
    ///
    /// The digest is read as a big endian integer, so reducing it keeps its
    /// lowest `m` bits, which all live in the last 8 bytes.
    pub fn hash(&self, data: &[u8]) -> Id {
        let digest = sha1_smol::Sha1::from(data).digest().bytes();

        let mut tail = [0u8; 8];
        tail.copy_from_slice(&digest[12..]);

        Id(u64::from_be_bytes(tail) & self.mask())
    }

    /// Identifier of a node, derived from its `ip:port`.
    pub fn hash_address(&self, address: &SocketAddr) -> Id {
        self.hash(address.to_string().as_bytes())
    }

    /// Identifier of a stored key.
    pub fn hash_key(&self, key: &str) -> Id {
        self.hash(key.as_bytes())
    }

    /// Start of finger `slot` (1-based): `(id + 2^(slot-1)) mod 2^m`.
    pub fn finger_start(&self, id: Id, slot: u8) -> Id {
        debug_assert!(slot >= 1 && slot <= self.bits);

        let offset = 1u64 << (slot - 1);

        Id(id.0.wrapping_add(offset) & self.mask())
    }

    /// Reduce an arbitrary value into this ring.
    pub fn reduce(&self, value: u64) -> Id {
        Id(value & self.mask())
    }

    /// Zero padded hex, just wide enough for this ring.
    pub fn to_hex(&self, id: Id) -> String {
        let width = (self.bits as usize).div_ceil(4);

        format!("{:0width$x}", id.0, width = width)
    }
}

impl Default for IdSpace {
    fn default() -> Self {
        IdSpace {
            bits: DEFAULT_RING_BITS,
        }
    }
}
