//! Routing shortcuts, one slot per bit of the ring.

use crate::common::{Id, Node};

#[derive(Debug, Clone, Default, PartialEq)]
/// Finger table of a node.
///
/// Slot `i` (1-based) approximates the owner of `(self + 2^(i-1)) mod 2^m`.
/// The table is empty until the first maintenance round completes, and is
/// only ever replaced as a whole.
pub struct FingerTable {
    fingers: Vec<Node>,
}

impl FingerTable {
    pub fn new() -> Self {
        FingerTable::default()
    }

    /// Replace every slot at once.
    pub fn replace(&mut self, fingers: Vec<Node>) {
        self.fingers = fingers;
    }

    /// Forget every slot.
    pub fn clear(&mut self) {
        self.fingers.clear();
    }

    /// Slots in order, lowest first.
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.fingers.iter()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.fingers.clone()
    }

    /// Scan from the highest slot down for the first finger strictly between
    /// `own` and `target`.
    pub fn closest_preceding(&self, own: Id, target: Id) -> Option<&Node> {
        self.fingers
            .iter()
            .rev()
            .find(|finger| finger.id.in_interval(own, target, false))
    }
}
