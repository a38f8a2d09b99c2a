use std::fmt::{self, Display, Formatter};

use crate::common::{IdSpace, Node};

use super::LocalNode;

/// Read-only snapshot of a node's ring state.
#[derive(Debug, Clone)]
pub struct Info {
    node: Node,
    space: IdSpace,
    label: Option<String>,
    predecessor: Option<Node>,
    successors: Vec<Node>,
    fingers: Vec<Node>,
    values: Vec<(String, usize)>,
}

impl Info {
    /// This node's descriptor.
    pub fn node(&self) -> &Node {
        &self.node
    }
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
    /// Number of bits of the identifier space.
    pub fn ring_bits(&self) -> u8 {
        self.space.bits()
    }
    pub fn predecessor(&self) -> Option<&Node> {
        self.predecessor.as_ref()
    }
    /// Immediate successor, always present.
    pub fn successor(&self) -> &Node {
        self.successors.first().unwrap_or(&self.node)
    }
    pub fn successors(&self) -> &[Node] {
        &self.successors
    }
    /// Finger table slots, lowest first. Empty until the first rebuild.
    pub fn fingers(&self) -> &[Node] {
        &self.fingers
    }
    /// Stored keys with their payload sizes, sorted by key.
    pub fn values(&self) -> &[(String, usize)] {
        &self.values
    }

    /// Render a node as `hex-id ip:port`.
    pub fn describe(&self, node: &Node) -> String {
        format!("{} {}", self.space.to_hex(node.id), node.address)
    }

    /// Multi-line dump of the ring state, including stored values.
    pub fn dump(&self) -> String {
        let mut dump = self.to_string();

        dump.push_str(&format!("Values ({}):\n", self.values.len()));
        for (key, size) in &self.values {
            dump.push_str(&format!("  {key} ({size} bytes)\n"));
        }

        dump
    }
}

impl Display for Info {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => writeln!(f, "Node {label}: {}", self.describe(&self.node))?,
            None => writeln!(f, "Node: {}", self.describe(&self.node))?,
        }

        match &self.predecessor {
            Some(predecessor) => writeln!(f, "Predecessor: {}", self.describe(predecessor))?,
            None => writeln!(f, "Predecessor: none")?,
        }

        writeln!(f, "Successors:")?;
        for (i, successor) in self.successors.iter().enumerate() {
            writeln!(f, "  [{i}] {}", self.describe(successor))?;
        }

        writeln!(f, "Fingers:")?;
        for (i, finger) in self.fingers.iter().enumerate() {
            let start = self.space.finger_start(self.node.id, i as u8 + 1);
            writeln!(
                f,
                "  [{}] {} -> {}",
                i + 1,
                self.space.to_hex(start),
                self.describe(finger)
            )?;
        }

        Ok(())
    }
}

impl From<&LocalNode> for Info {
    fn from(local: &LocalNode) -> Self {
        let state = local.state();

        Self {
            node: *local.node(),
            space: *local.space(),
            label: local.label().map(|label| label.to_string()),
            predecessor: state.predecessor,
            successors: state.successors.to_vec(),
            fingers: state.finger_table.to_vec(),
            values: state.bucket.summary(),
        }
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use crate::core::test_utils::SimulatedNetwork;

    use super::*;

    #[test]
    fn snapshot_of_converged_node() {
        let network = SimulatedNetwork::new(16);
        let nodes = network.converged_ring(4);

        let node = &nodes[0];
        node.put("a.txt", Bytes::from_static(b"hello")).unwrap();

        let info = Info::from(node.as_ref());

        assert_eq!(info.node(), node.node());
        assert_eq!(info.ring_bits(), 16);
        assert_eq!(info.successors().len(), 3);
        assert_eq!(info.fingers().len(), 16);
        assert!(info.predecessor().is_some());

        let printed = info.to_string();
        assert!(printed.contains(&node.node().address.to_string()));
        assert!(printed.contains("Successors:"));
        assert!(printed.contains("[16]"));
        assert!(!printed.contains("Values"));

        assert!(info.dump().contains("Values ("));
    }

    #[test]
    fn snapshot_of_singleton() {
        let network = SimulatedNetwork::new(10);
        let node = network.node(1);
        node.create();
        node.put("a.txt", Bytes::from_static(b"hello")).unwrap();

        let info = Info::from(node.as_ref());

        assert_eq!(info.successor(), node.node());
        assert_eq!(info.predecessor(), None);
        assert!(info.fingers().is_empty());
        assert_eq!(info.values(), &[("a.txt".to_string(), 5)]);
        assert!(info.to_string().contains("Predecessor: none"));
        assert!(info.dump().contains("a.txt (5 bytes)"));
        assert!(info.describe(node.node()).starts_with(&node.space().to_hex(node.node().id)));
    }
}
