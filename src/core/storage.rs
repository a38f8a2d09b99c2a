//! Opaque key/value storage on the owning node.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::common::{ErrorSpecific, Id, Node, RequestSpecific, ResponseSpecific, ERROR_PROTOCOL};
use crate::{Error, Result};

use super::LocalNode;

#[derive(Debug, Clone, Default)]
/// Values stored on this node, keyed by their name.
pub struct Bucket {
    values: HashMap<String, Bytes>,
}

impl Bucket {
    pub fn insert(&mut self, key: String, value: Bytes) -> Option<Bytes> {
        self.values.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&Bytes> {
        self.values.get(key)
    }

    /// Keys and payload sizes, sorted by key.
    pub fn summary(&self) -> Vec<(String, usize)> {
        let mut summary: Vec<_> = self
            .values
            .iter()
            .map(|(key, value)| (key.clone(), value.len()))
            .collect();

        summary.sort();
        summary
    }
}

impl LocalNode {
    /// Returns `true` if `key` falls in `(predecessor, self]`, or if we
    /// don't know our predecessor yet.
    pub fn owns(&self, key: Id) -> bool {
        responsible(self.state().predecessor, self.node.id, key)
    }

    /// Resolve the node responsible for `key`.
    pub fn lookup(&self, key: &str) -> Result<Node> {
        self.find_successor(self.space.hash_key(key))
    }

    /// Store `value` under `key` on its owner, returns the owner.
    pub fn put(&self, key: &str, value: Bytes) -> Result<Node> {
        let owner = self.lookup(key)?;

        match self.call(
            owner.address,
            RequestSpecific::Store {
                key: key.to_string(),
                value,
            },
        )? {
            ResponseSpecific::Store => Ok(owner),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Fetch the value stored under `key` from its owner.
    pub fn get(&self, key: &str) -> Result<Bytes> {
        let owner = self.lookup(key)?;

        match self.call(
            owner.address,
            RequestSpecific::Fetch {
                key: key.to_string(),
            },
        )? {
            ResponseSpecific::Fetch { value: Some(value) } => Ok(value),
            ResponseSpecific::Fetch { value: None } => Err(Error::KeyNotFound(key.to_string())),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    // === Inbound ===

    pub(crate) fn store_local(
        &self,
        key: String,
        value: Bytes,
    ) -> std::result::Result<(), ErrorSpecific> {
        let key_id = self.space.hash_key(&key);

        let mut state = self.state();

        if !responsible(state.predecessor, self.node.id, key_id) {
            debug!(?key, ?key_id, "Rejected store for a key we don't own");

            return Err(ErrorSpecific {
                code: ERROR_PROTOCOL,
                description: "Not responsible for key".to_string(),
            });
        }

        state.bucket.insert(key, value);

        Ok(())
    }

    pub(crate) fn fetch_local(&self, key: &str) -> Option<Bytes> {
        self.state().bucket.get(key).cloned()
    }
}

fn responsible(predecessor: Option<Node>, own: Id, key: Id) -> bool {
    match predecessor {
        Some(predecessor) => key.in_interval(predecessor.id, own, true),
        None => true,
    }
}

#[cfg(test)]
mod test {
    use crate::core::test_utils::SimulatedNetwork;

    use super::*;

    #[test]
    fn bucket_summary_is_sorted() {
        let mut bucket = Bucket::default();
        bucket.insert("b".into(), Bytes::from_static(b"22"));
        bucket.insert("a".into(), Bytes::from_static(b"1"));

        assert_eq!(bucket.summary(), vec![("a".into(), 1), ("b".into(), 2)]);
        assert_eq!(
            bucket.insert("a".into(), Bytes::from_static(b"333")),
            Some(Bytes::from_static(b"1"))
        );
    }

    #[test]
    fn singleton_owns_everything() {
        let network = SimulatedNetwork::new(10);
        let node = network.node(1);
        node.create();

        assert!(node.owns(Id(0)));
        assert!(node.owns(Id(1023)));

        let owner = node.put("notes.txt", Bytes::from_static(b"hello")).unwrap();
        assert_eq!(owner, *node.node());
        assert_eq!(node.get("notes.txt").unwrap(), Bytes::from_static(b"hello"));
        assert!(matches!(node.get("missing"), Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn reject_keys_outside_interval() {
        let network = SimulatedNetwork::new(10);
        let node = network.node(1);
        node.create();

        let own = node.node().id;
        // Our predecessor sits right behind us, so we only own our own id.
        let predecessor = Node {
            id: Id(own.0.wrapping_sub(1) & 1023),
            address: "127.0.0.1:1".parse().unwrap(),
        };
        node.state().predecessor = Some(predecessor);

        let key = (0..)
            .map(|i| format!("key-{i}"))
            .find(|key| node.space().hash_key(key) != own)
            .unwrap();

        assert!(!node.owns(node.space().hash_key(&key)));

        let error = node
            .store_local(key.clone(), Bytes::from_static(b"x"))
            .unwrap_err();
        assert_eq!(error.code, ERROR_PROTOCOL);
        assert_eq!(node.fetch_local(&key), None);
    }

    #[test]
    fn put_get_across_ring() {
        let network = SimulatedNetwork::new(10);
        let nodes = network.converged_ring(5);

        for i in 0..20 {
            let key = format!("file-{i}");
            let value = Bytes::from(format!("payload-{i}"));

            let writer = &nodes[i % nodes.len()];
            let reader = &nodes[(i + 2) % nodes.len()];

            let owner = writer.put(&key, value.clone()).unwrap();
            assert_eq!(reader.lookup(&key).unwrap(), owner);
            assert_eq!(reader.get(&key).unwrap(), value);

            let holder = nodes.iter().find(|n| n.node() == &owner).unwrap();
            assert!(holder.owns(holder.space().hash_key(&key)));
        }
    }
}
