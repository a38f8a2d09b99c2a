//! Dht node.

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info};

use crate::common::{Id, Node};
use crate::core::scheduler::spawn_periodic;
use crate::core::{Info, LocalNode};
use crate::rpc::{server, Config, RequestHandler, TcpTransport, DEFAULT_SUCCESSORS};
use crate::{Error, Result};

#[derive(Debug)]
/// Chord Dht node.
///
/// Serves other nodes and runs the periodic maintenance in background
/// threads, until [Dht::shutdown] is called or it is dropped.
pub struct Dht {
    node: Arc<LocalNode>,
    local_addr: SocketAddr,
    shutdown: Mutex<Option<flume::Sender<()>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Debug, Default, Clone)]
/// A builder for the [Dht] node.
pub struct DhtBuilder(Config);

impl DhtBuilder {
    /// Address to listen on and advertise, see [Config::address].
    pub fn address(&mut self, address: SocketAddr) -> &mut Self {
        self.0.address = address;

        self
    }

    /// Join the ring this node is part of, instead of creating a new one.
    pub fn bootstrap(&mut self, bootstrap: SocketAddr) -> &mut Self {
        self.0.bootstrap = Some(bootstrap);

        self
    }

    pub fn stabilize_interval(&mut self, interval: Duration) -> &mut Self {
        self.0.stabilize_interval = interval;

        self
    }

    pub fn fix_fingers_interval(&mut self, interval: Duration) -> &mut Self {
        self.0.fix_fingers_interval = interval;

        self
    }

    pub fn check_predecessor_interval(&mut self, interval: Duration) -> &mut Self {
        self.0.check_predecessor_interval = interval;

        self
    }

    /// Length of the successor list.
    pub fn successors(&mut self, successors: usize) -> &mut Self {
        self.0.successors = successors;

        self
    }

    /// Number of bits of the identifier space, must match the rest of the ring.
    pub fn ring_bits(&mut self, bits: u8) -> &mut Self {
        self.0.ring_bits = bits;

        self
    }

    pub fn max_hops(&mut self, max_hops: usize) -> &mut Self {
        self.0.max_hops = max_hops;

        self
    }

    pub fn request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.0.request_timeout = timeout;

        self
    }

    pub fn max_connections(&mut self, max_connections: usize) -> &mut Self {
        self.0.max_connections = max_connections;

        self
    }

    pub fn label(&mut self, label: &str) -> &mut Self {
        self.0.label = Some(label.to_string());

        self
    }

    /// Create a Dht node.
    pub fn build(&self) -> Result<Dht> {
        Dht::new(self.0.clone())
    }
}

impl Dht {
    /// Returns a builder to edit settings before creating a Dht node.
    pub fn builder() -> DhtBuilder {
        DhtBuilder::default()
    }

    /// Create a new Dht node.
    ///
    /// Binds the listener, joins the ring through [Config::bootstrap] (or
    /// creates a new ring), then starts serving and the periodic tasks.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.address)?;
        let local_addr = listener.local_addr()?;

        if config.bootstrap == Some(local_addr) {
            return Err(Error::InvalidConfig(format!(
                "bootstrap address {local_addr} is the node's own address"
            )));
        }

        let transport = Arc::new(TcpTransport::new(
            config.request_timeout,
            config.max_connections,
        ));
        let node = Arc::new(LocalNode::new(local_addr, &config, transport)?);

        match config.bootstrap {
            Some(bootstrap) => node.join(bootstrap)?,
            None => node.create(),
        }

        let (shutdown_sender, shutdown) = flume::bounded::<()>(1);

        let handles = vec![
            server::spawn(
                listener,
                node.clone() as Arc<dyn RequestHandler>,
                config.request_timeout,
                shutdown.clone(),
            )?,
            spawn_periodic(
                "chord-stabilize",
                config.stabilize_interval,
                shutdown.clone(),
                {
                    let node = node.clone();
                    move || node.stabilize()
                },
            )?,
            spawn_periodic(
                "chord-fix-fingers",
                config.fix_fingers_interval,
                shutdown.clone(),
                {
                    let node = node.clone();
                    move || {
                        let _ = node.fix_fingers();
                    }
                },
            )?,
            spawn_periodic(
                "chord-check-predecessor",
                config.check_predecessor_interval,
                shutdown,
                {
                    let node = node.clone();
                    move || {
                        node.check_predecessor();
                    }
                },
            )?,
        ];

        info!(
            id = ?node.node().id,
            address = ?local_addr,
            label = ?node.label(),
            "Chord node listening"
        );

        Ok(Dht {
            node,
            local_addr,
            shutdown: Mutex::new(Some(shutdown_sender)),
            handles: Mutex::new(handles),
        })
    }

    // === Getters ===

    /// The address this node listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// This node's identifier and address.
    pub fn node(&self) -> Node {
        *self.node.node()
    }

    /// A snapshot of this node's predecessor, successors, fingers and stored values.
    pub fn info(&self) -> Info {
        Info::from(self.node.as_ref())
    }

    /// Returns `true` once [Dht::shutdown] was called.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    // === Public Methods ===

    /// Resolve the node responsible for the identifier `target`.
    pub fn find_successor(&self, target: Id) -> Result<Node> {
        self.check_running()?;

        self.node.find_successor(target)
    }

    /// Resolve the node responsible for `key`.
    pub fn lookup(&self, key: &str) -> Result<Node> {
        self.check_running()?;

        self.node.lookup(key)
    }

    /// Store `value` under `key` on the responsible node, returns that node.
    pub fn put(&self, key: &str, value: impl Into<Bytes>) -> Result<Node> {
        self.check_running()?;

        self.node.put(key, value.into())
    }

    /// Fetch the value stored under `key` from the responsible node.
    ///
    /// Returns [Error::KeyNotFound] if it holds nothing under that key.
    pub fn get(&self, key: &str) -> Result<Bytes> {
        self.check_running()?;

        self.node.get(key)
    }

    /// Stop serving and maintaining the ring, and close all outgoing
    /// connections. Calling it again is a no-op.
    pub fn shutdown(&self) {
        let sender = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(sender) = sender else {
            return;
        };

        // Disconnecting the channel stops every background thread.
        drop(sender);

        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in handles {
            let name = handle.thread().name().map(|name| name.to_string());

            if handle.join().is_err() {
                debug!(thread = ?name, "Background thread panicked");
            }
        }

        self.node.transport().close_all();

        info!(id = ?self.node.node().id, address = ?self.local_addr, "Chord node shutdown");
    }

    // === Private Methods ===

    fn check_running(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(Error::Shutdown);
        }

        Ok(())
    }
}

impl Drop for Dht {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Create a testnet of Dht nodes on localhost, running maintenance every few
/// milliseconds.
#[derive(Debug)]
pub struct Testnet {
    pub bootstrap: SocketAddr,
    pub nodes: Vec<Dht>,
}

impl Testnet {
    /// Start `count` nodes, all joining through the first one.
    pub fn new(count: usize) -> Result<Testnet> {
        if count == 0 {
            return Err(Error::InvalidConfig(
                "a testnet needs at least one node".into(),
            ));
        }

        let mut nodes: Vec<Dht> = Vec::with_capacity(count);

        let first = Self::builder().build()?;
        let bootstrap = first.local_addr();
        nodes.push(first);

        for _ in 1..count {
            let node = Self::builder().bootstrap(bootstrap).build()?;
            nodes.push(node);
        }

        Ok(Self { bootstrap, nodes })
    }

    /// Returns `true` if predecessors and successor lists of all nodes
    /// match the ring sorted by identifier.
    pub fn is_stable(&self) -> bool {
        let infos: Vec<Info> = self.nodes.iter().map(Dht::info).collect();

        let mut ring: Vec<Node> = infos.iter().map(|info| *info.node()).collect();
        ring.sort_by_key(|node| node.id);

        let count = ring.len();
        let expected_successors = DEFAULT_SUCCESSORS.min(count - 1).max(1);

        infos.iter().all(|info| {
            let Some(i) = ring.iter().position(|node| node == info.node()) else {
                return false;
            };

            let successors: Vec<Node> = (1..=expected_successors)
                .map(|offset| ring[(i + offset) % count])
                .collect();

            let predecessor = if count == 1 {
                None
            } else {
                Some(&ring[(i + count - 1) % count])
            };

            info.successors() == successors.as_slice() && info.predecessor() == predecessor
        })
    }

    /// Poll [Testnet::is_stable] until it holds or `timeout` elapses.
    pub fn wait_until_stable(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_stable() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }
    }

    fn builder() -> DhtBuilder {
        let mut builder = Dht::builder();

        builder
            .stabilize_interval(Duration::from_millis(10))
            .fix_fingers_interval(Duration::from_millis(20))
            .check_predecessor_interval(Duration::from_millis(20))
            .request_timeout(Duration::from_millis(500));

        builder
    }
}
