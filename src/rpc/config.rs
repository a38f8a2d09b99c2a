use std::net::SocketAddr;
use std::time::Duration;

use crate::common::MAX_RING_BITS;
use crate::{Error, Result};

use super::{DEFAULT_MAX_CONNECTIONS, DEFAULT_REQUEST_TIMEOUT};

/// Default interval between two stabilize rounds.
pub const DEFAULT_STABILIZE_INTERVAL: Duration = Duration::from_millis(500);
/// Default interval between two finger table rebuilds.
pub const DEFAULT_FIX_FINGERS_INTERVAL: Duration = Duration::from_secs(1);
/// Default interval between two predecessor liveness checks.
pub const DEFAULT_CHECK_PREDECESSOR_INTERVAL: Duration = Duration::from_secs(1);
/// Default length of the successor list.
pub const DEFAULT_SUCCESSORS: usize = 3;
/// Default bound on forwarding steps while resolving an owner.
pub const DEFAULT_MAX_HOPS: usize = 128;

/// Shortest accepted interval for periodic tasks.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);
/// Longest accepted interval for periodic tasks.
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);
/// Largest accepted successor list.
pub const MAX_SUCCESSORS: usize = 32;

#[derive(Debug, Clone)]
/// Dht Configurations
pub struct Config {
    /// Address to listen on, and to advertise to other nodes.
    ///
    /// The node's identifier is the hash of this address, so it must be the
    /// address peers actually dial. A port of `0` binds a random port.
    ///
    /// Defaults to `127.0.0.1:0`
    pub address: SocketAddr,
    /// A node already in the ring to join through.
    ///
    /// Defaults to None, where the node creates a new ring of its own.
    pub bootstrap: Option<SocketAddr>,
    /// Interval between stabilize rounds.
    ///
    /// Defaults to [DEFAULT_STABILIZE_INTERVAL]
    pub stabilize_interval: Duration,
    /// Interval between finger table rebuilds.
    ///
    /// Defaults to [DEFAULT_FIX_FINGERS_INTERVAL]
    pub fix_fingers_interval: Duration,
    /// Interval between predecessor liveness checks.
    ///
    /// Defaults to [DEFAULT_CHECK_PREDECESSOR_INTERVAL]
    pub check_predecessor_interval: Duration,
    /// Length `r` of the successor list, the number of consecutive node
    /// failures the ring can survive.
    ///
    /// Defaults to [DEFAULT_SUCCESSORS]
    pub successors: usize,
    /// Number of bits `m` of the identifier space.
    ///
    /// Every node of a ring must use the same value.
    ///
    /// Defaults to [crate::common::DEFAULT_RING_BITS]
    pub ring_bits: u8,
    /// Maximum forwarding steps before a lookup is reported as a routing failure.
    ///
    /// Defaults to [DEFAULT_MAX_HOPS]
    pub max_hops: usize,
    /// Connect, read and write timeout of outgoing requests.
    ///
    /// A peer that does not answer within this duration is presumed dead.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// Maximum number of cached outgoing connections.
    ///
    /// Defaults to [DEFAULT_MAX_CONNECTIONS]
    pub max_connections: usize,
    /// Human readable name of this node, only used in logs and state dumps.
    ///
    /// Defaults to None
    pub label: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
            bootstrap: None,
            stabilize_interval: DEFAULT_STABILIZE_INTERVAL,
            fix_fingers_interval: DEFAULT_FIX_FINGERS_INTERVAL,
            check_predecessor_interval: DEFAULT_CHECK_PREDECESSOR_INTERVAL,
            successors: DEFAULT_SUCCESSORS,
            ring_bits: crate::common::DEFAULT_RING_BITS,
            max_hops: DEFAULT_MAX_HOPS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            label: None,
        }
    }
}

impl Config {
    /// Reject configurations the node can not start with.
    pub fn validate(&self) -> Result<()> {
        if self.address.ip().is_unspecified() {
            return Err(Error::InvalidConfig(format!(
                "address {} is unspecified, peers could not reach it",
                self.address
            )));
        }

        if let Some(bootstrap) = self.bootstrap {
            if bootstrap.ip().is_unspecified() || bootstrap.port() == 0 {
                return Err(Error::InvalidConfig(format!(
                    "bootstrap address {bootstrap} is not dialable"
                )));
            }

            if bootstrap == self.address {
                return Err(Error::InvalidConfig(format!(
                    "bootstrap address {bootstrap} is the node's own address"
                )));
            }
        }

        for (name, interval) in [
            ("stabilize", self.stabilize_interval),
            ("fix_fingers", self.fix_fingers_interval),
            ("check_predecessor", self.check_predecessor_interval),
        ] {
            if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&interval) {
                return Err(Error::InvalidConfig(format!(
                    "{name} interval must be within {MIN_INTERVAL:?}..={MAX_INTERVAL:?}, got {interval:?}"
                )));
            }
        }

        if self.successors == 0 || self.successors > MAX_SUCCESSORS {
            return Err(Error::InvalidConfig(format!(
                "successors must be within 1..={MAX_SUCCESSORS}, got {}",
                self.successors
            )));
        }

        if self.ring_bits == 0 || self.ring_bits > MAX_RING_BITS {
            return Err(Error::InvalidConfig(format!(
                "ring bits must be within 1..={MAX_RING_BITS}, got {}",
                self.ring_bits
            )));
        }

        if self.max_hops == 0 {
            return Err(Error::InvalidConfig("max hops must be at least 1".into()));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }

        if self.max_connections == 0 {
            return Err(Error::InvalidConfig(
                "max connections must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
