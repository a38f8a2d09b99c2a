//! TCP transport correlating ring requests and responses.

use std::fmt::{self, Debug, Formatter};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use tracing::{debug, trace};

use crate::common::{Message, MessageType, RequestSpecific, ResponseSpecific, VERSION};
use crate::{Error, Result};

/// Default request timeout before abandoning a request to a non-responding node.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000); // 2 seconds
/// Default number of outgoing connections kept open.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;
/// The maximum duration to backoff checking the listener after it has no pending
/// connections. Lower values increases CPU usage, but reduces latency.
pub const MAX_THREAD_BLOCK_DURATION: Duration = Duration::from_millis(10);
/// Largest accepted frame, in bytes, excluding the length prefix.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Point to point request/response calls to other nodes.
pub trait Transport: Debug + Send + Sync {
    /// Send `request` to `to` and wait for its response.
    ///
    /// Any failure is final for this call, implementations never retry.
    fn call(&self, to: SocketAddr, request: RequestSpecific) -> Result<ResponseSpecific>;

    /// Close every cached connection.
    fn close_all(&self);
}

type Connection = Arc<Mutex<TcpStream>>;

/// A [Transport] over TCP, reusing one connection per peer.
///
/// The cache lock is only held to look up, insert or evict a connection.
/// Dialing and the round trip itself happen outside of it.
pub struct TcpTransport {
    next_tid: AtomicU32,
    request_timeout: Duration,
    connections: Mutex<LruCache<SocketAddr, Connection>>,
}

impl TcpTransport {
    pub fn new(request_timeout: Duration, max_connections: usize) -> Self {
        let capacity = NonZeroUsize::new(max_connections).unwrap_or(NonZeroUsize::MIN);

        Self {
            next_tid: AtomicU32::new(rand::random()),
            request_timeout,
            connections: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of currently cached connections.
    pub fn cached(&self) -> usize {
        self.connections().len()
    }

    // === Private Methods ===

    fn connections(&self) -> MutexGuard<'_, LruCache<SocketAddr, Connection>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn tid(&self) -> u32 {
        // Wraps on overflow.
        self.next_tid.fetch_add(1, Ordering::Relaxed)
    }

    fn connection(&self, to: SocketAddr) -> Result<Connection> {
        if let Some(connection) = self.connections().get(&to).cloned() {
            return Ok(connection);
        }

        let stream = TcpStream::connect_timeout(&to, self.request_timeout)
            .and_then(|stream| {
                stream.set_read_timeout(Some(self.request_timeout))?;
                stream.set_write_timeout(Some(self.request_timeout))?;
                stream.set_nodelay(true)?;

                Ok(stream)
            })
            .map_err(|source| Error::Unreachable {
                address: to,
                source,
            })?;

        trace!(context = "transport", ?to, "Dialed new connection");

        let connection = Arc::new(Mutex::new(stream));

        self.connections().put(to, connection.clone());

        Ok(connection)
    }

    /// Evict `connection` unless it was already replaced by another caller.
    fn evict(&self, to: &SocketAddr, connection: &Connection) {
        let mut connections = self.connections();

        if connections
            .peek(to)
            .is_some_and(|cached| Arc::ptr_eq(cached, connection))
        {
            connections.pop(to);
            debug!(context = "transport", ?to, "Evicted connection");
        }
    }

    fn round_trip(&self, to: SocketAddr, connection: &Connection, message: &Message) -> Result<Message> {
        let mut stream = connection.lock().unwrap_or_else(PoisonError::into_inner);

        write_frame(&mut *stream, message)
            .and_then(|_| read_frame(&mut *stream))
            .and_then(Message::from_bytes)
            .map_err(|error| match error {
                Error::IO(source) => Error::Unreachable {
                    address: to,
                    source,
                },
                error => error,
            })
    }
}

impl Transport for TcpTransport {
    fn call(&self, to: SocketAddr, request: RequestSpecific) -> Result<ResponseSpecific> {
        let connection = self.connection(to)?;

        let message = Message {
            transaction_id: self.tid(),
            version: Some(VERSION),
            message_type: MessageType::Request(request),
        };

        trace!(context = "socket_message_sending", ?to, ?message);

        let response = match self.round_trip(to, &connection, &message) {
            Ok(response) => response,
            Err(error) => {
                self.evict(&to, &connection);
                return Err(error);
            }
        };

        trace!(context = "socket_message_receiving", from = ?to, message = ?response);

        if response.transaction_id != message.transaction_id {
            // The stream is out of sync, nothing after this can be trusted.
            self.evict(&to, &connection);

            return Err(Error::InvalidTransactionId {
                expected: message.transaction_id,
                got: response.transaction_id,
            });
        }

        match response.message_type {
            MessageType::Response(response) => Ok(response),
            MessageType::Error(error) => Err(Error::Remote {
                code: error.code,
                description: error.description,
            }),
            MessageType::Request(_) => {
                self.evict(&to, &connection);
                Err(Error::UnexpectedResponse)
            }
        }
    }

    fn close_all(&self) {
        let mut connections = self.connections();

        for (_, connection) in connections.iter() {
            // Busy connections are closed when their caller drops them.
            if let Ok(stream) = connection.try_lock() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }

        connections.clear();
    }
}

impl Debug for TcpTransport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("request_timeout", &self.request_timeout)
            .field("cached", &self.cached())
            .finish()
    }
}

/// Write `message` as a 4 bytes big endian length followed by its bencoded bytes.
pub(crate) fn write_frame<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let bytes = message.to_bytes()?;

    if bytes.len() > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(bytes.len()));
    }

    let mut frame = Vec::with_capacity(4 + bytes.len());
    frame.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    frame.extend_from_slice(&bytes);

    writer.write_all(&frame)?;
    writer.flush()?;

    Ok(())
}

/// Read one length prefixed frame, without decoding it.
pub(crate) fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut length = [0u8; 4];
    reader.read_exact(&mut length)?;

    let length = u32::from_be_bytes(length) as usize;

    if length > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge(length));
    }

    let mut bytes = vec![0u8; length];
    reader.read_exact(&mut bytes)?;

    Ok(bytes)
}
