//! Inbound side: accept connections and answer requests on them.

use std::fmt::Debug;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::common::{Message, MessageType, RequestSpecific, VERSION};
use crate::Result;

use super::socket::{read_frame, write_frame, MAX_THREAD_BLOCK_DURATION};

/// How often an idle connection checks for shutdown.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Answers requests from other nodes.
pub trait RequestHandler: Debug + Send + Sync {
    /// Returns either a [MessageType::Response] or a [MessageType::Error].
    fn handle_request(&self, from: SocketAddr, request: RequestSpecific) -> MessageType;
}

/// Start accepting connections on `listener` until `shutdown` is disconnected.
pub(crate) fn spawn(
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
    request_timeout: Duration,
    shutdown: flume::Receiver<()>,
) -> Result<JoinHandle<()>> {
    listener.set_nonblocking(true)?;

    let handle = thread::Builder::new()
        .name("chord-server".to_string())
        .spawn(move || accept_loop(listener, handler, request_timeout, shutdown))?;

    Ok(handle)
}

fn accept_loop(
    listener: TcpListener,
    handler: Arc<dyn RequestHandler>,
    request_timeout: Duration,
    shutdown: flume::Receiver<()>,
) {
    while !shutdown.is_disconnected() {
        match listener.accept() {
            Ok((stream, from)) => {
                trace!(context = "server", ?from, "Accepted connection");

                let handler = handler.clone();
                let shutdown = shutdown.clone();

                let spawned = thread::Builder::new()
                    .name(format!("chord-conn-{from}"))
                    .spawn(move || {
                        if let Err(error) = serve(stream, from, handler, request_timeout, shutdown) {
                            debug!(context = "server", ?from, ?error, "Connection closed");
                        }
                    });

                if let Err(error) = spawned {
                    warn!(context = "server", ?error, "Failed to spawn connection thread");
                }
            }
            Err(error) if error.kind() == ErrorKind::WouldBlock => {
                thread::sleep(MAX_THREAD_BLOCK_DURATION);
            }
            Err(error) => {
                warn!(context = "server", ?error, "Failed to accept connection");
                thread::sleep(MAX_THREAD_BLOCK_DURATION);
            }
        }
    }

    debug!(context = "server", "Server stopped");
}

/// Answer requests on one connection until the peer hangs up or we shut down.
fn serve(
    mut stream: TcpStream,
    from: SocketAddr,
    handler: Arc<dyn RequestHandler>,
    request_timeout: Duration,
    shutdown: flume::Receiver<()>,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(request_timeout))?;

    let mut probe = [0u8; 1];

    loop {
        if shutdown.is_disconnected() {
            return Ok(());
        }

        // Wait for the next frame without consuming it.
        stream.set_read_timeout(Some(IDLE_POLL_INTERVAL))?;
        match stream.peek(&mut probe) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(error)
                if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(error) => return Err(error.into()),
        }

        stream.set_read_timeout(Some(request_timeout))?;
        let bytes = read_frame(&mut stream)?;

        let reply = match Message::from_bytes(&bytes) {
            Ok(Message {
                transaction_id,
                message_type: MessageType::Request(request),
                ..
            }) => {
                trace!(context = "socket_message_receiving", ?from, ?request);

                Message {
                    transaction_id,
                    version: Some(VERSION),
                    message_type: handler.handle_request(from, request),
                }
            }
            Ok(message) => {
                debug!(context = "server", ?from, ?message, "Expected a request");
                return Ok(());
            }
            Err(error) => {
                debug!(
                    context = "server",
                    ?from,
                    ?error,
                    message = ?String::from_utf8_lossy(&bytes),
                    "Received invalid Bencode message."
                );

                match Message::error_for_malformed(&bytes) {
                    Some(reply) => reply,
                    None => return Ok(()),
                }
            }
        };

        trace!(context = "socket_message_sending", to = ?from, message = ?reply);

        write_frame(&mut stream, &reply)?;
    }
}
