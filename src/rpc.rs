//! Wire level plumbing: configuration, outgoing calls and the inbound server.

mod config;
pub(crate) mod server;
mod socket;

pub use config::*;
pub use server::RequestHandler;
pub use socket::{
    TcpTransport, Transport, DEFAULT_MAX_CONNECTIONS, DEFAULT_REQUEST_TIMEOUT,
    MAX_FRAME_SIZE, MAX_THREAD_BLOCK_DURATION,
};
