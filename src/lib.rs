#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

// Public modules
mod common;
mod core;
mod dht;
mod error;
pub mod rpc;

pub use crate::common::{messages, Id, IdSpace, Node};
pub use crate::core::Info;
pub use bytes::Bytes;
pub use dht::{Dht, DhtBuilder, Testnet};
pub use error::Error;

/// Alias for `Result<T, chord_dht::Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
