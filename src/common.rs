//! Miscellaneous common structs used throughout the library.

mod finger_table;
mod id;
pub mod messages;
mod node;
mod successor_list;

pub use finger_table::*;
pub use id::*;
pub use messages::*;
pub use node::*;
pub use successor_list::*;
