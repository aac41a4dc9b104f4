//! Neighbor connection lifecycle and the routing node event loop.
//!
//! A [`Node`] owns the listening socket, one [`NeighborLink`] per
//! adjacent server, and the routing table; its single-threaded event
//! loop multiplexes inbound frames, control commands, and the periodic
//! update timer.

mod command;
mod config;
mod error;
mod neighbor;
mod node;

pub use command::{Command, CommandError};
pub use config::{NeighborSpec, NodeConfig};
pub use error::{LinkError, NodeError};
pub use neighbor::{NeighborLink, MISSED_UPDATE_LIMIT};
pub use node::Node;
