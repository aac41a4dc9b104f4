//! Wire protocol for distance-vector routing updates.
//!
//! Each message on a neighbor link is a single complete frame: an
//! 8-byte header followed by one fixed-width entry per advertised
//! destination. All integers are big-endian.

mod codec;
mod error;

pub use codec::{RouteAdvertisement, RoutingUpdate, ENTRY_SIZE, HEADER_SIZE};
pub use error::WireError;

/// Identifier of a server in the routed network, unique per node.
pub type ServerId = u16;

/// Cost sentinel for an unreachable destination.
pub const INFINITY: u16 = u16::MAX;
