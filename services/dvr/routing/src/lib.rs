//! Distance-vector routing table.
//!
//! The table holds one entry per server in the topology, including the
//! local node, and converges by merging neighbors' advertised cost
//! vectors with a Bellman-Ford relaxation.

mod table;

pub use table::{RouteEntry, RoutingTable};
