//! Topology file parsing and validation.
//!
//! A topology file declares the whole routed network: line 1 is the
//! server count, line 2 the neighbor-link count, followed by one
//! `<id> <ipv4> <port>` line per server and one `<idA> <idB> <cost>`
//! line per direct link. The first server line is the local node.

mod error;
mod parser;

pub use error::TopologyError;
pub use parser::{LinkSpec, ServerSpec, Topology};
