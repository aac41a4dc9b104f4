//! Topology validation error types.

use thiserror::Error;

/// Topology file errors, all fatal at startup
#[derive(Error, Debug)]
pub enum TopologyError {
    /// File ends before the declared line count
    #[error("topology file truncated at line {0}")]
    Truncated(usize),

    /// A field that must be an integer is not
    #[error("invalid integer value at line {0}")]
    InvalidInteger(usize),

    /// Fewer than two servers declared
    #[error("server count must be greater than 1 (got {0})")]
    ServerCount(usize),

    /// Neighbor count not below the server count
    #[error("neighbor count {neighbors} must be less than server count {servers}")]
    NeighborCount {
        /// Declared neighbor-link count
        neighbors: usize,
        /// Declared server count
        servers: usize,
    },

    /// Malformed server line
    #[error("invalid server information at line {line}: {reason}")]
    ServerInfo {
        /// 1-based line number in the file
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// Malformed neighbor line
    #[error("invalid neighbor information at line {line}: {reason}")]
    NeighborInfo {
        /// 1-based line number in the file
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// Neighbor lines present do not match the declared count
    #[error("expected {expected} neighbor lines, found {found}")]
    NeighborLineCount {
        /// Count declared on line 2
        expected: usize,
        /// Neighbor lines actually present
        found: usize,
    },
}
