//! Link and node error types.

use dvr_wire::ServerId;
use std::net::SocketAddrV4;
use thiserror::Error;

/// Per-link errors, all non-fatal: the event loop reports them and the
/// affected link is at worst marked down.
#[derive(Error, Debug)]
pub enum LinkError {
    /// `connect()` called while a connection handle is already held
    #[error("a connection to neighbor {0} already exists")]
    ConnectionAlreadyExists(ServerId),

    /// `send()` called with no connection handle
    #[error("no connection to neighbor {0}")]
    NotConnected(ServerId),

    /// TCP connect to the neighbor's endpoint failed
    #[error("failed to connect to neighbor {id}: {source}")]
    Connect {
        /// Neighbor being dialed
        id: ServerId,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Write on an established connection failed
    #[error("error sending routing update to {id}: {source}")]
    Send {
        /// Neighbor being written to
        id: ServerId,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },
}

/// Node construction errors, all fatal at startup.
#[derive(Error, Debug)]
pub enum NodeError {
    /// A second node was constructed in the same process
    #[error("a node has already been constructed in this process")]
    AlreadyInitialized,

    /// A neighbor link references an id missing from the server list
    #[error("neighbor {0} is not in the server list")]
    UnknownNeighbor(ServerId),

    /// Two neighbors share an endpoint, which would make inbound
    /// updates ambiguous
    #[error("neighbors {a} and {b} share endpoint {addr}")]
    DuplicateEndpoint {
        /// First neighbor with the endpoint
        a: ServerId,
        /// Second neighbor with the endpoint
        b: ServerId,
        /// The shared endpoint
        addr: SocketAddrV4,
    },

    /// The listening socket could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested bind endpoint
        addr: SocketAddrV4,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },
}
