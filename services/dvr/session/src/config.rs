//! Node startup configuration.

use crate::NodeError;
use dvr_topology::Topology;
use dvr_wire::ServerId;
use std::collections::HashMap;
use std::net::SocketAddrV4;
use std::time::Duration;
use tracing::warn;

/// One neighbor link of the local node, resolved from the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborSpec {
    /// Neighbor's server id
    pub id: ServerId,
    /// Neighbor's listening endpoint
    pub addr: SocketAddrV4,
    /// Direct link cost
    pub cost: u16,
}

/// Validated startup configuration for a [`crate::Node`]
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// The full validated topology; its first server is the local node
    pub topology: Topology,
    /// Interval between periodic routing-update broadcasts
    pub update_interval: Duration,
    /// The local node's direct neighbors
    pub neighbors: Vec<NeighborSpec>,
}

impl NodeConfig {
    /// Resolve a validated topology into a node configuration.
    ///
    /// Each link line touching the local node becomes a neighbor;
    /// links between two remote servers are not ours to manage and are
    /// skipped with a warning. Every neighbor id must appear in the
    /// server list, and no two neighbors may share an endpoint, since
    /// inbound updates are matched to links by endpoint.
    pub fn from_topology(
        topology: Topology,
        update_interval: Duration,
    ) -> Result<Self, NodeError> {
        let local = topology.local();

        let mut neighbors: Vec<NeighborSpec> = Vec::new();
        let mut seen: HashMap<SocketAddrV4, ServerId> = HashMap::new();

        for link in &topology.links {
            let Some(peer) = link.peer_of(local.id) else {
                warn!(
                    "Ignoring link {}-{}: it does not touch this server",
                    link.a, link.b
                );
                continue;
            };

            let server = topology
                .servers
                .iter()
                .find(|s| s.id == peer)
                .ok_or(NodeError::UnknownNeighbor(peer))?;

            if let Some(&other) = seen.get(&server.addr) {
                return Err(NodeError::DuplicateEndpoint {
                    a: other,
                    b: peer,
                    addr: server.addr,
                });
            }
            seen.insert(server.addr, peer);

            neighbors.push(NeighborSpec {
                id: peer,
                addr: server.addr,
                cost: link.cost,
            });
        }

        Ok(Self {
            topology,
            update_interval,
            neighbors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvr_topology::{LinkSpec, ServerSpec};
    use std::net::Ipv4Addr;

    fn addr(last: u8, port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, last), port)
    }

    fn topology() -> Topology {
        Topology {
            servers: vec![
                ServerSpec { id: 1, addr: addr(1, 2000) },
                ServerSpec { id: 2, addr: addr(2, 2001) },
                ServerSpec { id: 3, addr: addr(3, 2002) },
            ],
            links: vec![
                LinkSpec { a: 1, b: 2, cost: 5 },
                LinkSpec { a: 3, b: 1, cost: 4 },
            ],
        }
    }

    #[test]
    fn test_neighbors_resolved_from_links() {
        let config = NodeConfig::from_topology(topology(), Duration::from_secs(10)).unwrap();
        assert_eq!(config.neighbors.len(), 2);
        assert_eq!(
            config.neighbors[0],
            NeighborSpec { id: 2, addr: addr(2, 2001), cost: 5 }
        );
        // The link may list the local id on either side.
        assert_eq!(
            config.neighbors[1],
            NeighborSpec { id: 3, addr: addr(3, 2002), cost: 4 }
        );
    }

    #[test]
    fn test_remote_only_link_skipped() {
        let mut t = topology();
        t.links.push(LinkSpec { a: 2, b: 3, cost: 1 });
        let config = NodeConfig::from_topology(t, Duration::from_secs(10)).unwrap();
        assert_eq!(config.neighbors.len(), 2);
    }

    #[test]
    fn test_unknown_neighbor_rejected() {
        let mut t = topology();
        t.links.push(LinkSpec { a: 1, b: 9, cost: 1 });
        let err = NodeConfig::from_topology(t, Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, NodeError::UnknownNeighbor(9)));
    }

    #[test]
    fn test_duplicate_endpoint_rejected() {
        let mut t = topology();
        t.servers[2].addr = addr(2, 2001); // same endpoint as server 2
        let err = NodeConfig::from_topology(t, Duration::from_secs(10)).unwrap_err();
        assert!(matches!(
            err,
            NodeError::DuplicateEndpoint { a: 2, b: 3, .. }
        ));
    }
}
