//! Topology file parser.

use crate::TopologyError;
use dvr_wire::ServerId;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::debug;

/// Lowest port a server may listen on (unprivileged range)
const PORT_MIN: u16 = 1024;

/// One server declared in the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    /// Server id, within `[1, server count]`
    pub id: ServerId,
    /// Listening endpoint of the server
    pub addr: SocketAddrV4,
}

/// One direct link declared in the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// One end of the link
    pub a: ServerId,
    /// The other end of the link
    pub b: ServerId,
    /// Direct link cost
    pub cost: u16,
}

impl LinkSpec {
    /// The id on the far side of the link from `local`, if the link
    /// touches `local` at all.
    pub fn peer_of(&self, local: ServerId) -> Option<ServerId> {
        if self.a == local {
            Some(self.b)
        } else if self.b == local {
            Some(self.a)
        } else {
            None
        }
    }
}

/// A validated topology: the full server list plus the direct links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// All servers in the network, in file order; the first is local
    pub servers: Vec<ServerSpec>,
    /// Direct links of the local node
    pub links: Vec<LinkSpec>,
}

impl Topology {
    /// Parse and validate a topology file's contents.
    pub fn parse(input: &str) -> Result<Self, TopologyError> {
        let lines: Vec<&str> = input.lines().collect();

        let num_servers = parse_count(&lines, 0)?;
        let num_links = parse_count(&lines, 1)?;

        if num_servers <= 1 {
            return Err(TopologyError::ServerCount(num_servers));
        }
        if num_links >= num_servers {
            return Err(TopologyError::NeighborCount {
                neighbors: num_links,
                servers: num_servers,
            });
        }

        let mut servers = Vec::with_capacity(num_servers);
        for i in 0..num_servers {
            let line_no = 3 + i;
            let line = lines
                .get(2 + i)
                .ok_or(TopologyError::Truncated(line_no))?;
            servers.push(parse_server(line, line_no, num_servers)?);
        }

        let mut links = Vec::new();
        for (i, line) in lines[2 + num_servers..].iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = 3 + num_servers + i;
            links.push(parse_link(line, line_no, num_servers)?);
        }

        if links.len() != num_links {
            return Err(TopologyError::NeighborLineCount {
                expected: num_links,
                found: links.len(),
            });
        }

        debug!(
            "Validated topology: {} servers, {} neighbor links",
            servers.len(),
            links.len()
        );

        Ok(Self { servers, links })
    }

    /// The local node's server spec (the first server line).
    pub fn local(&self) -> ServerSpec {
        self.servers[0]
    }
}

// Counts parse as u16: server ids live in the same range, and it
// bounds the allocation below before anything is reserved.
fn parse_count(lines: &[&str], index: usize) -> Result<usize, TopologyError> {
    let line_no = index + 1;
    lines
        .get(index)
        .ok_or(TopologyError::Truncated(line_no))?
        .trim()
        .parse::<u16>()
        .map(usize::from)
        .map_err(|_| TopologyError::InvalidInteger(line_no))
}

fn parse_server(line: &str, line_no: usize, num_servers: usize) -> Result<ServerSpec, TopologyError> {
    let info = |reason: &str| TopologyError::ServerInfo {
        line: line_no,
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(info("expected `<id> <ipv4> <port>`"));
    }

    let id: ServerId = parts[0]
        .parse()
        .map_err(|_| TopologyError::InvalidInteger(line_no))?;
    if id == 0 || id as usize > num_servers {
        return Err(info("server id out of range"));
    }

    let ip: Ipv4Addr = parts[1].parse().map_err(|_| info("invalid IPv4 address"))?;
    let port: u16 = parts[2]
        .parse()
        .map_err(|_| TopologyError::InvalidInteger(line_no))?;
    if port < PORT_MIN {
        return Err(info("port must be within 1024-65535"));
    }

    Ok(ServerSpec {
        id,
        addr: SocketAddrV4::new(ip, port),
    })
}

fn parse_link(line: &str, line_no: usize, num_servers: usize) -> Result<LinkSpec, TopologyError> {
    let info = |reason: &str| TopologyError::NeighborInfo {
        line: line_no,
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(info("expected `<idA> <idB> <cost>`"));
    }

    let a: ServerId = parts[0]
        .parse()
        .map_err(|_| TopologyError::InvalidInteger(line_no))?;
    let b: ServerId = parts[1]
        .parse()
        .map_err(|_| TopologyError::InvalidInteger(line_no))?;
    let cost: u16 = parts[2]
        .parse()
        .map_err(|_| TopologyError::InvalidInteger(line_no))?;

    for id in [a, b] {
        if id == 0 || id as usize > num_servers {
            return Err(info("neighbor id out of range"));
        }
    }

    Ok(LinkSpec { a, b, cost })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "3\n2\n\
        1 10.0.0.1 2000\n\
        2 10.0.0.2 2001\n\
        3 10.0.0.3 2002\n\
        1 2 5\n\
        1 3 4\n";

    #[test]
    fn test_parse_valid_topology() {
        let topology = Topology::parse(VALID).unwrap();
        assert_eq!(topology.servers.len(), 3);
        assert_eq!(topology.links.len(), 2);
        assert_eq!(topology.local().id, 1);
        assert_eq!(
            topology.servers[1].addr,
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 2001)
        );
        assert_eq!(topology.links[0], LinkSpec { a: 1, b: 2, cost: 5 });
    }

    #[test]
    fn test_oversized_count_rejected() {
        // A count beyond the id space fails validation instead of
        // driving an allocation.
        let input = "18446744073709551615\n1\n1 10.0.0.1 2000\n";
        let err = Topology::parse(input).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidInteger(1)));

        let input = "2\n99999999999\n1 10.0.0.1 2000\n2 10.0.0.2 2001\n1 2 5\n";
        let err = Topology::parse(input).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidInteger(2)));
    }

    #[test]
    fn test_single_server_rejected() {
        let err = Topology::parse("1\n0\n1 10.0.0.1 2000\n").unwrap_err();
        assert!(matches!(err, TopologyError::ServerCount(1)));
    }

    #[test]
    fn test_neighbor_count_bound() {
        let err = Topology::parse("2\n2\n1 10.0.0.1 2000\n2 10.0.0.2 2001\n1 2 5\n1 2 6\n")
            .unwrap_err();
        assert!(matches!(
            err,
            TopologyError::NeighborCount { neighbors: 2, servers: 2 }
        ));
    }

    #[test]
    fn test_bad_ipv4_rejected() {
        let input = "2\n1\n1 10.0.0.256 2000\n2 10.0.0.2 2001\n1 2 5\n";
        let err = Topology::parse(input).unwrap_err();
        assert!(matches!(err, TopologyError::ServerInfo { line: 3, .. }));
    }

    #[test]
    fn test_privileged_port_rejected() {
        let input = "2\n1\n1 10.0.0.1 80\n2 10.0.0.2 2001\n1 2 5\n";
        let err = Topology::parse(input).unwrap_err();
        assert!(matches!(err, TopologyError::ServerInfo { line: 3, .. }));
    }

    #[test]
    fn test_link_id_out_of_range() {
        let input = "2\n1\n1 10.0.0.1 2000\n2 10.0.0.2 2001\n1 7 5\n";
        let err = Topology::parse(input).unwrap_err();
        assert!(matches!(err, TopologyError::NeighborInfo { line: 5, .. }));
    }

    #[test]
    fn test_missing_neighbor_line() {
        let input = "3\n2\n1 10.0.0.1 2000\n2 10.0.0.2 2001\n3 10.0.0.3 2002\n1 2 5\n";
        let err = Topology::parse(input).unwrap_err();
        assert!(matches!(
            err,
            TopologyError::NeighborLineCount { expected: 2, found: 1 }
        ));
    }

    #[test]
    fn test_peer_of() {
        let link = LinkSpec { a: 1, b: 2, cost: 5 };
        assert_eq!(link.peer_of(1), Some(2));
        assert_eq!(link.peer_of(2), Some(1));
        assert_eq!(link.peer_of(3), None);
    }
}
