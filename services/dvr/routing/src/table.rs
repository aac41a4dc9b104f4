//! Routing table implementation with Bellman-Ford merge.

use dvr_topology::Topology;
use dvr_wire::{RouteAdvertisement, ServerId, INFINITY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddrV4;
use tracing::{debug, warn};

/// One route in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Endpoint of the destination server
    pub addr: SocketAddrV4,
    /// Total cost to the destination; [`INFINITY`] when unreachable
    pub cost: u16,
    /// Neighbor the route goes through; `None` when unreachable
    pub next_hop: Option<ServerId>,
}

/// Destination-to-route mapping for one node.
///
/// Entries are created for every server in the topology at startup and
/// never removed; they change only through [`RoutingTable::merge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    local_id: ServerId,
    entries: BTreeMap<ServerId, RouteEntry>,
}

impl RoutingTable {
    /// Build the initial table from a validated topology.
    ///
    /// The self entry gets cost 0 via itself, direct neighbors get
    /// their link cost, every other server starts unreachable.
    pub fn from_topology(topology: &Topology) -> Self {
        let local = topology.local();
        let mut entries = BTreeMap::new();

        entries.insert(
            local.id,
            RouteEntry {
                addr: local.addr,
                cost: 0,
                next_hop: Some(local.id),
            },
        );
        for server in &topology.servers {
            if server.id != local.id {
                entries.insert(
                    server.id,
                    RouteEntry {
                        addr: server.addr,
                        cost: INFINITY,
                        next_hop: None,
                    },
                );
            }
        }

        let mut table = Self {
            local_id: local.id,
            entries,
        };
        for link in &topology.links {
            if let Some(peer) = link.peer_of(local.id) {
                if let Some(entry) = table.entries.get_mut(&peer) {
                    entry.cost = link.cost;
                    entry.next_hop = Some(peer);
                }
            }
        }

        table
    }

    /// Id of the node owning this table.
    pub fn local_id(&self) -> ServerId {
        self.local_id
    }

    /// Number of known destinations, including self.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty (never true after construction).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the route to a destination.
    pub fn get(&self, id: ServerId) -> Option<&RouteEntry> {
        self.entries.get(&id)
    }

    /// All routes in destination-id order.
    pub fn iter(&self) -> impl Iterator<Item = (ServerId, &RouteEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// The table as advertisement rows, one per destination including
    /// self, ready for [`dvr_wire::RoutingUpdate`].
    pub fn advertisement(&self) -> Vec<RouteAdvertisement> {
        self.entries
            .iter()
            .map(|(id, entry)| RouteAdvertisement::new(*id, entry.addr, entry.cost))
            .collect()
    }

    /// Merge a neighbor's advertised cost vector.
    ///
    /// The local link cost `sender_cost` is authoritative for the
    /// sender's own row, regardless of what the sender advertised about
    /// itself. Every other advertised destination is relaxed: a
    /// candidate path through the sender is adopted only on strict
    /// improvement, so repeated merges of the same update are
    /// idempotent and a previously adopted route is never downgraded.
    /// Cost addition saturates at the infinity sentinel.
    pub fn merge(
        &mut self,
        sender_id: ServerId,
        sender_cost: u16,
        advertised: &[RouteAdvertisement],
    ) {
        let Some(sender_entry) = self.entries.get_mut(&sender_id) else {
            warn!("Sender {} not in the routing table, ignoring update", sender_id);
            return;
        };
        sender_entry.cost = sender_cost;
        sender_entry.next_hop = Some(sender_id);

        for row in advertised {
            if row.id == self.local_id {
                continue;
            }

            let candidate = sender_cost.saturating_add(row.cost);
            match self.entries.get_mut(&row.id) {
                None => {
                    debug!(
                        "Learned new destination {} via {} (cost: {})",
                        row.id, sender_id, candidate
                    );
                    self.entries.insert(
                        row.id,
                        RouteEntry {
                            addr: row.addr,
                            cost: candidate,
                            next_hop: Some(sender_id),
                        },
                    );
                }
                Some(entry) if candidate < entry.cost => {
                    debug!(
                        "Improved route to {} via {} (cost: {} -> {})",
                        row.id, sender_id, entry.cost, candidate
                    );
                    entry.cost = candidate;
                    entry.next_hop = Some(sender_id);
                }
                Some(_) => {}
            }
        }
    }
}
