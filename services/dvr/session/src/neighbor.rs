//! Neighbor link lifecycle and liveness accounting.

use crate::LinkError;
use dvr_wire::ServerId;
use std::net::{SocketAddr, SocketAddrV4};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Consecutive update cycles a link may miss before it is closed.
pub const MISSED_UPDATE_LIMIT: u32 = 3;

/// One directly connected neighbor.
///
/// Created once per adjacent server at startup and never recreated;
/// the link exclusively owns at most one outbound connection handle.
/// `is_down` starts true and clears only on a successful connect.
#[derive(Debug)]
pub struct NeighborLink {
    id: ServerId,
    addr: SocketAddrV4,
    cost: u16,
    conn: Option<TcpStream>,
    missed_updates: u32,
    is_down: bool,
}

impl NeighborLink {
    /// Create a link to a neighbor, initially down and unconnected.
    pub fn new(id: ServerId, addr: SocketAddrV4, cost: u16) -> Self {
        Self {
            id,
            addr,
            cost,
            conn: None,
            missed_updates: 0,
            is_down: true,
        }
    }

    /// Neighbor's server id.
    pub fn id(&self) -> ServerId {
        self.id
    }

    /// Neighbor's listening endpoint.
    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    /// Direct link cost to this neighbor.
    pub fn cost(&self) -> u16 {
        self.cost
    }

    /// Change the direct link cost.
    pub fn set_cost(&mut self, cost: u16) {
        self.cost = cost;
    }

    /// Whether the link is currently down.
    pub fn is_down(&self) -> bool {
        self.is_down
    }

    /// Consecutive update cycles with no frame from this neighbor.
    pub fn missed_updates(&self) -> u32 {
        self.missed_updates
    }

    /// Open the outbound connection to the neighbor.
    ///
    /// Fails with [`LinkError::ConnectionAlreadyExists`] if a handle is
    /// already held. A TCP failure leaves the link down with no handle;
    /// the caller reports it and the node keeps running.
    pub async fn connect(&mut self) -> Result<(), LinkError> {
        if self.conn.is_some() {
            return Err(LinkError::ConnectionAlreadyExists(self.id));
        }

        match TcpStream::connect(SocketAddr::V4(self.addr)).await {
            Ok(stream) => {
                info!("Connected to neighbor {} at {}", self.id, self.addr);
                self.conn = Some(stream);
                self.is_down = false;
                Ok(())
            }
            Err(source) => {
                self.conn = None;
                self.is_down = true;
                Err(LinkError::Connect { id: self.id, source })
            }
        }
    }

    /// Close the connection if one is held and mark the link down.
    /// Idempotent.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            debug!("Closed connection to neighbor {}", self.id);
        }
        self.is_down = true;
    }

    /// Send one frame to the neighbor. Does not reconnect on failure.
    pub async fn send(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        let conn = self.conn.as_mut().ok_or(LinkError::NotConnected(self.id))?;
        conn.write_all(frame)
            .await
            .map_err(|source| LinkError::Send { id: self.id, source })
    }

    /// Record one update cycle without a frame from this neighbor;
    /// returns the new counter value.
    pub fn increment_missed_updates(&mut self) -> u32 {
        self.missed_updates += 1;
        self.missed_updates
    }

    /// Clear the missed-update counter after receiving a frame.
    pub fn reset_missed_updates(&mut self) {
        self.missed_updates = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn local_listener() -> (TcpListener, SocketAddrV4) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = match listener.local_addr().unwrap() {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!(),
        };
        (listener, addr)
    }

    #[tokio::test]
    async fn test_connect_clears_is_down() {
        let (_listener, addr) = local_listener().await;
        let mut link = NeighborLink::new(2, addr, 5);
        assert!(link.is_down());

        link.connect().await.unwrap();
        assert!(!link.is_down());
    }

    #[tokio::test]
    async fn test_second_connect_rejected() {
        let (_listener, addr) = local_listener().await;
        let mut link = NeighborLink::new(2, addr, 5);
        link.connect().await.unwrap();

        let err = link.connect().await.unwrap_err();
        assert!(matches!(err, LinkError::ConnectionAlreadyExists(2)));
        assert!(!link.is_down());
    }

    #[tokio::test]
    async fn test_connect_failure_marks_down() {
        // Bind then drop a listener so the port is very likely refused.
        let (listener, addr) = local_listener().await;
        drop(listener);

        let mut link = NeighborLink::new(2, addr, 5);
        let err = link.connect().await.unwrap_err();
        assert!(matches!(err, LinkError::Connect { id: 2, .. }));
        assert!(link.is_down());

        // The failed attempt left no handle behind, so a retry is
        // allowed rather than rejected as a duplicate.
        assert!(matches!(
            link.connect().await.unwrap_err(),
            LinkError::Connect { .. }
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (_listener, addr) = local_listener().await;
        let mut link = NeighborLink::new(2, addr, 5);
        link.connect().await.unwrap();

        link.close();
        assert!(link.is_down());
        link.close();
        assert!(link.is_down());
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let (_listener, addr) = local_listener().await;
        let mut link = NeighborLink::new(2, addr, 5);

        let err = link.send(b"frame").await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected(2)));
    }

    #[tokio::test]
    async fn test_missed_update_policy() {
        let (_listener, addr) = local_listener().await;
        let mut link = NeighborLink::new(2, addr, 5);
        link.connect().await.unwrap();

        // Two missed cycles keep the link up; a received frame resets.
        assert_eq!(link.increment_missed_updates(), 1);
        assert_eq!(link.increment_missed_updates(), 2);
        link.reset_missed_updates();
        assert_eq!(link.missed_updates(), 0);

        // Three consecutive misses reach the limit and force a close.
        for _ in 0..MISSED_UPDATE_LIMIT {
            if link.increment_missed_updates() >= MISSED_UPDATE_LIMIT {
                link.close();
            }
        }
        assert!(link.is_down());
    }
}
