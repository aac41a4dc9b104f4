//! The routing node and its event loop.
//!
//! One node per process: it owns the listening socket, the neighbor
//! links, the routing table, and the periodic update timer. The loop
//! is readiness-driven and single-threaded; accepted connections get a
//! frame-reader task on the same runtime that feeds frames back over a
//! channel, so all routing state is only ever touched from the loop.

use crate::{Command, NeighborLink, NodeConfig, NodeError, MISSED_UPDATE_LIMIT};
use bytes::Bytes;
use dvr_routing::RoutingTable;
use dvr_topology::ServerSpec;
use dvr_wire::{RouteAdvertisement, RoutingUpdate};
use std::collections::HashMap;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// Upper bound on one inbound read; a read is assumed to deliver one
/// complete frame.
const READ_BUFFER_SIZE: usize = 4096;

/// Guards against a second node sharing the process.
static NODE_CONSTRUCTED: AtomicBool = AtomicBool::new(false);

/// Something that happened on an accepted peer connection.
#[derive(Debug)]
enum PeerEvent {
    /// One frame read from the peer
    Frame {
        /// Remote address of the connection
        peer: SocketAddr,
        /// Raw frame bytes
        bytes: Bytes,
    },
    /// The peer closed the connection (or the read failed)
    Closed {
        /// Remote address of the connection
        peer: SocketAddr,
    },
}

/// What one iteration of the event loop has to act on.
enum LoopEvent {
    Tick,
    Accepted(TcpStream, SocketAddr),
    Peer(PeerEvent),
    Control(String),
    ControlClosed,
    Idle,
}

/// A distance-vector routing node.
#[derive(Debug)]
pub struct Node {
    local: ServerSpec,
    interval: Duration,
    listener: TcpListener,
    links: Vec<NeighborLink>,
    table: RoutingTable,
    peers: HashMap<SocketAddr, JoinHandle<()>>,
    packets_received: u64,
    last_tick: Instant,
    frame_tx: mpsc::Sender<PeerEvent>,
    frame_rx: mpsc::Receiver<PeerEvent>,
}

impl Node {
    /// Bind the listening socket and construct the node.
    ///
    /// At most one node may exist per process; a second construction
    /// attempt fails with [`NodeError::AlreadyInitialized`] rather than
    /// silently replacing or sharing state. Connections to all
    /// neighbors are attempted immediately; failures are reported and
    /// the affected links stay down.
    pub async fn bind(config: NodeConfig) -> Result<Self, NodeError> {
        if NODE_CONSTRUCTED.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyInitialized);
        }

        let local = config.topology.local();
        let listener = match TcpListener::bind(SocketAddr::V4(local.addr)).await {
            Ok(listener) => listener,
            Err(source) => {
                NODE_CONSTRUCTED.store(false, Ordering::SeqCst);
                return Err(NodeError::Bind { addr: local.addr, source });
            }
        };
        info!("Connection started, listening on {}", local.addr);

        let table = RoutingTable::from_topology(&config.topology);
        let (frame_tx, frame_rx) = mpsc::channel(1024);

        let mut node = Self {
            local,
            interval: config.update_interval,
            listener,
            links: config
                .neighbors
                .iter()
                .map(|n| NeighborLink::new(n.id, n.addr, n.cost))
                .collect(),
            table,
            peers: HashMap::new(),
            packets_received: 0,
            last_tick: Instant::now(),
            frame_tx,
            frame_rx,
        };

        for link in &mut node.links {
            if let Err(e) = link.connect().await {
                warn!("{}", e);
            }
        }

        Ok(node)
    }

    /// The neighbor links, in topology order.
    pub fn links(&self) -> &[NeighborLink] {
        &self.links
    }

    /// The current routing table.
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Frames received and merged since the last `packets` command.
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Print the routing table to the operator.
    pub fn display(&self) {
        println!("Routing table for router {}", self.table.local_id());
        println!("Destination\tCost\tNext Hop\tIP\t\tPort");
        for (id, entry) in self.table.iter() {
            let next_hop = entry
                .next_hop
                .map(|h| h.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{}\t\t{}\t{}\t\t{}\t{}",
                id,
                entry.cost,
                next_hop,
                entry.addr.ip(),
                entry.addr.port()
            );
        }
    }

    /// Run the event loop. Never returns under normal operation.
    ///
    /// Each iteration blocks on readiness across the listener, the
    /// accepted peer connections, and the control input, bounded by the
    /// time remaining until the next periodic tick; every
    /// per-connection and per-command error is contained within the
    /// iteration that produced it.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut control_open = true;
        info!("Listening for routing updates and commands");

        loop {
            let deadline = self.last_tick + self.interval;

            let event = tokio::select! {
                _ = time::sleep_until(deadline) => LoopEvent::Tick,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => LoopEvent::Accepted(stream, peer),
                    Err(e) => {
                        warn!("Accept error: {}", e);
                        LoopEvent::Idle
                    }
                },
                event = self.frame_rx.recv() => match event {
                    Some(event) => LoopEvent::Peer(event),
                    None => LoopEvent::Idle,
                },
                line = lines.next_line(), if control_open => match line {
                    Ok(Some(line)) => LoopEvent::Control(line),
                    Ok(None) => LoopEvent::ControlClosed,
                    Err(e) => {
                        warn!("Control input error: {}", e);
                        LoopEvent::ControlClosed
                    }
                },
            };

            match event {
                LoopEvent::Tick | LoopEvent::Idle => {}
                LoopEvent::Accepted(stream, peer) => self.register_peer(stream, peer),
                LoopEvent::Peer(PeerEvent::Frame { peer, bytes }) => {
                    self.handle_frame(peer, bytes).await;
                }
                LoopEvent::Peer(PeerEvent::Closed { peer }) => self.deregister_peer(peer),
                LoopEvent::Control(line) => self.handle_command_line(&line).await,
                LoopEvent::ControlClosed => {
                    debug!("Control input closed");
                    control_open = false;
                }
            }

            if self.last_tick.elapsed() >= self.interval {
                self.periodic_maintenance().await;
                self.last_tick = Instant::now();
            }
        }
    }

    /// Register an accepted connection and start reading frames from
    /// it. The owning neighbor is only identified later, from the
    /// sender endpoint of the first decoded frame.
    fn register_peer(&mut self, mut stream: TcpStream, peer: SocketAddr) {
        info!("The connection to peer {} is successfully established", peer);

        let tx = self.frame_tx.clone();
        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => {
                        let _ = tx.send(PeerEvent::Closed { peer }).await;
                        break;
                    }
                    Ok(n) => {
                        let frame = Bytes::copy_from_slice(&buf[..n]);
                        if tx.send(PeerEvent::Frame { peer, bytes: frame }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.peers.insert(peer, handle);
    }

    fn deregister_peer(&mut self, peer: SocketAddr) {
        self.peers.remove(&peer);
        info!("Peer {} terminates the connection", peer);
    }

    /// Decode one inbound frame and merge it into the routing table.
    async fn handle_frame(&mut self, peer: SocketAddr, bytes: Bytes) {
        let update = match RoutingUpdate::decode(&bytes) {
            Ok(update) => update,
            Err(e) => {
                warn!("Dropping frame from peer {}: {}", peer, e);
                return;
            }
        };

        let Some(link) = self.links.iter_mut().find(|l| l.addr() == update.sender) else {
            warn!(
                "Update from {} does not match any neighbor, ignoring",
                update.sender
            );
            return;
        };

        link.reset_missed_updates();
        if link.is_down() {
            // A frame from a down neighbor is the reconnect signal;
            // there is no timer-driven retry.
            if let Err(e) = link.connect().await {
                warn!("{}", e);
            }
        }

        let (sender_id, sender_cost) = (link.id(), link.cost());
        self.table.merge(sender_id, sender_cost, &update.entries);
        self.packets_received += 1;
        info!("Received a routing update from server {}", sender_id);
    }

    async fn handle_command_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match Command::parse(line) {
            Ok(command) => self.execute(command).await,
            Err(e) => println!("{}", e),
        }
    }

    /// Execute one control command.
    pub async fn execute(&mut self, command: Command) {
        match command {
            Command::Update { a, b, cost } => self.update_link_cost(a, b, cost).await,
            Command::Step => self.broadcast_update().await,
            Command::Packets => {
                println!("{}", self.packets_received);
                self.packets_received = 0;
            }
            Command::Display => self.display(),
            Command::Disable { id } => {
                // Placeholder: no link teardown is performed.
                println!("Disabling link to {}", id);
            }
            Command::Crash => {
                for link in &mut self.links {
                    link.close();
                }
                info!("Closed all neighbor connections");
            }
        }
    }

    /// `update <idA> <idB> <cost>`: the local id must be one end of the
    /// link; the stored cost to the other end changes and that neighbor
    /// alone is sent a single-entry update.
    async fn update_link_cost(&mut self, a: u16, b: u16, cost: u16) {
        let neighbor_id = if a == self.local.id {
            b
        } else if b == self.local.id {
            a
        } else {
            println!("update must name this server ({}) as one endpoint", self.local.id);
            return;
        };

        let Some(link) = self.links.iter_mut().find(|l| l.id() == neighbor_id) else {
            println!("Server {} is not a neighbor", neighbor_id);
            return;
        };
        link.set_cost(cost);
        info!("Link cost to neighbor {} set to {}", neighbor_id, cost);

        let entry_addr = self
            .table
            .get(neighbor_id)
            .map(|entry| entry.addr)
            .unwrap_or_else(|| link.addr());
        let update = RoutingUpdate::new(
            self.local.addr,
            vec![RouteAdvertisement::new(neighbor_id, entry_addr, cost)],
        );

        match update.encode() {
            Ok(frame) => {
                if !link.is_down() {
                    if let Err(e) = link.send(&frame).await {
                        warn!("{}", e);
                    }
                }
            }
            Err(e) => warn!("Failed to encode link-cost update: {}", e),
        }
    }

    /// Encode the current table once and send it to every up neighbor.
    pub async fn broadcast_update(&mut self) {
        let update = RoutingUpdate::new(self.local.addr, self.table.advertisement());
        let frame = match update.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode routing update: {}", e);
                return;
            }
        };

        for link in &mut self.links {
            if !link.is_down() {
                if let Err(e) = link.send(&frame).await {
                    warn!("{}", e);
                }
            }
        }
    }

    /// One periodic tick: liveness bookkeeping for every up link, then
    /// a broadcast of the current table.
    pub async fn periodic_maintenance(&mut self) {
        for link in &mut self.links {
            if !link.is_down() && link.increment_missed_updates() >= MISSED_UPDATE_LIMIT {
                warn!(
                    "Neighbor {} missed {} update cycles, closing link",
                    link.id(),
                    MISSED_UPDATE_LIMIT
                );
                link.close();
            }
        }
        self.broadcast_update().await;
    }

    /// Local listening endpoint advertised in outbound frames.
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local.addr
    }
}
