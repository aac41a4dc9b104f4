//! Routing-update message encoding and decoding.
//!
//! Header (8 bytes): entry count (u16), sender port (u16), sender IPv4
//! (4 raw octets). Entry (12 bytes): destination IPv4 (4 octets),
//! destination port (u16), 2 reserved zero bytes, destination id (u16),
//! cost (u16).

use crate::{ServerId, WireError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::debug;

/// Frame header size in bytes
pub const HEADER_SIZE: usize = 8;

/// Per-destination entry size in bytes
pub const ENTRY_SIZE: usize = 12;

/// One advertised destination row in a routing update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAdvertisement {
    /// Destination server id
    pub id: ServerId,
    /// Destination endpoint
    pub addr: SocketAddrV4,
    /// Advertised cost from the sender to the destination
    pub cost: u16,
}

impl RouteAdvertisement {
    /// Create a new advertisement row
    pub fn new(id: ServerId, addr: SocketAddrV4, cost: u16) -> Self {
        Self { id, addr, cost }
    }
}

/// A complete routing-update message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingUpdate {
    /// Listening endpoint of the sending node
    pub sender: SocketAddrV4,
    /// Advertised rows, one per destination known to the sender
    pub entries: Vec<RouteAdvertisement>,
}

impl RoutingUpdate {
    /// Create a new routing update
    pub fn new(sender: SocketAddrV4, entries: Vec<RouteAdvertisement>) -> Self {
        Self { sender, entries }
    }

    /// Encoded frame size in bytes
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.entries.len() * ENTRY_SIZE
    }

    /// Encode the update to a contiguous frame
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let count =
            u16::try_from(self.entries.len()).map_err(|_| WireError::TooManyEntries(self.entries.len()))?;

        let mut buf = BytesMut::with_capacity(self.encoded_size());
        buf.put_u16(count);
        buf.put_u16(self.sender.port());
        buf.put_slice(&self.sender.ip().octets());

        for entry in &self.entries {
            buf.put_slice(&entry.addr.ip().octets());
            buf.put_u16(entry.addr.port());
            buf.put_slice(&[0u8; 2]); // reserved
            buf.put_u16(entry.id);
            buf.put_u16(entry.cost);
        }

        Ok(buf.freeze())
    }

    /// Decode one frame.
    ///
    /// The header's entry count is authoritative: exactly that many
    /// entries are consumed, and a frame carrying fewer bytes than the
    /// count requires fails with [`WireError::MalformedPacket`] instead
    /// of yielding a truncated update. Trailing bytes beyond the last
    /// entry are ignored.
    pub fn decode(frame: &[u8]) -> Result<Self, WireError> {
        let mut buf = frame;

        if buf.remaining() < HEADER_SIZE {
            debug!("Frame of {} bytes is shorter than the header", buf.remaining());
            return Err(WireError::MalformedPacket {
                expected: HEADER_SIZE,
                actual: buf.remaining(),
            });
        }

        let count = buf.get_u16() as usize;
        let sender_port = buf.get_u16();
        let mut octets = [0u8; 4];
        buf.copy_to_slice(&mut octets);
        let sender = SocketAddrV4::new(Ipv4Addr::from(octets), sender_port);

        if buf.remaining() < count * ENTRY_SIZE {
            debug!(
                "Frame of {} bytes truncates its {} declared entries",
                frame.len(),
                count
            );
            return Err(WireError::MalformedPacket {
                expected: HEADER_SIZE + count * ENTRY_SIZE,
                actual: frame.len(),
            });
        }

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            buf.copy_to_slice(&mut octets);
            let port = buf.get_u16();
            buf.advance(2); // reserved
            let id = buf.get_u16();
            let cost = buf.get_u16();
            entries.push(RouteAdvertisement::new(id, SocketAddrV4::new(Ipv4Addr::from(octets), port), cost));
        }

        Ok(Self { sender, entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(a: u8, b: u8, c: u8, d: u8, port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), port)
    }

    #[test]
    fn test_encode_layout() {
        let update = RoutingUpdate::new(
            addr(10, 0, 0, 1, 2000),
            vec![RouteAdvertisement::new(3, addr(10, 0, 0, 3, 2002), 7)],
        );

        let bytes = update.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + ENTRY_SIZE);
        // Header: count, sender port, sender ip
        assert_eq!(&bytes[..8], &[0, 1, 0x07, 0xD0, 10, 0, 0, 1]);
        // Entry: dest ip, dest port, reserved, dest id, cost
        assert_eq!(&bytes[8..], &[10, 0, 0, 3, 0x07, 0xD2, 0, 0, 0, 3, 0, 7]);
    }

    #[test]
    fn test_round_trip() {
        let update = RoutingUpdate::new(
            addr(192, 168, 1, 1, 4000),
            vec![
                RouteAdvertisement::new(1, addr(192, 168, 1, 1, 4000), 0),
                RouteAdvertisement::new(2, addr(192, 168, 1, 2, 4001), 5),
                RouteAdvertisement::new(3, addr(192, 168, 1, 3, 4002), crate::INFINITY),
            ],
        );

        let decoded = RoutingUpdate::decode(&update.encode().unwrap()).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_short_header_rejected() {
        let err = RoutingUpdate::decode(&[0, 2, 0x0F]).unwrap_err();
        assert!(matches!(err, WireError::MalformedPacket { expected: 8, actual: 3 }));
    }

    #[test]
    fn test_truncated_entries_rejected() {
        // Header claims two entries but only one full entry follows.
        let update = RoutingUpdate::new(
            addr(10, 0, 0, 1, 2000),
            vec![
                RouteAdvertisement::new(2, addr(10, 0, 0, 2, 2001), 4),
                RouteAdvertisement::new(3, addr(10, 0, 0, 3, 2002), 9),
            ],
        );
        let bytes = update.encode().unwrap();
        let truncated = &bytes[..HEADER_SIZE + ENTRY_SIZE + 5];

        let err = RoutingUpdate::decode(truncated).unwrap_err();
        assert!(matches!(err, WireError::MalformedPacket { .. }));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let update = RoutingUpdate::new(
            addr(10, 0, 0, 1, 2000),
            vec![RouteAdvertisement::new(2, addr(10, 0, 0, 2, 2001), 4)],
        );
        let mut bytes = update.encode().unwrap().to_vec();
        bytes.extend_from_slice(&[0xAA; 6]);

        let decoded = RoutingUpdate::decode(&bytes).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_reserved_bytes_zero() {
        let update = RoutingUpdate::new(
            addr(10, 0, 0, 1, 2000),
            vec![RouteAdvertisement::new(2, addr(10, 0, 0, 2, 2001), 4)],
        );
        let bytes = update.encode().unwrap();
        assert_eq!(&bytes[HEADER_SIZE + 6..HEADER_SIZE + 8], &[0, 0]);
    }
}
