//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Frame shorter than its header claims
    #[error("malformed packet: need {expected} bytes, have {actual}")]
    MalformedPacket {
        /// Bytes required by the header or entry count
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// Entry count does not fit the u16 header field
    #[error("too many entries for one frame: {0}")]
    TooManyEntries(usize),
}
