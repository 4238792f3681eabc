//! Ethernet II header codec.
//!
//! Fixed 14-byte layout: destination MAC, source MAC, EtherType.

use crate::types::MacAddr;
use crate::{ETH_ADDR_LEN, ETH_HEADER_LEN, WireError};

/// Parsed Ethernet II header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthernetHeader {
    /// Destination hardware address.
    pub dst: MacAddr,
    /// Source hardware address.
    pub src: MacAddr,
    /// Raw EtherType value (big-endian on the wire).
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Decode the header from the first 14 bytes of `frame`.
    pub fn parse(frame: &[u8]) -> Result<Self, WireError> {
        if frame.len() < ETH_HEADER_LEN {
            return Err(WireError::Truncated {
                need: ETH_HEADER_LEN,
                have: frame.len(),
            });
        }
        let mut dst = [0u8; ETH_ADDR_LEN];
        let mut src = [0u8; ETH_ADDR_LEN];
        dst.copy_from_slice(&frame[0..ETH_ADDR_LEN]);
        src.copy_from_slice(&frame[ETH_ADDR_LEN..ETH_ADDR_LEN * 2]);
        Ok(Self {
            dst: MacAddr(dst),
            src: MacAddr(src),
            ethertype: u16::from_be_bytes([frame[12], frame[13]]),
        })
    }

    /// Encode the header into the first 14 bytes of `frame`.
    ///
    /// Used by the forwarding path to rewrite the link-layer addressing of
    /// a frame in place before transmission.
    pub fn write(&self, frame: &mut [u8]) -> Result<(), WireError> {
        if frame.len() < ETH_HEADER_LEN {
            return Err(WireError::Truncated {
                need: ETH_HEADER_LEN,
                have: frame.len(),
            });
        }
        frame[0..ETH_ADDR_LEN].copy_from_slice(&self.dst.0);
        frame[ETH_ADDR_LEN..ETH_ADDR_LEN * 2].copy_from_slice(&self.src.0);
        frame[12..14].copy_from_slice(&self.ethertype.to_be_bytes());
        Ok(())
    }
}
