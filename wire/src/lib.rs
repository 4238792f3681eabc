//! Wire formats for the ferrule router: Ethernet II, ARP (RFC 826 over
//! Ethernet for IPv4), and IPv4 (RFC 791) headers.
//!
//! All multi-byte fields are network byte order on the wire; the codec
//! converts at the boundary.  Parsers take byte slices and return value
//! objects; builders write fixed layouts back into byte slices.  No header
//! is ever reinterpreted in place through a struct cast.
//!
//! The crate is `no_std` (plus `alloc` for frame assembly) so the codec has
//! no opinion about where the bytes come from.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod types;

use core::fmt;

// =============================================================================
// Ethernet
// =============================================================================

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETH_HEADER_LEN: usize = 14;
pub const ETH_ADDR_LEN: usize = 6;

// =============================================================================
// ARP (Ethernet + IPv4 only)
// =============================================================================

pub const ARP_HTYPE_ETHERNET: u16 = 1;
pub const ARP_PTYPE_IPV4: u16 = ETHERTYPE_IPV4;
pub const ARP_HLEN_ETHERNET: u8 = 6;
pub const ARP_PLEN_IPV4: u8 = 4;
pub const ARP_OPER_REQUEST: u16 = 1;
pub const ARP_OPER_REPLY: u16 = 2;
pub const ARP_BODY_LEN: usize = 28;

// =============================================================================
// IPv4
// =============================================================================

pub const IPV4_HEADER_LEN: usize = 20;

// =============================================================================
// Errors
// =============================================================================

/// Codec failure.  Every parser reports a buffer shorter than the declared
/// region as [`Truncated`](WireError::Truncated); the caller treats any
/// `WireError` as a malformed-frame drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireError {
    /// The buffer does not hold the fixed-size region being decoded.
    Truncated { need: usize, have: usize },
    /// An ARP body whose hardware/protocol constants are not
    /// Ethernet/IPv4 (HRD=1, PRO=0x0800, HLN=6, PLN=4).
    UnsupportedArp,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { need, have } => {
                write!(f, "truncated buffer ({have} bytes, need {need})")
            }
            Self::UnsupportedArp => write!(f, "unsupported ARP hardware/protocol format"),
        }
    }
}
