//! ARP body codec - RFC 826 over Ethernet for IPv4.
//!
//! Only the Ethernet/IPv4 flavour is supported: HRD=1, PRO=0x0800, HLN=6,
//! PLN=4.  A body carrying anything else fails to parse and is dropped
//! upstream.

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

use crate::ethernet::EthernetHeader;
use crate::types::{Ipv4Addr, MacAddr};
use crate::{
    ARP_BODY_LEN, ARP_HLEN_ETHERNET, ARP_HTYPE_ETHERNET, ARP_OPER_REPLY, ARP_OPER_REQUEST,
    ARP_PLEN_IPV4, ARP_PTYPE_IPV4, ETH_HEADER_LEN, ETHERTYPE_ARP, WireError,
};

/// Parsed ARP body (the 28 bytes following the Ethernet header).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpPacket {
    /// Operation: 1 = request, 2 = reply.  Kept raw; the handler decides
    /// what to do with unknown values.
    pub oper: u16,
    /// Sender hardware address.
    pub sha: MacAddr,
    /// Sender protocol address.
    pub sip: Ipv4Addr,
    /// Target hardware address.
    pub tha: MacAddr,
    /// Target protocol address.
    pub tip: Ipv4Addr,
}

impl ArpPacket {
    /// Build a request asking who holds `target_ip`.
    ///
    /// The target hardware address is set to broadcast, the convention the
    /// router uses on the wire for unresolved targets.
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            oper: ARP_OPER_REQUEST,
            sha: sender_mac,
            sip: sender_ip,
            tha: MacAddr::BROADCAST,
            tip: target_ip,
        }
    }

    /// Build a reply announcing that `sender_ip` is at `sender_mac`.
    pub fn reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            oper: ARP_OPER_REPLY,
            sha: sender_mac,
            sip: sender_ip,
            tha: target_mac,
            tip: target_ip,
        }
    }

    /// Decode an ARP body.
    ///
    /// Rejects bodies shorter than 28 bytes and bodies whose hardware or
    /// protocol constants are not Ethernet/IPv4.
    pub fn parse(body: &[u8]) -> Result<Self, WireError> {
        if body.len() < ARP_BODY_LEN {
            return Err(WireError::Truncated {
                need: ARP_BODY_LEN,
                have: body.len(),
            });
        }

        let htype = u16::from_be_bytes([body[0], body[1]]);
        let ptype = u16::from_be_bytes([body[2], body[3]]);
        let hlen = body[4];
        let plen = body[5];
        if htype != ARP_HTYPE_ETHERNET
            || ptype != ARP_PTYPE_IPV4
            || hlen != ARP_HLEN_ETHERNET
            || plen != ARP_PLEN_IPV4
        {
            return Err(WireError::UnsupportedArp);
        }

        Ok(Self {
            oper: u16::from_be_bytes([body[6], body[7]]),
            sha: MacAddr([body[8], body[9], body[10], body[11], body[12], body[13]]),
            sip: Ipv4Addr([body[14], body[15], body[16], body[17]]),
            tha: MacAddr([body[18], body[19], body[20], body[21], body[22], body[23]]),
            tip: Ipv4Addr([body[24], body[25], body[26], body[27]]),
        })
    }

    /// Encode the 28-byte body into `body`.
    pub fn write(&self, body: &mut [u8]) -> Result<(), WireError> {
        if body.len() < ARP_BODY_LEN {
            return Err(WireError::Truncated {
                need: ARP_BODY_LEN,
                have: body.len(),
            });
        }
        body[0..2].copy_from_slice(&ARP_HTYPE_ETHERNET.to_be_bytes());
        body[2..4].copy_from_slice(&ARP_PTYPE_IPV4.to_be_bytes());
        body[4] = ARP_HLEN_ETHERNET;
        body[5] = ARP_PLEN_IPV4;
        body[6..8].copy_from_slice(&self.oper.to_be_bytes());
        body[8..14].copy_from_slice(&self.sha.0);
        body[14..18].copy_from_slice(&self.sip.0);
        body[18..24].copy_from_slice(&self.tha.0);
        body[24..28].copy_from_slice(&self.tip.0);
        Ok(())
    }

    /// Assemble a complete 42-byte Ethernet frame carrying this body.
    pub fn encode_frame(&self, eth_dst: MacAddr, eth_src: MacAddr) -> Vec<u8> {
        let mut frame = vec![0u8; ETH_HEADER_LEN + ARP_BODY_LEN];
        let eth = EthernetHeader {
            dst: eth_dst,
            src: eth_src,
            ethertype: ETHERTYPE_ARP,
        };
        // Both writes are infallible at this size.
        let _ = eth.write(&mut frame);
        let _ = self.write(&mut frame[ETH_HEADER_LEN..]);
        frame
    }

    /// `true` if the operation field is a request.
    #[inline]
    pub const fn is_request(&self) -> bool {
        self.oper == ARP_OPER_REQUEST
    }

    /// `true` if the operation field is a reply.
    #[inline]
    pub const fn is_reply(&self) -> bool {
        self.oper == ARP_OPER_REPLY
    }
}
