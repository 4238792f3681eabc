//! The forwarding engine: Ethernet demux, the ARP state machine, and the
//! IPv4 forwarding decision.
//!
//! Every ingress frame passes through [`RouterCore::on_packet`], which
//! resolves the ingress interface, filters by EtherType and link-layer
//! destination, and dispatches to the ARP or IPv4 handler.  Every
//! malformed or unroutable input is a silent drop with a debug log; the
//! engine never panics on data-plane input and never touches the host
//! while holding a store lock.

use std::time::Instant;

use log::debug;

use ferrule_wire::arp::ArpPacket;
use ferrule_wire::ethernet::EthernetHeader;
use ferrule_wire::ipv4::{self, Ipv4Header};
use ferrule_wire::types::{EtherType, Ipv4Addr, MacAddr};
use ferrule_wire::{ETH_HEADER_LEN, ETHERTYPE_IPV4, IPV4_HEADER_LEN};

use crate::arp_cache::{MaintenanceAction, ResolvedRequest};
use crate::iface::Interface;
use crate::router::RouterCore;

impl RouterCore {
    /// Ingress entry point: classify, filter, dispatch.
    pub(crate) fn on_packet(&self, frame: &[u8], in_iface: &str) {
        debug!("forward: {} byte frame on {}", frame.len(), in_iface);

        let Some(iface) = self.ifaces.find_by_name(in_iface) else {
            debug!("forward: unknown ingress interface {in_iface}, dropping");
            return;
        };

        let eth = match EthernetHeader::parse(frame) {
            Ok(eth) => eth,
            Err(e) => {
                debug!("forward: {e}, dropping");
                return;
            }
        };

        let Some(ethertype) = EtherType::from_u16(eth.ethertype) else {
            debug!(
                "forward: EtherType 0x{:04x} is neither ARP nor IPv4, dropping",
                eth.ethertype
            );
            return;
        };

        // Link-layer filter: our MAC or broadcast, checked before any
        // protocol handling.
        if eth.dst != iface.mac && !eth.dst.is_broadcast() {
            debug!(
                "forward: frame for {} is not for {} ({}), dropping",
                eth.dst, iface.name, iface.mac
            );
            return;
        }

        match ethertype {
            EtherType::Arp => self.handle_arp(frame, &iface),
            EtherType::Ipv4 => self.handle_ipv4(frame, &iface),
        }
    }

    // =========================================================================
    // ARP
    // =========================================================================

    /// Handle an ARP frame received on `in_iface`.
    fn handle_arp(&self, frame: &[u8], in_iface: &Interface) {
        let arp = match ArpPacket::parse(&frame[ETH_HEADER_LEN..]) {
            Ok(arp) => arp,
            Err(e) => {
                debug!("arp: {e}, dropping");
                return;
            }
        };

        if arp.is_request() {
            // Answer only for the address we own on the ingress interface.
            if arp.tip != in_iface.ip {
                debug!(
                    "arp: request for {} is not for {} ({}), dropping",
                    arp.tip, in_iface.name, in_iface.ip
                );
                return;
            }

            debug!("arp: answering {} who-has {}", arp.sip, arp.tip);
            let reply = ArpPacket::reply(in_iface.mac, in_iface.ip, arp.sha, arp.sip);
            let frame = reply.encode_frame(arp.sha, in_iface.mac);
            self.send(&frame, &in_iface.name);
        } else if arp.is_reply() {
            debug!("arp: reply {} is-at {}", arp.sip, arp.sha);
            if let Some(resolved) = self.arp.insert_entry(arp.sha, arp.sip, Instant::now()) {
                self.drain_pending(resolved, arp.sha);
            }
        } else {
            debug!("arp: operation {} is neither request nor reply, dropping", arp.oper);
        }
    }

    /// Transmit the frames that were waiting for `mac`, oldest first, then
    /// discard their request.  Runs with no store lock held.
    fn drain_pending(&self, resolved: ResolvedRequest, mac: MacAddr) {
        for mut pending in resolved.packets {
            let Some(out) = self.ifaces.find_by_name(&pending.iface) else {
                debug!(
                    "arp: egress interface {} is gone, dropping queued packet",
                    pending.iface
                );
                continue;
            };
            let eth = EthernetHeader {
                dst: mac,
                src: out.mac,
                ethertype: ETHERTYPE_IPV4,
            };
            if let Err(e) = eth.write(&mut pending.frame) {
                debug!("arp: queued packet unusable ({e}), dropping");
                continue;
            }
            debug!("arp: forwarding queued packet on {}", pending.iface);
            self.send(&pending.frame, &pending.iface);
        }
        self.arp.remove_request(resolved.id);
    }

    /// Broadcast an ARP request for `target_ip` out of `out`.
    fn send_arp_request(&self, out: &Interface, target_ip: Ipv4Addr) {
        debug!("arp: who-has {} tell {} ({})", target_ip, out.ip, out.name);
        let request = ArpPacket::request(out.mac, out.ip, target_ip);
        let frame = request.encode_frame(MacAddr::BROADCAST, out.mac);
        self.send(&frame, &out.name);
    }

    // =========================================================================
    // IPv4
    // =========================================================================

    /// Handle an IPv4 frame received on `in_iface`: validate, rewrite
    /// TTL and checksum, route, and either transmit or queue behind an
    /// ARP resolution.
    fn handle_ipv4(&self, frame: &[u8], in_iface: &Interface) {
        if frame.len() < ETH_HEADER_LEN + IPV4_HEADER_LEN {
            debug!(
                "ipv4: frame too short for a datagram ({} bytes), dropping",
                frame.len()
            );
            return;
        }
        let l3 = &frame[ETH_HEADER_LEN..];

        let ip = match Ipv4Header::parse(l3) {
            Ok(ip) => ip,
            Err(e) => {
                debug!("ipv4: {e}, dropping");
                return;
            }
        };

        if ip.version != 4 {
            debug!("ipv4: bad version {}, dropping", ip.version);
            return;
        }
        // Options are unsupported; anything with an extended header is
        // refused rather than forwarded with an unverified option block.
        if ip.ihl != 5 {
            debug!("ipv4: IHL {} unsupported, dropping", ip.ihl);
            return;
        }
        if (ip.total_len as usize) < IPV4_HEADER_LEN {
            debug!("ipv4: total length {} shorter than header, dropping", ip.total_len);
            return;
        }
        if (ip.total_len as usize) > l3.len() {
            debug!(
                "ipv4: total length {} exceeds payload ({} bytes), dropping",
                ip.total_len,
                l3.len()
            );
            return;
        }

        if !ipv4::verify_checksum(&l3[..IPV4_HEADER_LEN]) {
            debug!("ipv4: header checksum mismatch, dropping");
            return;
        }

        // The router does not terminate datagrams.
        if self.ifaces.is_local_ip(ip.dst) {
            debug!("ipv4: {} is addressed to the router, dropping", ip.dst);
            return;
        }

        if ip.ttl <= 1 {
            debug!("ipv4: TTL expired for {} -> {}, dropping", ip.src, ip.dst);
            return;
        }

        let Some(route) = self.routes.lookup(ip.dst) else {
            debug!("ipv4: no route to {}, dropping", ip.dst);
            return;
        };
        let Some(out) = self.ifaces.find_by_name(&route.iface) else {
            debug!(
                "ipv4: route egress {} is not a configured interface, dropping",
                route.iface
            );
            return;
        };

        // Rewrite the datagram before it is either sent or queued, so a
        // queued frame is ready to go the moment its next hop resolves.
        let mut out_frame = frame.to_vec();
        let header = &mut out_frame[ETH_HEADER_LEN..ETH_HEADER_LEN + IPV4_HEADER_LEN];
        let _ = ipv4::set_ttl(header, ip.ttl - 1);
        let _ = ipv4::finalize_checksum(header);

        let next_hop = route.next_hop(ip.dst);
        match self.arp.lookup(next_hop) {
            Some(mac) => {
                let eth = EthernetHeader {
                    dst: mac,
                    src: out.mac,
                    ethertype: ETHERTYPE_IPV4,
                };
                let _ = eth.write(&mut out_frame);
                debug!(
                    "ipv4: forwarding {} -> {} from {} via {} on {}",
                    ip.src, ip.dst, in_iface.name, next_hop, route.iface
                );
                self.send(&out_frame, &route.iface);
            }
            None => {
                let outcome =
                    self.arp
                        .queue_request(next_hop, out_frame, &route.iface, Instant::now());
                if outcome.send_now {
                    self.send_arp_request(&out, next_hop);
                } else {
                    debug!(
                        "ipv4: {} already resolving, packet from {} queued",
                        next_hop, in_iface.name
                    );
                }
            }
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Execute one ARP maintenance sweep: collect the store's retransmit
    /// actions under its lock, then transmit them here with no lock held.
    pub(crate) fn run_maintenance(&self, now: Instant) {
        for action in self.arp.tick(now) {
            match action {
                MaintenanceAction::SendRequest { target_ip, iface } => {
                    let Some(out) = self.ifaces.find_by_name(&iface) else {
                        debug!(
                            "arp: egress interface {iface} is gone, skipping retransmit"
                        );
                        continue;
                    };
                    self.send_arp_request(&out, target_ip);
                }
            }
        }
    }
}
