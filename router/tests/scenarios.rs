//! End-to-end forwarding scenarios driven through the public API.
//!
//! A recording host captures every egress `(frame, iface)` pair so each
//! scenario can assert on exact wire contents.  Maintenance sweeps are
//! driven directly with synthetic instants; nothing here sleeps except
//! the ticker lifecycle check.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ferrule_router::wire::arp::ArpPacket;
use ferrule_router::wire::ethernet::EthernetHeader;
use ferrule_router::wire::ipv4::{self, Ipv4Header};
use ferrule_router::wire::types::{Ipv4Addr, MacAddr};
use ferrule_router::wire::{
    ARP_OPER_REPLY, ARP_OPER_REQUEST, ETH_HEADER_LEN, ETHERTYPE_ARP, ETHERTYPE_IPV4,
};
use ferrule_router::{PacketHost, Port, RouteEntry, Router};

const RTR_MAC: MacAddr = MacAddr([0xaa, 0, 0, 0, 0, 0x01]);
const HOST_MAC: MacAddr = MacAddr([0xbb, 0, 0, 0, 0, 0x02]);
const GW_MAC: MacAddr = MacAddr([0xcc, 0, 0, 0, 0, 0x03]);

const RTR_IP: Ipv4Addr = Ipv4Addr([10, 0, 0, 1]);
const HOST_IP: Ipv4Addr = Ipv4Addr([10, 0, 0, 2]);

// =============================================================================
// Recording host
// =============================================================================

#[derive(Default)]
struct RecordingHost {
    sent: Mutex<Vec<(Vec<u8>, String)>>,
}

impl PacketHost for RecordingHost {
    fn send_packet(&self, frame: &[u8], iface: &str) {
        self.sent
            .lock()
            .unwrap()
            .push((frame.to_vec(), iface.to_owned()));
    }
}

impl RecordingHost {
    fn sent(&self) -> Vec<(Vec<u8>, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn arp_broadcasts(&self) -> Vec<ArpPacket> {
        self.sent()
            .iter()
            .filter_map(|(frame, _)| {
                let eth = EthernetHeader::parse(frame).ok()?;
                if eth.ethertype != ETHERTYPE_ARP {
                    return None;
                }
                ArpPacket::parse(&frame[ETH_HEADER_LEN..]).ok()
            })
            .collect()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A router with one interface: eth0, MAC aa:00:00:00:00:01, IP 10.0.0.1.
fn router_with_eth0() -> (Router, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::default());
    let router = Router::new(host.clone());
    router.set_iface_addr("eth0", RTR_IP);
    router.reset(&[Port {
        name: "eth0".to_owned(),
        mac: RTR_MAC,
    }]);
    (router, host)
}

/// Adds `192.168.1.0/24 via 10.0.0.2 dev eth0`.
fn add_lan_route(router: &Router) {
    router.add_route(RouteEntry {
        dest: Ipv4Addr([192, 168, 1, 0]),
        gateway: HOST_IP,
        mask: Ipv4Addr([255, 255, 255, 0]),
        iface: "eth0".to_owned(),
    });
}

fn arp_request_frame(sha: MacAddr, sip: Ipv4Addr, tip: Ipv4Addr) -> Vec<u8> {
    let body = ArpPacket {
        oper: ARP_OPER_REQUEST,
        sha,
        sip,
        tha: MacAddr::ZERO,
        tip,
    };
    body.encode_frame(MacAddr::BROADCAST, sha)
}

fn arp_reply_frame(sha: MacAddr, sip: Ipv4Addr, tha: MacAddr, tip: Ipv4Addr) -> Vec<u8> {
    ArpPacket::reply(sha, sip, tha, tip).encode_frame(tha, sha)
}

/// A valid UDP-carrying IPv4 frame with an 8-byte payload of `tag` bytes.
fn ipv4_frame(
    eth_dst: MacAddr,
    eth_src: MacAddr,
    src: Ipv4Addr,
    dst: Ipv4Addr,
    ttl: u8,
    tag: u8,
) -> Vec<u8> {
    let payload = [tag; 8];
    let mut frame = vec![0u8; ETH_HEADER_LEN + 20 + payload.len()];

    let eth = EthernetHeader {
        dst: eth_dst,
        src: eth_src,
        ethertype: ETHERTYPE_IPV4,
    };
    eth.write(&mut frame).unwrap();

    let header = &mut frame[ETH_HEADER_LEN..];
    header[0] = 0x45;
    header[2..4].copy_from_slice(&((20 + payload.len()) as u16).to_be_bytes());
    header[4..6].copy_from_slice(&0x1234u16.to_be_bytes());
    header[8] = ttl;
    header[9] = 17;
    header[12..16].copy_from_slice(&src.0);
    header[16..20].copy_from_slice(&dst.0);
    ipv4::finalize_checksum(&mut header[..20]).unwrap();

    frame[ETH_HEADER_LEN + 20..].copy_from_slice(&payload);
    frame
}

// =============================================================================
// ARP request handling
// =============================================================================

#[test]
fn answers_arp_request_for_its_own_address() {
    let (router, host) = router_with_eth0();

    router.on_packet(&arp_request_frame(HOST_MAC, HOST_IP, RTR_IP), "eth0");

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    let (frame, iface) = &sent[0];
    assert_eq!(iface, "eth0");

    let eth = EthernetHeader::parse(frame).unwrap();
    assert_eq!(eth.dst, HOST_MAC);
    assert_eq!(eth.src, RTR_MAC);
    assert_eq!(eth.ethertype, ETHERTYPE_ARP);

    let arp = ArpPacket::parse(&frame[ETH_HEADER_LEN..]).unwrap();
    assert_eq!(arp.oper, ARP_OPER_REPLY);
    assert_eq!(arp.sha, RTR_MAC);
    assert_eq!(arp.sip, RTR_IP);
    assert_eq!(arp.tha, HOST_MAC);
    assert_eq!(arp.tip, HOST_IP);
}

#[test]
fn ignores_arp_request_for_a_foreign_address() {
    let (router, host) = router_with_eth0();

    router.on_packet(
        &arp_request_frame(HOST_MAC, HOST_IP, Ipv4Addr([10, 0, 0, 9])),
        "eth0",
    );

    assert_eq!(host.sent_count(), 0);
}

// =============================================================================
// Forwarding
// =============================================================================

#[test]
fn cache_miss_queues_the_frame_and_broadcasts_one_request() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7),
        "eth0",
    );

    // Exactly one egress: the ARP broadcast for the gateway.  The datagram
    // itself is buffered.
    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    let (frame, iface) = &sent[0];
    assert_eq!(iface, "eth0");

    let eth = EthernetHeader::parse(frame).unwrap();
    assert!(eth.dst.is_broadcast());
    assert_eq!(eth.src, RTR_MAC);

    let arp = ArpPacket::parse(&frame[ETH_HEADER_LEN..]).unwrap();
    assert_eq!(arp.oper, ARP_OPER_REQUEST);
    assert_eq!(arp.sha, RTR_MAC);
    assert_eq!(arp.sip, RTR_IP);
    assert_eq!(arp.tip, HOST_IP);

    assert_eq!(router.arp().request_count(), 1);
}

#[test]
fn arp_reply_drains_the_queue() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7),
        "eth0",
    );
    router.on_packet(&arp_reply_frame(GW_MAC, HOST_IP, RTR_MAC, RTR_IP), "eth0");

    let sent = host.sent();
    assert_eq!(sent.len(), 2); // the broadcast, then the forwarded datagram

    let (frame, iface) = &sent[1];
    assert_eq!(iface, "eth0");

    let eth = EthernetHeader::parse(frame).unwrap();
    assert_eq!(eth.src, RTR_MAC);
    assert_eq!(eth.dst, GW_MAC);
    assert_eq!(eth.ethertype, ETHERTYPE_IPV4);

    let l3 = &frame[ETH_HEADER_LEN..];
    let ip = Ipv4Header::parse(l3).unwrap();
    assert_eq!(ip.ttl, 63);
    assert_eq!(ip.dst, Ipv4Addr([192, 168, 1, 5]));
    assert!(ipv4::verify_checksum(&l3[..20]));

    // The queue is gone; the mapping is cached.
    assert_eq!(router.arp().request_count(), 0);
    assert_eq!(router.arp().lookup(HOST_IP), Some(GW_MAC));
}

#[test]
fn queued_frames_drain_in_arrival_order() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    for (last_octet, tag) in [(5u8, 0x11u8), (6, 0x22), (7, 0x33)] {
        router.on_packet(
            &ipv4_frame(
                RTR_MAC,
                HOST_MAC,
                HOST_IP,
                Ipv4Addr([192, 168, 1, last_octet]),
                64,
                tag,
            ),
            "eth0",
        );
    }

    // One broadcast total; the second and third misses coalesce onto the
    // existing request.
    assert_eq!(host.sent_count(), 1);

    router.on_packet(&arp_reply_frame(GW_MAC, HOST_IP, RTR_MAC, RTR_IP), "eth0");

    let sent = host.sent();
    assert_eq!(sent.len(), 4);
    for (i, expected_tag) in [0x11u8, 0x22, 0x33].iter().enumerate() {
        let (frame, _) = &sent[1 + i];
        assert_eq!(frame[frame.len() - 1], *expected_tag);
        let eth = EthernetHeader::parse(frame).unwrap();
        assert_eq!(eth.dst, GW_MAC);
    }
}

#[test]
fn cache_hit_forwards_without_arp_traffic() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    // Prime the cache.
    router.on_packet(&arp_reply_frame(GW_MAC, HOST_IP, RTR_MAC, RTR_IP), "eth0");
    assert_eq!(host.sent_count(), 0);

    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7),
        "eth0",
    );

    let sent = host.sent();
    assert_eq!(sent.len(), 1);
    let eth = EthernetHeader::parse(&sent[0].0).unwrap();
    assert_eq!(eth.ethertype, ETHERTYPE_IPV4);
    assert_eq!(eth.dst, GW_MAC);
}

// =============================================================================
// Drops
// =============================================================================

#[test]
fn drops_on_ttl_expiry_without_any_egress() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 1, 7),
        "eth0",
    );

    assert_eq!(host.sent_count(), 0);
    assert_eq!(router.arp().request_count(), 0);
}

#[test]
fn drops_frames_not_addressed_to_the_router() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    let other_mac = MacAddr([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
    router.on_packet(
        &ipv4_frame(other_mac, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7),
        "eth0",
    );

    // Same filter applies before ARP dispatch.
    let mut request = arp_request_frame(HOST_MAC, HOST_IP, RTR_IP);
    request[0..6].copy_from_slice(other_mac.as_bytes());
    router.on_packet(&request, "eth0");

    assert_eq!(host.sent_count(), 0);
}

#[test]
fn drops_frames_from_an_unknown_interface() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7),
        "eth7",
    );

    assert_eq!(host.sent_count(), 0);
}

#[test]
fn drops_on_checksum_mismatch() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    let mut frame = ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7);
    frame[ETH_HEADER_LEN + 8] = 63; // patch the TTL without fixing the sum
    router.on_packet(&frame, "eth0");

    assert_eq!(host.sent_count(), 0);
}

#[test]
fn drops_datagrams_addressed_to_the_router() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, RTR_IP, 64, 7),
        "eth0",
    );

    assert_eq!(host.sent_count(), 0);
}

#[test]
fn drops_when_no_route_matches() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([8, 8, 8, 8]), 64, 7),
        "eth0",
    );

    assert_eq!(host.sent_count(), 0);
    assert_eq!(router.arp().request_count(), 0);
}

#[test]
fn drops_truncated_and_foreign_frames() {
    let (router, host) = router_with_eth0();

    // Shorter than an Ethernet header.
    router.on_packet(&[0u8; 10], "eth0");

    // EtherType neither ARP nor IPv4.
    let mut frame = ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7);
    frame[12..14].copy_from_slice(&0x86ddu16.to_be_bytes());
    router.on_packet(&frame, "eth0");

    assert_eq!(host.sent_count(), 0);
}

// =============================================================================
// Maintenance: retransmission and the send cap
// =============================================================================

#[test]
fn request_stops_after_five_broadcasts() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7),
        "eth0",
    );

    let t0 = Instant::now();
    for n in 1..=8u64 {
        router.run_maintenance(t0 + Duration::from_secs(n));
    }

    // The inline broadcast plus four sweep-driven retransmissions, then
    // the request is abandoned and later sweeps emit nothing.
    let broadcasts = host.arp_broadcasts();
    assert_eq!(broadcasts.len(), 5);
    for arp in &broadcasts {
        assert_eq!(arp.oper, ARP_OPER_REQUEST);
        assert_eq!(arp.tip, HOST_IP);
    }
    assert_eq!(host.sent_count(), 5); // the queued datagram never left
    assert_eq!(router.arp().request_count(), 0);

    // A late reply finds nothing to drain.
    router.on_packet(&arp_reply_frame(GW_MAC, HOST_IP, RTR_MAC, RTR_IP), "eth0");
    assert_eq!(host.sent_count(), 5);
}

#[test]
fn reply_between_sweeps_cancels_retransmission() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7),
        "eth0",
    );
    router.on_packet(&arp_reply_frame(GW_MAC, HOST_IP, RTR_MAC, RTR_IP), "eth0");

    let before = host.sent_count();
    let t0 = Instant::now();
    router.run_maintenance(t0 + Duration::from_secs(1));
    assert_eq!(host.sent_count(), before);
}

#[test]
fn cached_entry_expires_and_resolution_starts_over() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(&arp_reply_frame(GW_MAC, HOST_IP, RTR_MAC, RTR_IP), "eth0");
    assert_eq!(router.arp().lookup(HOST_IP), Some(GW_MAC));

    // Sweep past the entry lifetime.
    router.run_maintenance(Instant::now() + Duration::from_secs(31));
    assert_eq!(router.arp().lookup(HOST_IP), None);

    // The next forward misses the cache and broadcasts again.
    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7),
        "eth0",
    );
    assert_eq!(host.arp_broadcasts().len(), 1);
}

// =============================================================================
// Reset and lifecycle
// =============================================================================

#[test]
fn reset_clears_the_arp_store_and_skips_unconfigured_ports() {
    let (router, host) = router_with_eth0();
    add_lan_route(&router);

    router.on_packet(&arp_reply_frame(GW_MAC, HOST_IP, RTR_MAC, RTR_IP), "eth0");
    assert_eq!(router.arp().lookup(HOST_IP), Some(GW_MAC));

    // eth1 has no address in the map: it is skipped, eth0 survives.
    router.reset(&[
        Port {
            name: "eth0".to_owned(),
            mac: RTR_MAC,
        },
        Port {
            name: "eth1".to_owned(),
            mac: MacAddr([0xaa, 0, 0, 0, 0, 0x09]),
        },
    ]);

    assert_eq!(router.ifaces().len(), 1);
    assert_eq!(router.arp().lookup(HOST_IP), None);

    // Frames on the skipped port are dropped as unknown-interface.
    router.on_packet(
        &ipv4_frame(RTR_MAC, HOST_MAC, HOST_IP, Ipv4Addr([192, 168, 1, 5]), 64, 7),
        "eth1",
    );
    assert_eq!(host.sent_count(), 0);
}

#[test]
fn ticker_starts_and_shuts_down_promptly() {
    let (router, _host) = router_with_eth0();

    let begun = Instant::now();
    router.start();
    router.shutdown();
    assert!(begun.elapsed() < Duration::from_secs(3));

    // A second shutdown with no ticker running is a no-op.
    router.shutdown();
}
