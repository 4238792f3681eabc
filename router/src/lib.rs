//! ferrule - a software IPv4 router.
//!
//! The router sits between an external packet-switching host and the
//! network: the host hands it raw Ethernet frames per named interface
//! ([`Router::on_packet`]) and accepts frames back through the
//! [`PacketHost`] trait.  The router answers ARP requests for its own
//! addresses, learns from ARP replies, and forwards IPv4 datagrams with
//! TTL decrement, checksum rewriting, longest-prefix-match routing, and
//! next-hop resolution through a pending-request ARP cache.
//!
//! # Architecture
//!
//! - [`iface`] - the set of configured interfaces (name, MAC, IPv4),
//!   rebuilt wholesale on [`Router::reset`].
//! - [`route`] - append-only routing table with longest-prefix-match
//!   lookup.
//! - [`arp_cache`] - the concurrent ARP store: resolved entries with a
//!   30-second lifetime plus per-next-hop queues of frames awaiting
//!   resolution, swept by a 1 Hz maintenance tick.
//! - `forward` - the ingress pipeline: Ethernet demux, the ARP state
//!   machine, and the IPv4 forwarding decision.
//! - [`router`] - the [`Router`] facade binding everything to the host,
//!   including the maintenance ticker thread.
//! - [`config`] - loaders for the routing-table and interface-IP files.
//!
//! Wire formats live in the `ferrule-wire` crate, re-exported as
//! [`wire`].
//!
//! # Concurrency
//!
//! `on_packet` runs on the host's I/O thread; the maintenance tick runs on
//! a dedicated 1 Hz thread.  All shared mutable state is confined to the
//! ARP store behind a single mutex.  Store operations collect work under
//! the lock and return it; every `send_packet` call into the host happens
//! with no lock held.

pub mod arp_cache;
pub mod config;
mod forward;
pub mod iface;
pub mod route;
pub mod router;

pub use ferrule_wire as wire;

pub use arp_cache::{ArpCache, MaintenanceAction, PendingPacket, RequestId};
pub use config::ConfigError;
pub use iface::{IfaceTable, Interface};
pub use route::{RouteEntry, RouteTable};
pub use router::{PacketHost, Port, Router};
