//! The router facade: host binding, configuration, and the maintenance
//! ticker.
//!
//! The host owns the NIC sockets; the router only sees frames the host
//! delivers to [`Router::on_packet`] and emits frames back through the
//! [`PacketHost`] it was built with.  Topology comes from the host too:
//! [`Router::reset`] rebuilds the interface set from the host's port list
//! and the loaded interface-IP map.
//!
//! The ARP maintenance sweep can be driven two ways.  Threaded hosts call
//! [`Router::start`], which spawns a 1 Hz ticker that runs until
//! [`Router::shutdown`] (or drop).  Hosts with their own event loop skip
//! `start` and call [`Router::run_maintenance`] themselves at roughly
//! one-second intervals.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, error, info, warn};
use spin::Mutex;

use ferrule_wire::types::{Ipv4Addr, MacAddr};

use crate::arp_cache::{ArpCache, TICK_PERIOD};
use crate::config::{self, ConfigError};
use crate::iface::{IfaceTable, Interface};
use crate::route::{RouteEntry, RouteTable};

/// The packet-switching host the router is bound to.
///
/// The host calls [`Router::on_packet`] for every ingress frame; the
/// router calls `send_packet` for every egress frame.  Sends may be
/// synchronous; the router guarantees it never calls this with any
/// internal lock held.
pub trait PacketHost: Send + Sync {
    /// Transmit `frame` on the named interface.
    fn send_packet(&self, frame: &[u8], iface: &str);
}

/// One port reported by the host on a topology change.
#[derive(Clone, Debug)]
pub struct Port {
    /// Host-side interface name.
    pub name: String,
    /// Hardware address of the port.
    pub mac: MacAddr,
}

/// State shared between the packet path and the maintenance ticker.
pub(crate) struct RouterCore {
    host: Arc<dyn PacketHost>,
    pub(crate) ifaces: IfaceTable,
    pub(crate) routes: RouteTable,
    pub(crate) arp: ArpCache,
    /// Interface name to IPv4 address, from the interface-IP file.
    /// Consulted by `reset` when rebuilding the interface set.
    iface_ips: Mutex<HashMap<String, Ipv4Addr>>,
}

impl RouterCore {
    /// Hand a frame to the host for transmission.  Never called with a
    /// store lock held.
    pub(crate) fn send(&self, frame: &[u8], iface: &str) {
        self.host.send_packet(frame, iface);
    }
}

/// The software router.
///
/// All methods take `&self`; the router is shared between the host's I/O
/// context and the maintenance ticker.
pub struct Router {
    core: Arc<RouterCore>,
    stop: Arc<AtomicBool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Router {
    /// Create a router bound to `host`, with no interfaces and an empty
    /// routing table.
    pub fn new(host: Arc<dyn PacketHost>) -> Self {
        Self {
            core: Arc::new(RouterCore {
                host,
                ifaces: IfaceTable::new(),
                routes: RouteTable::new(),
                arp: ArpCache::new(),
                iface_ips: Mutex::new(HashMap::new()),
            }),
            stop: Arc::new(AtomicBool::new(false)),
            ticker: Mutex::new(None),
        }
    }

    /// Process one ingress frame received on `in_iface`.
    pub fn on_packet(&self, frame: &[u8], in_iface: &str) {
        self.core.on_packet(frame, in_iface);
    }

    /// Rebuild the interface set after a topology change.
    ///
    /// Clears the ARP store first, then installs one interface per port
    /// that has an address in the loaded interface-IP map.  Ports without
    /// one are skipped with a warning, like any unknown interface.
    pub fn reset(&self, ports: &[Port]) {
        info!("router: resetting with {} ports", ports.len());

        self.core.arp.clear();

        let mut ifaces = Vec::with_capacity(ports.len());
        {
            let map = self.core.iface_ips.lock();
            for port in ports {
                let Some(ip) = map.get(&port.name) else {
                    warn!(
                        "router: no IP configured for interface {}, skipping it",
                        port.name
                    );
                    continue;
                };
                ifaces.push(Interface {
                    name: port.name.clone(),
                    mac: port.mac,
                    ip: *ip,
                });
            }
        }
        self.core.ifaces.install(ifaces);

        debug!("router: interfaces now:\n{}", self.core.ifaces);
    }

    /// Map an interface name to the IPv4 address the router owns on it.
    ///
    /// Normally populated wholesale by [`load_iface_map`](Self::load_iface_map);
    /// exposed for hosts that configure programmatically.
    pub fn set_iface_addr(&self, name: &str, ip: Ipv4Addr) {
        self.core.iface_ips.lock().insert(name.to_owned(), ip);
    }

    /// Load the interface-IP map file (`iface dotted-quad` per line),
    /// replacing any previous map.
    pub fn load_iface_map(&self, path: &Path) -> Result<(), ConfigError> {
        let map = config::load_iface_map(path)?;
        info!("router: loaded {} interface addresses", map.len());
        *self.core.iface_ips.lock() = map;
        Ok(())
    }

    /// Load the routing-table file (`dest gw mask iface` per line),
    /// appending every entry.
    pub fn load_routing_table(&self, path: &Path) -> Result<(), ConfigError> {
        let entries = config::load_routing_table(path)?;
        info!("router: loaded {} routes", entries.len());
        for entry in entries {
            self.core.routes.add(entry);
        }
        Ok(())
    }

    /// Append a single route.
    pub fn add_route(&self, entry: RouteEntry) {
        self.core.routes.add(entry);
    }

    /// The routing table.
    pub fn routes(&self) -> &RouteTable {
        &self.core.routes
    }

    /// The interface registry.
    pub fn ifaces(&self) -> &IfaceTable {
        &self.core.ifaces
    }

    /// The ARP store.
    pub fn arp(&self) -> &ArpCache {
        &self.core.arp
    }

    /// Run one ARP maintenance sweep at time `now`.
    ///
    /// Called by the ticker thread once per second; cooperative hosts call
    /// it directly instead of [`start`](Self::start).
    pub fn run_maintenance(&self, now: Instant) {
        self.core.run_maintenance(now);
    }

    /// Spawn the 1 Hz maintenance ticker.  Idempotent while running.
    pub fn start(&self) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }
        self.stop.store(false, Ordering::SeqCst);

        let core = Arc::clone(&self.core);
        let stop = Arc::clone(&self.stop);
        let spawned = thread::Builder::new()
            .name("arp-maintenance".into())
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    thread::sleep(TICK_PERIOD);
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    core.run_maintenance(Instant::now());
                }
            });

        match spawned {
            Ok(handle) => *ticker = Some(handle),
            Err(e) => error!("router: failed to spawn maintenance ticker: {e}"),
        }
    }

    /// Signal the ticker to stop and wait for it to exit.
    ///
    /// The ticker observes the signal between ticks, so this blocks for at
    /// most one tick period.  Safe to call when the ticker never started.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self.ticker.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("router: maintenance ticker panicked");
            }
        }
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.shutdown();
    }
}
