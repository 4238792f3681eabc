//! ARP cache and pending-request manager.
//!
//! The store holds two kinds of state for the forwarding plane:
//!
//! - **Entries**: resolved `ip -> mac` mappings.  An entry is valid for
//!   [`ENTRY_TTL`] after insertion, is marked invalid by the first
//!   maintenance sweep past that age, and is reaped on the sweep that
//!   finds it invalid.  At most one valid entry exists per IP.
//! - **Requests**: outstanding resolutions, each owning the FIFO queue of
//!   fully built IPv4 frames waiting for that next hop.  At most one
//!   request exists per IP; it disappears either when a matching reply
//!   drains it or when it has been broadcast [`MAX_TIMES_SENT`] times
//!   without an answer.
//!
//! # Concurrency
//!
//! All state sits behind one mutex, held across each public operation and
//! across the whole maintenance sweep.  No operation performs I/O under
//! the lock: [`tick`](ArpCache::tick) returns the retransmissions to send
//! and [`insert_entry`](ArpCache::insert_entry) returns the queued frames
//! to drain, copied out under the lock, for the caller to transmit after
//! release.  Callers identify requests by [`RequestId`], never by
//! reference into the store.
//!
//! Time is passed in by the caller (monotonic [`Instant`]), which keeps
//! aging and retransmission deterministic under test.

use core::fmt;
use std::time::{Duration, Instant};

use log::debug;
use spin::Mutex;

use ferrule_wire::types::{Ipv4Addr, MacAddr};

// =============================================================================
// Constants
// =============================================================================

/// Lifetime of a resolved cache entry.
pub const ENTRY_TTL: Duration = Duration::from_secs(30);

/// Total broadcasts allowed per request (the immediate one included)
/// before its queued packets are abandoned.
pub const MAX_TIMES_SENT: u8 = 5;

/// Period of the maintenance sweep.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

// =============================================================================
// Entries and requests
// =============================================================================

/// A resolved `ip -> mac` mapping.
#[derive(Clone, Copy, Debug)]
pub struct ArpEntry {
    /// Protocol address of the neighbor.
    pub ip: Ipv4Addr,
    /// Hardware address of the neighbor.
    pub mac: MacAddr,
    /// When the mapping was learned (or last refreshed).
    added: Instant,
    /// Cleared once by the sweep when the entry ages past [`ENTRY_TTL`];
    /// the next sweep reaps it.
    valid: bool,
}

/// A frame held back until its next hop resolves.
///
/// The IPv4 rewrite (TTL, checksum) is already done; only the Ethernet
/// addressing is filled in at drain time.
#[derive(Clone, Debug)]
pub struct PendingPacket {
    /// The full Ethernet frame to transmit.
    pub frame: Vec<u8>,
    /// Name of the egress interface it will leave on.
    pub iface: String,
}

/// Stable identifier for an outstanding request.
///
/// Assigned monotonically and never reused, so a stale id held by a caller
/// can at worst name a request that no longer exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// An outstanding resolution and its packet queue.
#[derive(Debug)]
struct ArpRequest {
    id: RequestId,
    /// The address being resolved (the next hop of every queued packet).
    ip: Ipv4Addr,
    /// When the first packet was queued.
    first_queued: Instant,
    /// When the request was last broadcast.  Recorded for diagnostics;
    /// the sweep retransmits every tick regardless.
    last_sent: Option<Instant>,
    /// Broadcasts sent so far, the caller's immediate one included.
    times_sent: u8,
    /// Frames awaiting resolution, in arrival order.
    packets: Vec<PendingPacket>,
}

// =============================================================================
// Operation results
// =============================================================================

/// Result of [`ArpCache::queue_request`].
#[derive(Debug)]
pub struct QueueOutcome {
    /// The request the packet was queued on.
    pub id: RequestId,
    /// `true` when this call created the request; the caller must emit
    /// one broadcast immediately, which the store has already counted.
    pub send_now: bool,
}

/// A request whose target just resolved, returned by
/// [`ArpCache::insert_entry`].
///
/// `packets` is copied out under the store lock so the caller can transmit
/// after release, then discard the request with
/// [`ArpCache::remove_request`].
#[derive(Debug)]
pub struct ResolvedRequest {
    pub id: RequestId,
    /// The queued frames in FIFO order.
    pub packets: Vec<PendingPacket>,
}

/// Work produced by the maintenance sweep, executed by the caller outside
/// the store lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaintenanceAction {
    /// Broadcast an ARP request for `target_ip` out of `iface`.
    SendRequest { target_ip: Ipv4Addr, iface: String },
}

// =============================================================================
// ArpCache
// =============================================================================

/// Inner state of the store, behind the mutex.
struct CacheInner {
    entries: Vec<ArpEntry>,
    requests: Vec<ArpRequest>,
    next_request_id: u64,
}

/// The ARP cache and pending-request manager.
///
/// See [module documentation](self) for the concurrency contract.
pub struct ArpCache {
    inner: Mutex<CacheInner>,
}

impl ArpCache {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: Vec::new(),
                requests: Vec::new(),
                next_request_id: 1,
            }),
        }
    }

    /// Look up the valid entry for `ip`.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        let inner = self.inner.lock();
        inner
            .entries
            .iter()
            .find(|e| e.valid && e.ip == ip)
            .map(|e| e.mac)
    }

    /// Queue `frame` until `ip` resolves.
    ///
    /// Creates the request if none exists for `ip`; the packet is always
    /// appended to the request's queue.  On creation the store counts one
    /// broadcast on the caller's behalf and reports `send_now`, so the
    /// immediate request and the sweep's retransmissions share the
    /// [`MAX_TIMES_SENT`] budget.
    pub fn queue_request(
        &self,
        ip: Ipv4Addr,
        frame: Vec<u8>,
        iface: &str,
        now: Instant,
    ) -> QueueOutcome {
        let mut inner = self.inner.lock();

        if let Some(req) = inner.requests.iter_mut().find(|r| r.ip == ip) {
            debug!(
                "arp: packet {} queued awaiting {} (via {})",
                req.packets.len() + 1,
                req.ip,
                iface
            );
            req.packets.push(PendingPacket {
                frame,
                iface: iface.to_owned(),
            });
            QueueOutcome {
                id: req.id,
                send_now: false,
            }
        } else {
            let id = RequestId(inner.next_request_id);
            inner.next_request_id += 1;

            debug!("arp: new request for {} via {} (id {:?})", ip, iface, id);
            inner.requests.push(ArpRequest {
                id,
                ip,
                first_queued: now,
                last_sent: Some(now),
                times_sent: 1,
                packets: vec![PendingPacket {
                    frame,
                    iface: iface.to_owned(),
                }],
            });
            QueueOutcome { id, send_now: true }
        }
    }

    /// Record that `ip` is at `mac`.
    ///
    /// A still-valid entry for `ip` is refreshed in place, keeping the
    /// one-valid-entry-per-IP invariant; otherwise a fresh entry is
    /// appended.  If a request for `ip` is outstanding, its id and queued
    /// packets are returned for the caller to drain; the request itself
    /// stays in the store until [`remove_request`](Self::remove_request).
    pub fn insert_entry(
        &self,
        mac: MacAddr,
        ip: Ipv4Addr,
        now: Instant,
    ) -> Option<ResolvedRequest> {
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.iter_mut().find(|e| e.valid && e.ip == ip) {
            entry.mac = mac;
            entry.added = now;
        } else {
            inner.entries.push(ArpEntry {
                ip,
                mac,
                added: now,
                valid: true,
            });
        }
        debug!("arp: learned {ip} is at {mac}");

        inner
            .requests
            .iter()
            .find(|r| r.ip == ip)
            .map(|r| ResolvedRequest {
                id: r.id,
                packets: r.packets.clone(),
            })
    }

    /// Remove a request after draining it.  A stale id is a no-op.
    pub fn remove_request(&self, id: RequestId) {
        let mut inner = self.inner.lock();
        inner.requests.retain(|r| r.id != id);
    }

    /// Drop all entries and requests (topology reset).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.requests.clear();
    }

    /// Run one maintenance sweep.
    ///
    /// Under a single lock acquisition: entries older than [`ENTRY_TTL`]
    /// are invalidated, every live request either produces a retransmit
    /// action or is abandoned at the send cap, and invalid entries are
    /// reaped.  The returned actions are transmitted by the caller with no
    /// lock held.
    pub fn tick(&self, now: Instant) -> Vec<MaintenanceAction> {
        let mut inner = self.inner.lock();
        let mut actions = Vec::new();

        for entry in inner.entries.iter_mut() {
            if entry.valid && now.duration_since(entry.added) > ENTRY_TTL {
                debug!("arp: entry for {} aged out", entry.ip);
                entry.valid = false;
            }
        }

        inner.requests.retain_mut(|req| {
            if req.times_sent >= MAX_TIMES_SENT {
                debug!(
                    "arp: {} unresolved after {} requests, abandoning {} queued packets",
                    req.ip,
                    req.times_sent,
                    req.packets.len()
                );
                return false;
            }
            // The broadcast leaves on the egress interface of the oldest
            // queued packet.  A request with no packets has nowhere to
            // send from and nothing to deliver.
            let Some(first) = req.packets.first() else {
                return false;
            };
            actions.push(MaintenanceAction::SendRequest {
                target_ip: req.ip,
                iface: first.iface.clone(),
            });
            req.last_sent = Some(now);
            req.times_sent += 1;
            true
        });

        inner.entries.retain(|e| e.valid);

        actions
    }

    /// Number of cache entries, invalid-but-unreaped ones included.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Number of outstanding requests.
    pub fn request_count(&self) -> usize {
        self.inner.lock().requests.len()
    }
}

impl Default for ArpCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArpCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        let now = Instant::now();

        writeln!(f, "\nMAC            IP         AGE                       VALID")?;
        writeln!(f, "-----------------------------------------------------------")?;
        for entry in &inner.entries {
            writeln!(
                f,
                "{}   {}   {} seconds   {}",
                entry.mac,
                entry.ip,
                now.saturating_duration_since(entry.added).as_secs(),
                entry.valid
            )?;
        }
        for req in &inner.requests {
            let last_sent = match req.last_sent {
                Some(at) => now.saturating_duration_since(at).as_secs(),
                None => 0,
            };
            writeln!(
                f,
                "(pending)   {}   {} packets   sent {} time(s), last {} s ago, waiting {} s",
                req.ip,
                req.packets.len(),
                req.times_sent,
                last_sent,
                now.saturating_duration_since(req.first_queued).as_secs()
            )?;
        }
        Ok(())
    }
}
