//! IPv4 routing table with longest-prefix-match lookup.
//!
//! Routes are appended once at startup from the routing-table file and
//! never mutated afterwards.  Lookup masks both the entry's destination
//! and the probe address with the entry's mask and picks the match with
//! the numerically largest mask; ties fall to the earlier entry.  A single
//! pass over the list tracks the best candidate, so lookup never sorts or
//! copies the stored routes.

use core::fmt;

use spin::RwLock;

use ferrule_wire::types::Ipv4Addr;

/// A single entry in the routing table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteEntry {
    /// Destination network.  Stored as configured, masked on lookup.
    pub dest: Ipv4Addr,
    /// Gateway address.  Unspecified (`0.0.0.0`) means directly connected;
    /// the destination itself is then the next hop.
    pub gateway: Ipv4Addr,
    /// Network mask applied to both sides of the match.
    pub mask: Ipv4Addr,
    /// Name of the egress interface.
    pub iface: String,
}

impl RouteEntry {
    /// `true` if `dst` falls within this route's destination/mask.
    #[inline]
    pub fn matches(&self, dst: Ipv4Addr) -> bool {
        let mask = self.mask.to_u32_be();
        (dst.to_u32_be() & mask) == (self.dest.to_u32_be() & mask)
    }

    /// The address to resolve when forwarding to `dst` through this route:
    /// the gateway, or `dst` itself on a directly connected route.
    #[inline]
    pub fn next_hop(&self, dst: Ipv4Addr) -> Ipv4Addr {
        if self.gateway.is_unspecified() {
            dst
        } else {
            self.gateway
        }
    }
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t\t{}\t{}\t{}",
            self.dest, self.gateway, self.mask, self.iface
        )
    }
}

/// Inner state of the routing table, behind the lock.
struct RouteTableInner {
    entries: Vec<RouteEntry>,
}

/// Append-only routing table.
pub struct RouteTable {
    inner: RwLock<RouteTableInner>,
}

impl RouteTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(RouteTableInner {
                entries: Vec::new(),
            }),
        }
    }

    /// Append a route.  Entries keep their insertion order, which breaks
    /// ties between equal-length masks.
    pub fn add(&self, entry: RouteEntry) {
        log::debug!("route: added {entry}");
        let mut inner = self.inner.write();
        inner.entries.push(entry);
    }

    /// Longest-prefix-match lookup.
    ///
    /// Returns the matching entry whose mask is numerically largest, the
    /// earliest such entry on a tie, or `None` when nothing matches (a
    /// mask-zero default route matches everything and is therefore the
    /// last resort).
    pub fn lookup(&self, dst: Ipv4Addr) -> Option<RouteEntry> {
        let inner = self.inner.read();
        let mut best: Option<&RouteEntry> = None;
        for entry in &inner.entries {
            if !entry.matches(dst) {
                continue;
            }
            match best {
                Some(b) if entry.mask.to_u32_be() <= b.mask.to_u32_be() => {}
                _ => best = Some(entry),
            }
        }
        best.cloned()
    }

    /// Number of routes in the table.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// `true` if the table holds no routes.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Destination\tGateway\t\tMask\tIface")?;
        let inner = self.inner.read();
        for entry in &inner.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}
