//! The set of configured router interfaces.
//!
//! An [`Interface`] binds a host-side port name to the MAC and IPv4
//! address the router speaks with on that port.  The set is replaced
//! wholesale by [`Router::reset`](crate::router::Router::reset) when the
//! host reports a topology change and is read-mostly between resets, so it
//! sits behind a reader-writer lock.

use core::fmt;

use spin::RwLock;

use ferrule_wire::types::{Ipv4Addr, MacAddr};

/// One configured interface.
///
/// Immutable once installed; a topology change replaces the whole set.
/// Name, MAC, and IP are each unique across the set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interface {
    /// Host-side port name (e.g. `eth0`).
    pub name: String,
    /// Hardware address the router answers to on this port.
    pub mac: MacAddr,
    /// IPv4 address the router owns on this port.
    pub ip: Ipv4Addr,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: mac {} ip {}", self.name, self.mac, self.ip)
    }
}

/// Inner state of the interface table, behind the lock.
struct IfaceTableInner {
    ifaces: Vec<Interface>,
}

/// The interface registry.
///
/// Lookups return owned copies; handing out references into the table
/// would pin the lock across the caller's whole processing path.
pub struct IfaceTable {
    inner: RwLock<IfaceTableInner>,
}

impl IfaceTable {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(IfaceTableInner { ifaces: Vec::new() }),
        }
    }

    /// Replace the entire interface set.
    pub fn install(&self, ifaces: Vec<Interface>) {
        let mut inner = self.inner.write();
        inner.ifaces = ifaces;
    }

    /// Look up an interface by its port name.
    pub fn find_by_name(&self, name: &str) -> Option<Interface> {
        let inner = self.inner.read();
        inner.ifaces.iter().find(|i| i.name == name).cloned()
    }

    /// Look up an interface by its hardware address.
    pub fn find_by_mac(&self, mac: MacAddr) -> Option<Interface> {
        let inner = self.inner.read();
        inner.ifaces.iter().find(|i| i.mac == mac).cloned()
    }

    /// Look up an interface by its IPv4 address.
    pub fn find_by_ip(&self, ip: Ipv4Addr) -> Option<Interface> {
        let inner = self.inner.read();
        inner.ifaces.iter().find(|i| i.ip == ip).cloned()
    }

    /// `true` if `ip` is owned by any configured interface.
    ///
    /// Used by the forwarding path to refuse datagrams addressed to the
    /// router itself.
    pub fn is_local_ip(&self, ip: Ipv4Addr) -> bool {
        let inner = self.inner.read();
        inner.ifaces.iter().any(|i| i.ip == ip)
    }

    /// Number of configured interfaces.
    pub fn len(&self) -> usize {
        self.inner.read().ifaces.len()
    }

    /// `true` if no interface is configured.
    pub fn is_empty(&self) -> bool {
        self.inner.read().ifaces.is_empty()
    }
}

impl Default for IfaceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IfaceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        if inner.ifaces.is_empty() {
            return writeln!(f, " Interface list empty ");
        }
        for iface in &inner.ifaces {
            writeln!(f, "{iface}")?;
        }
        Ok(())
    }
}
