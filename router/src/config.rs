//! Startup configuration loaders.
//!
//! Two whitespace-separated text formats, both with dotted-quad
//! addresses:
//!
//! - routing table: `dest gw mask iface` per line
//! - interface IP map: `iface ip` per line
//!
//! Blank lines are ignored.  Anything else malformed aborts startup with
//! a [`ConfigError`] naming the line and the offending token; the router
//! never starts with a partially loaded configuration.

use core::fmt;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use ferrule_wire::types::Ipv4Addr;

use crate::route::RouteEntry;

/// Startup configuration failure.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(io::Error),
    /// A token that should have been a dotted-quad address was not.
    BadAddress { line: usize, token: String },
    /// A line with too few fields.
    ShortLine { line: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read configuration: {e}"),
            Self::BadAddress { line, token } => {
                write!(f, "line {line}: cannot convert `{token}` to a valid IP")
            }
            Self::ShortLine { line } => write!(f, "line {line}: too few fields"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

fn parse_addr(token: &str, line: usize) -> Result<Ipv4Addr, ConfigError> {
    token.parse().map_err(|_| ConfigError::BadAddress {
        line,
        token: token.to_owned(),
    })
}

/// Parse routing-table text: `dest gw mask iface` per line.
///
/// Extra trailing fields on a line are ignored.
pub fn parse_routing_table(text: &str) -> Result<Vec<RouteEntry>, ConfigError> {
    let mut entries = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let mut fields = line.split_whitespace();
        let Some(dest) = fields.next() else {
            continue;
        };
        let (Some(gw), Some(mask), Some(iface)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(ConfigError::ShortLine { line: line_no });
        };

        entries.push(RouteEntry {
            dest: parse_addr(dest, line_no)?,
            gateway: parse_addr(gw, line_no)?,
            mask: parse_addr(mask, line_no)?,
            iface: iface.to_owned(),
        });
    }

    Ok(entries)
}

/// Load the routing-table file.
pub fn load_routing_table(path: &Path) -> Result<Vec<RouteEntry>, ConfigError> {
    parse_routing_table(&fs::read_to_string(path)?)
}

/// Parse interface-IP-map text: `iface ip` per line.
///
/// A name listed twice keeps its last address.
pub fn parse_iface_map(text: &str) -> Result<HashMap<String, Ipv4Addr>, ConfigError> {
    let mut map = HashMap::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let mut fields = line.split_whitespace();
        let Some(iface) = fields.next() else {
            continue;
        };
        let Some(ip) = fields.next() else {
            return Err(ConfigError::ShortLine { line: line_no });
        };

        map.insert(iface.to_owned(), parse_addr(ip, line_no)?);
    }

    Ok(map)
}

/// Load the interface-IP-map file.
pub fn load_iface_map(path: &Path) -> Result<HashMap<String, Ipv4Addr>, ConfigError> {
    parse_iface_map(&fs::read_to_string(path)?)
}
