//! Context indexes derived from the tree: known datacenters, host groups and
//! the service credential directory.
//!
//! All three live below `/onlineconf` in the tree itself, which keeps them in
//! the same generation as the parameters they are used to resolve.

use bytes::Bytes;
use ipnet::IpNet;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{debug, instrument};

use crate::tree::{follow_symlinks, lookup, ContextNode, ContextRef, TreeNode};
use crate::IndexError;

pub const DATACENTER_PATH: &str = "/onlineconf/datacenter";
pub const GROUP_PATH: &str = "/onlineconf/group";
pub const SERVICE_PATH: &str = "/onlineconf/service";

/// Whether `path` is the service directory or below it. Those nodes hold
/// credentials and are never handed out to clients.
pub fn is_service_path(path: &str) -> bool {
    path.strip_prefix(SERVICE_PATH)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// A datacenter and the IP networks its hosts live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datacenter {
    name: String,
    networks: Vec<IpNet>,
}

impl Datacenter {
    pub fn new(name: String, networks: Vec<IpNet>) -> Self {
        Self { name, networks }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn networks(&self) -> &[IpNet] {
        &self.networks
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(ip))
    }
}

/// A named group of hosts, described by hostname glob patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    patterns: Vec<glob::Pattern>,
}

impl Group {
    pub fn new(name: String, patterns: Vec<glob::Pattern>) -> Self {
        Self { name, patterns }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patterns(&self) -> &[glob::Pattern] {
        &self.patterns
    }

    pub fn matches(&self, host: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(host))
    }
}

/// Service name to stored credential hash (lowercase hex encoded SHA-256 of
/// the service's password).
pub type Services = HashMap<String, Bytes>;

/// The indexes of one tree generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextIndexes {
    pub datacenters: Vec<Datacenter>,
    pub groups: Vec<Group>,
    pub services: Services,
}

/// Reads all context indexes from a context view of the tree.
/// Values are read through symlinks.
#[instrument(skip_all, err)]
pub fn build_indexes(root: &ContextNode) -> Result<ContextIndexes, IndexError> {
    let root = ContextRef::Node(root);

    Ok(ContextIndexes {
        datacenters: read_datacenters(root)?,
        groups: read_groups(root)?,
        services: read_services(root)?,
    })
}

/// Returns `(name, resolved value)` of every child of the node at `path`.
/// A missing node has no entries.
fn read_entries<'a>(
    root: ContextRef<'a>,
    path: &str,
) -> Result<Vec<(&'a str, Option<&'a str>)>, IndexError> {
    let Some(dir) = lookup(root, path)? else {
        debug!(path, "no such node, index is empty");
        return Ok(vec![]);
    };

    dir.children()
        .map(|child| -> Result<_, IndexError> {
            let resolved = follow_symlinks(root, child)?;
            Ok((child.name(), TreeNode::value(resolved)))
        })
        .collect()
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
}

fn read_datacenters(root: ContextRef<'_>) -> Result<Vec<Datacenter>, IndexError> {
    read_entries(root, DATACENTER_PATH)?
        .into_iter()
        .map(|(name, value)| -> Result<_, IndexError> {
            let networks = split_list(value.unwrap_or_default())
                .map(|network| parse_network(name, network))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Datacenter::new(name.to_string(), networks))
        })
        .collect()
}

/// Accepts both networks ("10.0.0.0/8") and bare addresses.
fn parse_network(name: &str, network: &str) -> Result<IpNet, IndexError> {
    let parsed = match network.parse::<IpNet>() {
        Ok(net) => Ok(net),
        Err(e) => match network.parse::<IpAddr>() {
            Ok(ip) => {
                let prefix_len = if ip.is_ipv4() { 32 } else { 128 };
                IpNet::new(ip, prefix_len).map_err(|e| e.to_string())
            }
            Err(_) => Err(e.to_string()),
        },
    };

    parsed.map_err(|reason| IndexError::InvalidNetwork {
        path: format!("{}/{}", DATACENTER_PATH, name),
        network: network.to_string(),
        reason,
    })
}

fn read_groups(root: ContextRef<'_>) -> Result<Vec<Group>, IndexError> {
    read_entries(root, GROUP_PATH)?
        .into_iter()
        .map(|(name, value)| -> Result<_, IndexError> {
            let patterns = split_list(value.unwrap_or_default())
                .map(|pattern| {
                    glob::Pattern::new(pattern).map_err(|e| IndexError::InvalidPattern {
                        path: format!("{}/{}", GROUP_PATH, name),
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Group::new(name.to_string(), patterns))
        })
        .collect()
}

fn read_services(root: ContextRef<'_>) -> Result<Services, IndexError> {
    let mut services = Services::new();
    for (name, value) in read_entries(root, SERVICE_PATH)? {
        match value.map(str::trim) {
            Some(hash) if !hash.is_empty() => {
                services.insert(name.to_string(), Bytes::from(hash.to_ascii_lowercase()));
            }
            _ => debug!(service = name, "service has no credential, skipping"),
        }
    }
    Ok(services)
}
