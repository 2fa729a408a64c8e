//! Local network address discovery.

use std::net::{IpAddr, Ipv4Addr};

/// Non-loopback IPv4 addresses of this machine, sorted and deduplicated.
///
/// Remote clients on the same network connect through one of these.
pub fn local_ipv4_addresses() -> Vec<Ipv4Addr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            tracing::warn!("failed to list network interfaces: {e}");
            return Vec::new();
        }
    };

    let mut addrs: Vec<Ipv4Addr> = interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .collect();
    addrs.sort();
    addrs.dedup();
    addrs
}
