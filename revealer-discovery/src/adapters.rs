use std::net::Ipv4Addr;

/// Every non-loopback IPv4 address assigned to this host, one per
/// adapter the search will probe from. Enumeration failure is logged and
/// yields an empty list — a search with no adapters simply finds nothing.
pub fn local_addresses() -> Vec<Ipv4Addr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(error) => {
            tracing::warn!(%error, "could not enumerate network adapters");
            return Vec::new();
        }
    };

    let mut addresses = Vec::new();
    for interface in interfaces {
        if interface.is_loopback() {
            continue;
        }
        if let if_addrs::IfAddr::V4(v4) = &interface.addr {
            addresses.push(v4.ip);
        }
    }
    tracing::debug!(count = addresses.len(), "usable local addresses");
    addresses
}
