use std::net::Ipv4Addr;
use std::time::Duration;

use revealer_mipas::VendorTable;

/// Tunables for one discovery engine. The defaults are the values the
/// device firmware was tested against; most deployments never touch them.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// SSDP group every M-SEARCH is sent to and every NOTIFY arrives from.
    pub multicast_addr: Ipv4Addr,
    pub multicast_port: u16,
    /// How long each per-adapter listener collects M-SEARCH responses.
    pub listen_window: Duration,
    /// Socket read timeout; bounds how fast loops notice cancellation.
    pub read_timeout: Duration,
    /// Whole-request timeout for one description document fetch.
    pub description_timeout: Duration,
    /// Port the legacy firmware listens for broadcast probes on.
    pub legacy_port: u16,
    /// Port the legacy firmware serves its web interface on.
    pub legacy_link_port: u16,
    /// How long each legacy prober collects replies.
    pub legacy_window: Duration,
    /// Per-address unicast wait during settings negotiation.
    pub mipas_unicast_window: Duration,
    /// Bounded NOTIFY drain after each unicast timeout.
    pub mipas_notify_window: Duration,
    /// Products that understand MIPAS, with their minimum firmware.
    pub vendor_table: VendorTable,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            multicast_addr: Ipv4Addr::new(239, 255, 255, 250),
            multicast_port: 1900,
            listen_window: Duration::from_millis(2200),
            read_timeout: Duration::from_millis(250),
            description_timeout: Duration::from_secs(1),
            legacy_port: 8008,
            legacy_link_port: 8080,
            legacy_window: Duration::from_secs(2),
            mipas_unicast_window: Duration::from_millis(500),
            mipas_notify_window: Duration::from_millis(300),
            vendor_table: VendorTable::builtin(),
        }
    }
}
