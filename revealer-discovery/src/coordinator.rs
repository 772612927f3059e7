//! The SSDP discovery pass: fan M-SEARCH across every adapter, collect
//! replies and NOTIFY announcements for a bounded window, enrich each
//! unique device with its description, and insert it into the registry.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::{mpsc, Arc};

use url::Url;

use revealer_codec::{build_msearch, parse_datagram, SsdpRecord};
use revealer_mipas::{classify, VendorTable};
use revealer_registry::{
    DeviceCategory, DeviceEntry, DeviceRegistry, DeviceTag, DiagnosticLog, DiagnosticScope,
    UpnpProperties,
};
use revealer_scheduler::{CancelToken, Worker};

use crate::adapters::local_addresses;
use crate::config::DiscoveryConfig;
use crate::description::DescriptionFetcher;
use crate::notify::NotifyListener;

pub struct DiscoveryCoordinator {
    config: DiscoveryConfig,
    registry: Arc<DeviceRegistry>,
    diagnostics: Arc<DiagnosticLog>,
}

impl DiscoveryCoordinator {
    pub fn new(
        config: DiscoveryConfig,
        registry: Arc<DeviceRegistry>,
        diagnostics: Arc<DiagnosticLog>,
    ) -> Self {
        Self {
            config,
            registry,
            diagnostics,
        }
    }

    /// Run one search pass. Returns once the listen window has elapsed on
    /// every adapter and every heard device has been enriched and
    /// inserted. Cancelling `session` ends the pass early.
    pub fn run_session(&self, session: &CancelToken, notify: Option<Arc<NotifyListener>>) {
        let addresses = local_addresses();

        let fetcher = match DescriptionFetcher::new(self.config.description_timeout) {
            Ok(fetcher) => Some(fetcher),
            Err(error) => {
                // Discovery still works without descriptions; every device
                // just comes out not-local.
                self.diagnostics
                    .push(DiagnosticScope::Transport, "http client", error.to_string());
                None
            }
        };
        let enricher = Arc::new(Enricher {
            fetcher,
            vendor_table: self.config.vendor_table.clone(),
            registry: Arc::clone(&self.registry),
            diagnostics: Arc::clone(&self.diagnostics),
        });

        // One enrichment lane: description fetches are the slow part, and
        // serializing them keeps insertion order deterministic for records
        // heard close together.
        let (record_tx, record_rx) = mpsc::channel::<SsdpRecord>();
        let enrich_worker = Worker::spawn("ssdp-enrich");
        {
            let enricher = Arc::clone(&enricher);
            enrich_worker.submit(move || {
                for record in record_rx {
                    enricher.enrich_and_insert(record);
                }
            });
        }

        // NOTIFY announcements from our devices count as discoveries too.
        // Third-party chatter on the group is dropped at the door.
        //
        // The listen loop gets its own token: `session` belongs to the
        // caller, and the legacy pass may still be riding its window on
        // the same flag. Cancelling a clone would cut that pass short.
        let notify_token = CancelToken::new();
        let notify_worker = notify.map(|listener| {
            for &address in &addresses {
                listener.join_group(address);
            }
            let worker = Worker::spawn("notify-listen");
            let token = notify_token.clone();
            let vendor_table = self.config.vendor_table.clone();
            let tx = record_tx.clone();
            worker.submit(move || {
                listener.listen(&token, |record| {
                    if record.server.is_empty() {
                        return;
                    }
                    if !classify(&vendor_table, &record).is_ours() {
                        return;
                    }
                    tx.send(record).ok();
                });
            });
            worker
        });

        let mut probes = Vec::with_capacity(addresses.len());
        for address in addresses {
            let worker = Worker::spawn(&format!("ssdp-{address}"));
            let config = self.config.clone();
            let session = session.clone();
            let diagnostics = Arc::clone(&self.diagnostics);
            let tx = record_tx.clone();
            worker.submit(move || {
                probe_address(&config, address, &session, &diagnostics, |record| {
                    tx.send(record).ok();
                });
            });
            probes.push(worker);
        }

        // Joining the probes rides out the listen windows.
        drop(probes);
        notify_token.cancel();
        drop(notify_worker);

        // All senders are gone once the original drops; the enrichment
        // loop then drains and the join below flushes the last inserts.
        drop(record_tx);
        drop(enrich_worker);

        tracing::debug!("ssdp pass finished");
    }
}

/// Send one M-SEARCH from `address` and collect replies until the listen
/// window elapses. Socket failures skip this adapter only.
fn probe_address(
    config: &DiscoveryConfig,
    address: Ipv4Addr,
    session: &CancelToken,
    diagnostics: &DiagnosticLog,
    mut on_record: impl FnMut(SsdpRecord),
) {
    let socket = match UdpSocket::bind((address, 0)) {
        Ok(socket) => socket,
        Err(error) => {
            diagnostics.push(
                DiagnosticScope::Transport,
                address.to_string(),
                format!("bind failed: {error}"),
            );
            return;
        }
    };
    if let Err(error) = socket.set_read_timeout(Some(config.read_timeout)) {
        diagnostics.push(
            DiagnosticScope::Transport,
            address.to_string(),
            format!("read timeout rejected: {error}"),
        );
        return;
    }

    let group = SocketAddrV4::new(config.multicast_addr, config.multicast_port);
    if let Err(error) = socket.send_to(build_msearch().as_bytes(), group) {
        diagnostics.push(
            DiagnosticScope::Transport,
            address.to_string(),
            format!("M-SEARCH send failed: {error}"),
        );
        return;
    }

    let window = CancelToken::new();
    window.cancel_after(config.listen_window);

    let mut buffer = [0u8; 8192];
    while !window.is_cancelled() && !session.is_cancelled() {
        match socket.recv_from(&mut buffer) {
            Ok((size, sender)) => match std::str::from_utf8(&buffer[..size]) {
                Ok(payload) => {
                    let record = parse_datagram(payload, sender);
                    // No SERVER header means nothing to show or classify.
                    if !record.server.is_empty() {
                        on_record(record);
                    }
                }
                Err(_) => {
                    diagnostics.push(
                        DiagnosticScope::Protocol,
                        sender.to_string(),
                        "non-UTF-8 datagram",
                    );
                }
            },
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(error) => {
                diagnostics.push(
                    DiagnosticScope::Transport,
                    address.to_string(),
                    format!("receive failed: {error}"),
                );
                return;
            }
        }
    }
}

/// Turns raw records into registry entries: fetch the description, decide
/// ours/other and the configuration uuid, resolve the display link.
struct Enricher {
    fetcher: Option<DescriptionFetcher>,
    vendor_table: VendorTable,
    registry: Arc<DeviceRegistry>,
    diagnostics: Arc<DiagnosticLog>,
}

impl Enricher {
    fn enrich_and_insert(&self, record: SsdpRecord) {
        let description = self
            .fetcher
            .as_ref()
            .and_then(|fetcher| fetcher.fetch(&record.location));
        if description.is_none() && !record.location.is_empty() {
            self.diagnostics.push(
                DiagnosticScope::Protocol,
                record.location.clone(),
                "description unavailable, device kept as not-local",
            );
        }
        let entry = build_entry(&self.vendor_table, record, description);
        self.registry.insert(entry);
    }
}

/// Build the registry entry for one record. Pure so the mapping rules are
/// testable without sockets.
fn build_entry(
    table: &VendorTable,
    record: SsdpRecord,
    description: Option<UpnpProperties>,
) -> DeviceEntry {
    let classification = classify(table, &record);
    let category = if classification.is_ours() {
        DeviceCategory::Ours
    } else {
        DeviceCategory::Other
    };
    let uuid = classification.entry_uuid();

    // A fetched description proves the device sits on a reachable subnet.
    let tag = if description.is_some() {
        DeviceTag::Local
    } else {
        DeviceTag::NotLocal
    };

    let mut properties = description.unwrap_or_default();
    let display_name = properties
        .get("friendlyName")
        .cloned()
        .unwrap_or_else(|| record.server.clone());
    let link = match properties.get("presentationURL") {
        Some(presentation) => resolve_link(presentation, &record.location_base),
        None => record.source_address.clone(),
    };

    // SSDP fields ride along so the properties view shows the whole
    // picture even when the description lacked them.
    properties.insert("server".to_string(), record.server);
    properties.insert("version".to_string(), record.product_version);
    properties.insert("os".to_string(), record.os);
    properties.insert("osVersion".to_string(), record.os_version);
    if !record.location.is_empty() {
        properties.insert("location".to_string(), record.location);
    }
    properties.insert("address".to_string(), record.source_address.clone());
    if let Some(device_uuid) = &uuid {
        if !device_uuid.is_empty() {
            properties.insert("uuid".to_string(), device_uuid.clone());
        }
    }

    DeviceEntry::ssdp(
        display_name,
        tag,
        category,
        link,
        record.source_address,
        uuid,
        Some(properties),
    )
}

/// Resolve a presentation URL against the description's base. Absolute
/// URLs pass through; anything unresolvable degrades to naive joining.
fn resolve_link(presentation: &str, base: &str) -> String {
    if presentation.starts_with("http://") || presentation.starts_with("https://") {
        return presentation.to_string();
    }
    match Url::parse(base).and_then(|base| base.join(presentation)) {
        Ok(resolved) => resolved.to_string(),
        Err(error) => {
            tracing::debug!(presentation, base, %error, "unresolvable presentation URL");
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                presentation.trim_start_matches('/')
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revealer_codec::NOT_PROVIDED;
    use rstest::rstest;
    use std::time::Duration;

    #[test]
    fn a_finished_pass_leaves_the_callers_session_token_untouched() {
        let config = DiscoveryConfig {
            listen_window: Duration::from_millis(100),
            read_timeout: Duration::from_millis(30),
            ..DiscoveryConfig::default()
        };
        let coordinator = DiscoveryCoordinator::new(
            config,
            Arc::new(DeviceRegistry::detached()),
            Arc::new(DiagnosticLog::new()),
        );

        let session = CancelToken::new();
        coordinator.run_session(&session, None);

        // The legacy pass shares this token; only its owner may cancel it.
        assert!(!session.is_cancelled());
    }

    fn ours_record() -> SsdpRecord {
        SsdpRecord {
            server: "8SMC5-USB".to_string(),
            product_version: "4.7.9".to_string(),
            os: "lwIP".to_string(),
            os_version: "1.4.1".to_string(),
            location: "http://192.168.1.20:80/Basic_info.xml".to_string(),
            location_base: "http://192.168.1.20:80".to_string(),
            source_address: "192.168.1.20".to_string(),
            uuid: "40001-abc".to_string(),
            mipas_supported: false,
        }
    }

    fn description(pairs: &[(&str, &str)]) -> UpnpProperties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn described_device_is_local_with_friendly_name_and_resolved_link() {
        let entry = build_entry(
            &VendorTable::builtin(),
            ours_record(),
            Some(description(&[
                ("friendlyName", "8SMC5-USB (ABC123)"),
                ("presentationURL", "ximc_info.html"),
                ("UDN", "uuid:40001-abc"),
            ])),
        );

        assert_eq!(entry.display_name, "8SMC5-USB (ABC123)");
        assert_eq!(entry.tag, DeviceTag::Local);
        assert_eq!(entry.category, DeviceCategory::Ours);
        assert_eq!(entry.link, "http://192.168.1.20/ximc_info.html");
        assert_eq!(entry.uuid.as_deref(), Some("40001-abc"));
        assert!(entry.configurable());

        let properties = entry.properties.expect("merged properties");
        assert_eq!(properties.get("server").map(String::as_str), Some("8SMC5-USB"));
        assert_eq!(
            properties.get("UDN").map(String::as_str),
            Some("uuid:40001-abc")
        );
    }

    #[test]
    fn undescribed_device_is_not_local_and_links_to_its_address() {
        let entry = build_entry(&VendorTable::builtin(), ours_record(), None);

        assert_eq!(entry.tag, DeviceTag::NotLocal);
        assert_eq!(entry.display_name, "8SMC5-USB");
        assert_eq!(entry.link, "192.168.1.20");
        // SSDP fields still populate the properties view.
        let properties = entry.properties.expect("ride-along properties");
        assert_eq!(
            properties.get("address").map(String::as_str),
            Some("192.168.1.20")
        );
    }

    #[test]
    fn old_firmware_is_ours_with_configuration_disabled() {
        let mut record = ours_record();
        record.product_version = "4.6.0".to_string();
        let entry = build_entry(&VendorTable::builtin(), record, None);

        assert_eq!(entry.category, DeviceCategory::Ours);
        assert_eq!(entry.uuid.as_deref(), Some(""));
        assert!(!entry.configurable());
    }

    #[test]
    fn third_party_device_is_other_without_uuid() {
        let record = SsdpRecord {
            server: "SomePrinter".to_string(),
            product_version: NOT_PROVIDED.to_string(),
            source_address: "10.0.0.9".to_string(),
            ..SsdpRecord::default()
        };
        let entry = build_entry(&VendorTable::builtin(), record, None);

        assert_eq!(entry.category, DeviceCategory::Other);
        assert_eq!(entry.uuid, None);
        assert!(!entry.configurable());
    }

    #[rstest]
    #[case::relative("info.html", "http://10.0.0.5:8080", "http://10.0.0.5:8080/info.html")]
    #[case::rooted("/a/b.html", "http://10.0.0.5:80", "http://10.0.0.5/a/b.html")]
    #[case::absolute("http://10.0.0.5/x.html", "http://10.0.0.9:80", "http://10.0.0.5/x.html")]
    fn presentation_urls_resolve_against_the_location_base(
        #[case] presentation: &str,
        #[case] base: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(resolve_link(presentation, base), expected);
    }
}
