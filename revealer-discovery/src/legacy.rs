//! The legacy broadcast protocol.
//!
//! First-generation firmware predates the SSDP stack: it answers a plain
//! UDP broadcast probe on a fixed port and reveals nothing but its
//! address. Entries built from it carry no description, no uuid, and link
//! straight to the firmware's fixed web port.

use std::net::{Ipv4Addr, UdpSocket};
use std::sync::Arc;

use revealer_registry::{DeviceEntry, DeviceRegistry, DiagnosticLog, DiagnosticScope};
use revealer_scheduler::{CancelToken, Worker};

use crate::adapters::local_addresses;
use crate::config::DiscoveryConfig;

const LEGACY_PROBE: &str = "DISCOVER_CUBIELORD_REQUEST";

pub struct LegacyDiscoveryCoordinator {
    config: DiscoveryConfig,
    registry: Arc<DeviceRegistry>,
    diagnostics: Arc<DiagnosticLog>,
}

impl LegacyDiscoveryCoordinator {
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

    /// Run one broadcast pass across every adapter, in parallel with the
    /// SSDP pass. Returns when the reply window has elapsed everywhere.
    pub fn run_session(&self, session: &CancelToken) {
        let mut probes = Vec::new();
        for address in local_addresses() {
            let worker = Worker::spawn(&format!("legacy-{address}"));
            let config = self.config.clone();
            let session = session.clone();
            let registry = Arc::clone(&self.registry);
            let diagnostics = Arc::clone(&self.diagnostics);
            worker.submit(move || {
                probe_legacy(&config, address, &session, &registry, &diagnostics);
            });
            probes.push(worker);
        }
        // Joining rides out the reply windows.
        drop(probes);
        tracing::debug!("legacy pass finished");
    }
}

fn probe_legacy(
    config: &DiscoveryConfig,
    address: Ipv4Addr,
    session: &CancelToken,
    registry: &DeviceRegistry,
    diagnostics: &DiagnosticLog,
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
    if let Err(error) = socket
        .set_broadcast(true)
        .and_then(|_| socket.set_read_timeout(Some(config.read_timeout)))
    {
        diagnostics.push(
            DiagnosticScope::Transport,
            address.to_string(),
            format!("socket options rejected: {error}"),
        );
        return;
    }

    // The firmware echoes its reply to the port named in the probe.
    let reply_port = match socket.local_addr() {
        Ok(local) => local.port(),
        Err(error) => {
            diagnostics.push(
                DiagnosticScope::Transport,
                address.to_string(),
                format!("local address unavailable: {error}"),
            );
            return;
        }
    };
    let probe = format!("{LEGACY_PROBE} {reply_port}");
    if let Err(error) = socket.send_to(
        probe.as_bytes(),
        (Ipv4Addr::BROADCAST, config.legacy_port),
    ) {
        diagnostics.push(
            DiagnosticScope::Transport,
            address.to_string(),
            format!("broadcast send failed: {error}"),
        );
        return;
    }

    let window = CancelToken::new();
    window.cancel_after(config.legacy_window);

    let mut buffer = [0u8; 1024];
    while !window.is_cancelled() && !session.is_cancelled() {
        match socket.recv_from(&mut buffer) {
            Ok((_, sender)) => {
                // Any answer at all identifies a legacy device; the payload
                // carries nothing usable.
                let ip = sender.ip().to_string();
                let link = format!("http://{ip}:{}", config.legacy_link_port);
                registry.insert(DeviceEntry::legacy(ip, link));
            }
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
