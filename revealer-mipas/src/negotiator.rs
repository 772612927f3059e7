//! The reconfiguration exchange itself.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::{Duration, Instant};

use revealer_codec::{build_targeted_msearch, parse_datagram, SsdpRecord};

use crate::error::MipasError;
use crate::settings::MipasSettings;

const SSDP_TARGET: SocketAddrV4 =
    SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);
const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Access to the session's shared NOTIFY socket. A reconfigured device may
/// answer on the multicast channel instead of unicast, so the negotiator
/// drains it after each per-address timeout. The implementation must bound
/// its wait so the NOTIFY listener's own loop is not starved.
pub trait NotifySource {
    fn drain(&self, window: Duration) -> Vec<SsdpRecord>;

    /// Discard whatever arrived before now. Socket-backed sources override
    /// this: between searches nothing reads the socket, so the kernel
    /// buffers periodic alive announcements that predate the probe. The
    /// default suits sources without a backlog.
    fn flush(&self) {}
}

/// Sends a targeted reconfiguration probe and waits for the device to
/// answer under its uuid.
///
/// Success means "any LOCATION-bearing reply from this uuid after
/// sending" — the protocol carries no confirmation of the applied values,
/// and no rollback exists if a device applied them partially. This is a
/// known protocol limitation, kept as-is.
pub struct SettingsNegotiator {
    unicast_window: Duration,
    notify_window: Duration,
    target: SocketAddrV4,
}

impl SettingsNegotiator {
    pub fn new(unicast_window: Duration, notify_window: Duration) -> Self {
        Self {
            unicast_window,
            notify_window,
            target: SSDP_TARGET,
        }
    }

    /// Probe a non-standard target instead of the SSDP multicast group.
    /// Exists for exercising the exchange against a scripted peer.
    pub fn with_target(mut self, target: SocketAddrV4) -> Self {
        self.target = target;
        self
    }

    /// Run the exchange: validate, then fan the targeted M-SEARCH across
    /// the local addresses, stopping at the first accepted reply.
    pub fn reconfigure(
        &self,
        addresses: &[Ipv4Addr],
        notify: Option<&dyn NotifySource>,
        uuid: &str,
        settings: &MipasSettings,
    ) -> Result<SsdpRecord, MipasError> {
        settings.validate()?;

        // Only replies provoked by this probe count as confirmation, so
        // announcements buffered while nothing was listening go first.
        if let Some(notify) = notify {
            notify.flush();
        }

        let request = build_targeted_msearch(uuid, &settings.wire_payload());
        let mut any_sent = false;
        let mut last_transport_error = String::new();

        for &address in addresses {
            match self.probe_address(address, &request, uuid) {
                Ok(Some(record)) => {
                    tracing::info!(uuid, via = %address, "device confirmed over unicast");
                    return Ok(record);
                }
                Ok(None) => {
                    any_sent = true;
                    if let Some(notify) = notify {
                        if let Some(record) = self.drain_notify(notify, uuid) {
                            tracing::info!(uuid, "device confirmed over the NOTIFY channel");
                            return Ok(record);
                        }
                    }
                }
                Err(error) => {
                    // Transport trouble on one address skips that address only.
                    tracing::warn!(via = %address, %error, "cannot probe from this address");
                    last_transport_error = error.to_string();
                }
            }
        }

        if !any_sent {
            let detail = if last_transport_error.is_empty() {
                "no usable local addresses".to_string()
            } else {
                last_transport_error
            };
            return Err(MipasError::Transport(detail));
        }
        Err(MipasError::NoReply {
            uuid: uuid.to_string(),
        })
    }

    /// Send from one local address and wait out the unicast window.
    fn probe_address(
        &self,
        address: Ipv4Addr,
        request: &str,
        uuid: &str,
    ) -> std::io::Result<Option<SsdpRecord>> {
        let socket = UdpSocket::bind((address, 0))?;
        socket.set_read_timeout(Some(READ_TIMEOUT))?;
        socket.send_to(request.as_bytes(), self.target)?;

        let deadline = Instant::now() + self.unicast_window;
        let mut buffer = [0u8; 8192];

        while Instant::now() < deadline {
            match socket.recv_from(&mut buffer) {
                Ok((size, sender)) => {
                    if let Ok(payload) = std::str::from_utf8(&buffer[..size]) {
                        let record = parse_datagram(payload, sender);
                        if accepts(&record, uuid) {
                            return Ok(Some(record));
                        }
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn drain_notify(&self, notify: &dyn NotifySource, uuid: &str) -> Option<SsdpRecord> {
        notify
            .drain(self.notify_window)
            .into_iter()
            .find(|record| accepts(record, uuid))
    }
}

/// Any LOCATION-bearing reply under the addressed uuid counts.
fn accepts(record: &SsdpRecord, uuid: &str) -> bool {
    record.uuid.eq_ignore_ascii_case(uuid) && !record.location.is_empty()
}
