//! The shared NOTIFY listener.
//!
//! Exactly one socket on the well-known SSDP port, joined to the multicast
//! group on every usable adapter. It is shared between the discovery
//! session (which wants every announcement) and the settings negotiator
//! (which drains it for a confirmation) — an internal lock serializes
//! their bounded reads so the two never tear datagrams from each other.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

use revealer_codec::{parse_datagram, SsdpRecord};
use revealer_mipas::NotifySource;
use revealer_scheduler::CancelToken;

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;

pub struct NotifyListener {
    socket: UdpSocket,
    io_lock: Mutex<()>,
    group: Ipv4Addr,
}

impl NotifyListener {
    /// Claim the SSDP port. Reuse flags let the listener coexist with
    /// other SSDP-aware software on the host; an outright bind failure is
    /// the one discovery error treated as fatal for the search.
    pub fn bind(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let raw = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(DiscoveryError::NotifyUnavailable)?;
        raw.set_reuse_address(true)
            .map_err(DiscoveryError::NotifyUnavailable)?;
        #[cfg(unix)]
        raw.set_reuse_port(true)
            .map_err(DiscoveryError::NotifyUnavailable)?;

        let bind_to = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.multicast_port);
        raw.bind(&bind_to.into())
            .map_err(DiscoveryError::NotifyUnavailable)?;

        let socket: UdpSocket = raw.into();
        socket
            .set_read_timeout(Some(config.read_timeout))
            .map_err(DiscoveryError::NotifyUnavailable)?;

        tracing::debug!(port = config.multicast_port, "NOTIFY listener bound");
        Ok(Self {
            socket,
            io_lock: Mutex::new(()),
            group: config.multicast_addr,
        })
    }

    /// Join the multicast group via one local address. Joining can fail
    /// per-adapter (VPN interfaces, split tunnels) without sinking the
    /// whole listener.
    pub fn join_group(&self, address: Ipv4Addr) {
        if let Err(error) = self.socket.join_multicast_v4(&self.group, &address) {
            tracing::debug!(%address, %error, "could not join the SSDP group on this adapter");
        }
    }

    /// Receive until the token cancels, handing every decoded datagram to
    /// the callback. Reads happen in short locked slices so a concurrent
    /// [`NotifySource::drain`] can interleave.
    pub fn listen(&self, session: &CancelToken, mut on_record: impl FnMut(SsdpRecord)) {
        let mut buffer = [0u8; 8192];
        while !session.is_cancelled() {
            let received = {
                let _io = self.lock_io();
                self.socket.recv_from(&mut buffer)
            };
            match received {
                Ok((size, sender)) => {
                    if let Ok(payload) = std::str::from_utf8(&buffer[..size]) {
                        on_record(parse_datagram(payload, sender));
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(error) => {
                    tracing::warn!(%error, "NOTIFY receive failed");
                    break;
                }
            }
        }
    }

    fn lock_io(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.io_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl NotifySource for NotifyListener {
    /// Drop the kernel backlog in one non-blocking sweep. Announcements
    /// buffered between searches must not pass for negotiation replies.
    fn flush(&self) {
        let _io = self.lock_io();
        if let Err(error) = self.socket.set_nonblocking(true) {
            tracing::warn!(%error, "cannot flush the NOTIFY backlog");
            return;
        }
        let mut buffer = [0u8; 8192];
        let mut discarded = 0usize;
        while self.socket.recv_from(&mut buffer).is_ok() {
            discarded += 1;
        }
        if let Err(error) = self.socket.set_nonblocking(false) {
            tracing::warn!(%error, "could not restore blocking reads after flush");
        }
        if discarded > 0 {
            tracing::debug!(discarded, "dropped buffered NOTIFY datagrams");
        }
    }

    fn drain(&self, window: Duration) -> Vec<SsdpRecord> {
        let _io = self.lock_io();
        let deadline = Instant::now() + window;
        let mut records = Vec::new();
        let mut buffer = [0u8; 8192];

        while Instant::now() < deadline {
            match self.socket.recv_from(&mut buffer) {
                Ok((size, sender)) => {
                    if let Ok(payload) = std::str::from_utf8(&buffer[..size]) {
                        records.push(parse_datagram(payload, sender));
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(error) => {
                    tracing::warn!(%error, "NOTIFY drain failed");
                    break;
                }
            }
        }
        records
    }
}
