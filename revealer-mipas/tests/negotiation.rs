//! Exchange-level tests for the settings negotiator, run against scripted
//! loopback peers instead of real devices.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use revealer_codec::{parse_datagram, SsdpRecord};
use revealer_mipas::{MipasError, MipasSettings, NotifySource, SettingsNegotiator};

const LOOPBACK: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

/// A fake device: answers the first datagram it receives with a canned
/// SSDP response, sent back to the prober's source address.
fn spawn_device(reply: &'static str) -> SocketAddrV4 {
    let socket = UdpSocket::bind((LOOPBACK, 0)).expect("bind device socket");
    let address = match socket.local_addr().expect("device addr") {
        std::net::SocketAddr::V4(v4) => v4,
        other => panic!("unexpected address family: {other}"),
    };

    thread::spawn(move || {
        let mut buffer = [0u8; 8192];
        if let Ok((_, prober)) = socket.recv_from(&mut buffer) {
            socket.send_to(reply.as_bytes(), prober).ok();
        }
    });

    address
}

struct SilentNotify;

impl NotifySource for SilentNotify {
    fn drain(&self, _window: Duration) -> Vec<SsdpRecord> {
        Vec::new()
    }
}

struct CannedNotify(&'static str);

impl NotifySource for CannedNotify {
    fn drain(&self, _window: Duration) -> Vec<SsdpRecord> {
        let sender = std::net::SocketAddr::from((LOOPBACK, 1900));
        vec![parse_datagram(self.0, sender)]
    }
}

/// Holds announcements that arrived before the probe; a flush empties it,
/// the way the socket-backed source drops its kernel backlog.
struct BacklogNotify {
    backlog: Mutex<Vec<&'static str>>,
}

impl NotifySource for BacklogNotify {
    fn drain(&self, _window: Duration) -> Vec<SsdpRecord> {
        let sender = std::net::SocketAddr::from((LOOPBACK, 1900));
        self.backlog
            .lock()
            .unwrap()
            .drain(..)
            .map(|payload| parse_datagram(payload, sender))
            .collect()
    }

    fn flush(&self) {
        self.backlog.lock().unwrap().clear();
    }
}

#[test]
fn first_unicast_reply_from_target_uuid_wins() {
    let device = spawn_device(
        "HTTP/1.1 200 OK\r\n\
         LOCATION: http://127.0.0.1:80/Basic_info.xml\r\n\
         SERVER: lwIP/1.4.1 UPnP/2.0 8SMC5-USB/4.7.9\r\n\
         USN: uuid:target-uuid::upnp:rootdevice\r\n\r\n",
    );

    let negotiator =
        SettingsNegotiator::new(Duration::from_millis(800), Duration::from_millis(50))
            .with_target(device);
    let record = negotiator
        .reconfigure(
            &[LOOPBACK],
            Some(&SilentNotify),
            "target-uuid",
            &MipasSettings::dhcp("pw"),
        )
        .expect("device confirmed");

    assert_eq!(record.uuid, "target-uuid");
    assert_eq!(record.server, "8SMC5-USB");
}

#[test]
fn reply_from_wrong_uuid_is_not_a_confirmation() {
    let device = spawn_device(
        "HTTP/1.1 200 OK\r\n\
         LOCATION: http://127.0.0.1:80/Basic_info.xml\r\n\
         USN: uuid:some-other-device::upnp:rootdevice\r\n\r\n",
    );

    let negotiator =
        SettingsNegotiator::new(Duration::from_millis(300), Duration::from_millis(10))
            .with_target(device);
    let result = negotiator.reconfigure(
        &[LOOPBACK],
        Some(&SilentNotify),
        "target-uuid",
        &MipasSettings::dhcp("pw"),
    );

    assert!(matches!(result, Err(MipasError::NoReply { .. })));
}

#[test]
fn announcements_heard_before_the_probe_do_not_confirm() {
    // The target stays silent; the only matching datagram is an alive
    // announcement that predates the probe. Confirmation requires a reply
    // provoked by the probe, so this negotiation must come up empty.
    let silent = UdpSocket::bind((LOOPBACK, 0)).expect("bind silent socket");
    let target = match silent.local_addr().expect("addr") {
        std::net::SocketAddr::V4(v4) => v4,
        other => panic!("unexpected address family: {other}"),
    };

    let notify = BacklogNotify {
        backlog: Mutex::new(vec![
            "NOTIFY * HTTP/1.1\r\n\
             LOCATION: http://127.0.0.1:80/Basic_info.xml\r\n\
             SERVER: lwIP/1.4.1 UPnP/2.0 8SMC5-USB/4.7.9\r\n\
             USN: uuid:target-uuid::upnp:rootdevice\r\n\r\n",
        ]),
    };

    let negotiator =
        SettingsNegotiator::new(Duration::from_millis(200), Duration::from_millis(20))
            .with_target(target);
    let result = negotiator.reconfigure(
        &[LOOPBACK],
        Some(&notify),
        "target-uuid",
        &MipasSettings::dhcp("pw"),
    );

    assert!(matches!(result, Err(MipasError::NoReply { .. })));
    assert!(notify.backlog.lock().unwrap().is_empty());
}

#[test]
fn notify_channel_confirms_after_unicast_timeout() {
    // A target that never answers: the unicast window must elapse, then
    // the NOTIFY drain supplies the confirmation.
    let silent = UdpSocket::bind((LOOPBACK, 0)).expect("bind silent socket");
    let target = match silent.local_addr().expect("addr") {
        std::net::SocketAddr::V4(v4) => v4,
        other => panic!("unexpected address family: {other}"),
    };

    let notify = CannedNotify(
        "NOTIFY * HTTP/1.1\r\n\
         LOCATION: http://127.0.0.1:80/Basic_info.xml\r\n\
         SERVER: lwIP/1.4.1 UPnP/2.0 8SMC5-USB/4.7.9\r\n\
         USN: uuid:target-uuid::upnp:rootdevice\r\n\r\n",
    );

    let negotiator =
        SettingsNegotiator::new(Duration::from_millis(300), Duration::from_millis(50))
            .with_target(target);
    let record = negotiator
        .reconfigure(
            &[LOOPBACK],
            Some(&notify),
            "target-uuid",
            &MipasSettings::dhcp("pw"),
        )
        .expect("confirmed via NOTIFY");

    assert_eq!(record.uuid, "target-uuid");
}
