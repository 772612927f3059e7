//! Tolerant decoding of SSDP response and NOTIFY payloads.

use std::net::SocketAddr;

use crate::{SsdpRecord, NOT_PROVIDED};

/// Decode one datagram into an [`SsdpRecord`].
///
/// Header lines are matched case-insensitively on the text before the
/// first colon; status lines (anything starting `http`) are skipped. A
/// field that fails to parse is logged and left at its default — one bad
/// header never discards the rest of the datagram.
pub fn parse_datagram(payload: &str, sender: SocketAddr) -> SsdpRecord {
    let mut record = SsdpRecord {
        source_address: sender.ip().to_string(),
        ..SsdpRecord::default()
    };

    for raw_line in payload.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        // Status lines ("HTTP/1.1 200 OK") carry no header.
        if line
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("http"))
        {
            continue;
        }
        // Request lines ("NOTIFY * HTTP/1.1") have no colon and fall out here.
        let Some(colon) = line.find(':') else {
            continue;
        };

        let name = line[..colon].trim().to_ascii_lowercase();
        let value = line[colon + 1..].trim();

        match name.as_str() {
            "server" => parse_server(value, &mut record),
            "location" => parse_location(value, sender, &mut record),
            "usn" => parse_usn(line, &mut record),
            "mipas" => record.mipas_supported = true,
            // Unknown headers (CACHE-CONTROL, EXT, NT, NTS, ...) are ignored.
            _ => {}
        }
    }

    record
}

/// SERVER is expected as `<os>/<osVersion> UPnP/<v> <product>/<productVersion>`.
///
/// Devices that deviate get partitioned around the `UPnP/` token instead;
/// whatever is still missing becomes "Not provided".
fn parse_server(value: &str, record: &mut SsdpRecord) {
    let tokens: Vec<&str> = value.split_whitespace().collect();

    let (os_segment, product_segment) = if tokens.len() == 3 && is_upnp_token(tokens[1]) {
        (tokens[0].to_string(), tokens[2].to_string())
    } else {
        tracing::debug!(server = value, "SERVER header deviates from the three-token form");
        match tokens.iter().position(|token| is_upnp_token(token)) {
            Some(pos) => (tokens[..pos].join(" "), tokens[pos + 1..].join(" ")),
            None => (String::new(), tokens.join(" ")),
        }
    };

    let (os, os_version) = split_versioned(&os_segment);
    let (server, product_version) = split_versioned(&product_segment);

    record.os = os;
    record.os_version = os_version;
    record.server = server;
    record.product_version = product_version;
}

fn is_upnp_token(token: &str) -> bool {
    token
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("upnp/"))
}

fn split_versioned(segment: &str) -> (String, String) {
    if segment.is_empty() {
        return (NOT_PROVIDED.to_string(), NOT_PROVIDED.to_string());
    }
    match segment.rsplit_once('/') {
        Some((name, version)) => (
            non_empty_or_placeholder(name),
            non_empty_or_placeholder(version),
        ),
        None => (segment.to_string(), NOT_PROVIDED.to_string()),
    }
}

fn non_empty_or_placeholder(text: &str) -> String {
    if text.is_empty() {
        NOT_PROVIDED.to_string()
    } else {
        text.to_string()
    }
}

/// LOCATION is the most error-prone field. Observed forms:
///
/// - fully qualified with port: `http://172.16.130.67:80/Basic_info.xml`
/// - absolute without port:     `http://172.16.130.67/Basic_info.xml`
/// - relative path:             `/Basic_info.xml`
///
/// Whatever arrived, the record ends up with a well-formed absolute URL
/// (sender IP and port 80 filling the gaps) plus the scheme://host:port
/// prefix used later to resolve relative presentation URLs.
fn parse_location(value: &str, sender: SocketAddr, record: &mut SsdpRecord) {
    let scheme = value
        .split_once("://")
        .map(|(scheme, _)| scheme)
        .filter(|scheme| !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphabetic()));

    if let Some((ip_start, ip_end)) = find_ipv4(value) {
        if let Some(port_end) = port_end_after(value, ip_end) {
            // Fully qualified with port.
            let host = &value[ip_start..port_end];
            record.location = match scheme {
                Some(_) => value.to_string(),
                None => format!("http://{value}"),
            };
            record.location_base = format!("{}://{}", scheme.unwrap_or("http"), host);
        } else {
            // Absolute without port: synthesize :80 after the host.
            let host = &value[ip_start..ip_end];
            let with_port = format!("{}:80{}", &value[..ip_end], &value[ip_end..]);
            record.location = match scheme {
                Some(_) => with_port,
                None => format!("http://{with_port}"),
            };
            record.location_base = format!("{}://{}:80", scheme.unwrap_or("http"), host);
        }
    } else {
        // Relative path: anchor at the sender.
        tracing::debug!(location = value, "relative LOCATION, anchoring at sender");
        let path = value.trim_start_matches('/');
        record.location = format!("http://{}:80/{}", sender.ip(), path);
        record.location_base = format!("http://{}:80", sender.ip());
    }
}

/// Find the first IPv4 literal embedded in `text`, returning byte offsets.
fn find_ipv4(text: &str) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        let mut end = i;
        while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'.') {
            end += 1;
        }
        let candidate = text[start..end].trim_end_matches('.');
        if is_ipv4(candidate) {
            return Some((start, start + candidate.len()));
        }
        i = end.max(start + 1);
    }
    None
}

fn is_ipv4(candidate: &str) -> bool {
    let octets: Vec<&str> = candidate.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|octet| !octet.is_empty() && octet.len() <= 3 && octet.parse::<u8>().is_ok())
}

/// If `text[ip_end..]` starts a `:port` suffix, return the offset past it.
fn port_end_after(text: &str, ip_end: usize) -> Option<usize> {
    let rest = text.get(ip_end..)?;
    let after_colon = rest.strip_prefix(':')?;
    let digits = after_colon
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 || after_colon[..digits].parse::<u16>().is_err() {
        return None;
    }
    Some(ip_end + 1 + digits)
}

/// The USN's third colon-delimited field is the device uuid
/// (`USN: uuid:<uuid>::upnp:rootdevice`).
fn parse_usn(line: &str, record: &mut SsdpRecord) {
    match line.split(':').nth(2) {
        Some(uuid) if !uuid.trim().is_empty() => record.uuid = uuid.trim().to_string(),
        _ => tracing::debug!(usn = line, "USN header without a uuid field"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::net::{IpAddr, Ipv4Addr};

    fn sender() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(172, 16, 130, 67)), 1900)
    }

    #[test]
    fn parses_canonical_response() {
        let payload = "HTTP/1.1 200 OK\r\n\
            CACHE-CONTROL: max-age=1800\r\n\
            LOCATION: http://172.16.130.67:80/Basic_info.xml\r\n\
            SERVER: lwIP/1.4.1 UPnP/2.0 8SMC5-USB/4.7.7\r\n\
            USN: uuid:40001d0a-0000-0000-8e31-4010900b00c8::upnp:rootdevice\r\n\
            \r\n";

        let record = parse_datagram(payload, sender());

        assert_eq!(record.server, "8SMC5-USB");
        assert_eq!(record.product_version, "4.7.7");
        assert_eq!(record.os, "lwIP");
        assert_eq!(record.os_version, "1.4.1");
        assert_eq!(record.location, "http://172.16.130.67:80/Basic_info.xml");
        assert_eq!(record.location_base, "http://172.16.130.67:80");
        assert_eq!(record.source_address, "172.16.130.67");
        assert_eq!(record.uuid, "40001d0a-0000-0000-8e31-4010900b00c8");
        assert!(!record.mipas_supported);
    }

    #[test]
    fn header_names_match_case_insensitively() {
        let payload = "HTTP/1.1 200 OK\r\n\
            location: http://10.0.0.2:80/desc.xml\r\n\
            Server: lwIP/1.4.1 UPnP/2.0 Dev/1.0.0\r\n";

        let record = parse_datagram(payload, sender());
        assert_eq!(record.server, "Dev");
        assert_eq!(record.location, "http://10.0.0.2:80/desc.xml");
    }

    #[test]
    fn server_with_extra_tokens_partitions_around_upnp() {
        let payload = "SERVER: Linux 3.14 something/2 UPnP/1.1 Vendor Product/2.3\r\n";
        let record = parse_datagram(payload, sender());

        assert_eq!(record.server, "Vendor Product");
        assert_eq!(record.product_version, "2.3");
        assert_eq!(record.os, "Linux 3.14 something");
        assert_eq!(record.os_version, "2");
    }

    #[test]
    fn server_missing_fields_become_not_provided() {
        let record = parse_datagram("SERVER: UPnP/1.0\r\n", sender());
        assert_eq!(record.server, NOT_PROVIDED);
        assert_eq!(record.product_version, NOT_PROVIDED);
        assert_eq!(record.os, NOT_PROVIDED);
        assert_eq!(record.os_version, NOT_PROVIDED);

        let record = parse_datagram("SERVER: UPnP/1.0 Product\r\n", sender());
        assert_eq!(record.server, "Product");
        assert_eq!(record.product_version, NOT_PROVIDED);
    }

    #[test]
    fn server_without_upnp_token_is_treated_as_product() {
        let record = parse_datagram("SERVER: CustomOS Product/9.9\r\n", sender());
        assert_eq!(record.server, "CustomOS Product");
        assert_eq!(record.product_version, "9.9");
        assert_eq!(record.os, NOT_PROVIDED);
    }

    #[rstest]
    #[case::absolute_with_port(
        "http://172.16.130.67:8080/info.xml",
        "http://172.16.130.67:8080/info.xml",
        "http://172.16.130.67:8080"
    )]
    #[case::absolute_without_port(
        "http://172.16.130.67/info.xml",
        "http://172.16.130.67:80/info.xml",
        "http://172.16.130.67:80"
    )]
    #[case::no_scheme_with_port(
        "10.1.2.3:80/info.xml",
        "http://10.1.2.3:80/info.xml",
        "http://10.1.2.3:80"
    )]
    #[case::relative(
        "/info.xml",
        "http://172.16.130.67:80/info.xml",
        "http://172.16.130.67:80"
    )]
    #[case::relative_without_slash(
        "info.xml",
        "http://172.16.130.67:80/info.xml",
        "http://172.16.130.67:80"
    )]
    fn location_always_yields_absolute_url(
        #[case] raw: &str,
        #[case] expected_location: &str,
        #[case] expected_base: &str,
    ) {
        let payload = format!("LOCATION: {raw}\r\n");
        let record = parse_datagram(&payload, sender());

        assert_eq!(record.location, expected_location);
        assert_eq!(record.location_base, expected_base);
        // The dedup key is always the plain sender IP, whatever LOCATION said.
        assert_eq!(record.source_address, "172.16.130.67");
    }

    #[test]
    fn malformed_usn_degrades_without_discarding_other_fields() {
        let payload = "USN: upnp-rootdevice-no-uuid\r\n\
            SERVER: lwIP/1.4.1 UPnP/2.0 8SMC5-USB/4.7.7\r\n";
        let record = parse_datagram(payload, sender());

        assert_eq!(record.uuid, "");
        assert_eq!(record.server, "8SMC5-USB");
    }

    #[test]
    fn mipas_header_sets_flag_regardless_of_value() {
        let record = parse_datagram("MIPAS: 1.0.0\r\n", sender());
        assert!(record.mipas_supported);

        let record = parse_datagram("mipas:\r\n", sender());
        assert!(record.mipas_supported);
    }

    #[test]
    fn notify_request_line_and_unknown_headers_are_ignored() {
        let payload = "NOTIFY * HTTP/1.1\r\n\
            HOST: 239.255.255.250:1900\r\n\
            NT: upnp:rootdevice\r\n\
            NTS: ssdp:alive\r\n\
            SERVER: lwIP/1.4.1 UPnP/2.0 8SMC5-USB/4.7.9\r\n";
        let record = parse_datagram(payload, sender());

        assert_eq!(record.server, "8SMC5-USB");
        assert_eq!(record.product_version, "4.7.9");
    }

    #[test]
    fn empty_payload_yields_default_record_with_sender() {
        let record = parse_datagram("", sender());
        assert_eq!(record.server, "");
        assert_eq!(record.source_address, "172.16.130.67");
    }
}
