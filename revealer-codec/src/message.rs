//! Request templates.

/// Standard rootdevice M-SEARCH, byte-exact per the devices' expectations.
///
/// Several supported firmwares match the request literally, so the header
/// order and the absence of spaces after the colons are load-bearing.
pub fn build_msearch() -> String {
    "M-SEARCH * HTTP/1.1\r\n\
     HOST:239.255.255.250:1900\r\n\
     ST:upnp:rootdevice\r\n\
     MX:2\r\n\
     MAN:\"ssdp:discover\"\r\n\
     \r\n"
        .to_string()
}

/// Targeted reconfiguration probe: an M-SEARCH addressed to one device by
/// UUID, carrying the vendor MIPAS payload
/// (`<password>;<0|1 dhcp>;<ip>;<netmask>;<gateway>;`).
pub fn build_targeted_msearch(uuid: &str, mipas_payload: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST:239.255.255.250:1900\r\n\
         ST:uuid:{uuid}\r\n\
         MX:2\r\n\
         MAN:\"ssdp:discover\"\r\n\
         MIPAS:{mipas_payload}\r\n\
         \r\n"
    )
}
