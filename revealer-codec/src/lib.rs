//! SSDP message building and decoding.
//!
//! Builds the two request templates the discovery engine sends (the
//! rootdevice M-SEARCH and the targeted reconfiguration probe) and decodes
//! response/NOTIFY payloads into [`SsdpRecord`]s.
//!
//! Decoding is deliberately tolerant: devices in the field deviate from the
//! SSDP grammar in every imaginable way, so a malformed header degrades to
//! a logged diagnostic and a partial record, never an error. The parser
//! therefore has no failure mode and no error type.

mod message;
mod parse;

pub use message::{build_msearch, build_targeted_msearch};
pub use parse::parse_datagram;

/// Placeholder for SERVER sub-fields a device did not report.
pub const NOT_PROVIDED: &str = "Not provided";

/// Structured view of one SSDP response or NOTIFY datagram.
///
/// Fields the payload did not carry stay at their defaults; `server` in
/// particular is empty when the datagram had no SERVER header at all,
/// which downstream code uses to discard unusable replies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsdpRecord {
    /// Product name from the SERVER header (e.g. `8SMC5-USB`).
    pub server: String,
    /// Product firmware version from the SERVER header.
    pub product_version: String,
    /// OS token from the SERVER header (e.g. `lwIP`).
    pub os: String,
    /// OS version from the SERVER header.
    pub os_version: String,
    /// Absolute description URL, synthesized from LOCATION whatever form
    /// the device used.
    pub location: String,
    /// scheme://host:port prefix of `location`, for resolving relative
    /// presentation URLs later.
    pub location_base: String,
    /// Plain sender IP; the dedup/display key.
    pub source_address: String,
    /// UUID from the USN header, empty when absent or malformed.
    pub uuid: String,
    /// True when the datagram carried a vendor MIPAS header.
    pub mipas_supported: bool,
}
