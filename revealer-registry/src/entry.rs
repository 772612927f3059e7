use std::collections::BTreeMap;

use serde::Serialize;

/// Flat tag-local-name → text view of a device's UPnP description,
/// merged with the originating SSDP record's fields before insertion.
pub type UpnpProperties = BTreeMap<String, String>;

/// How a device was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceTag {
    /// SSDP device whose description was fetched: it is on a reachable subnet.
    Local,
    /// SSDP device that answered but whose description could not be fetched.
    NotLocal,
    /// Device found via the legacy broadcast protocol.
    OldLocal,
}

/// Whether the device is one of ours or a third-party UPnP device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceCategory {
    Ours,
    Other,
}

/// One row of the discovered-device table.
///
/// Created on first observation of a unique identity within a session and
/// never mutated; removed only when a reconfiguration for it is confirmed.
///
/// `uuid` is a tri-state: `None` means MIPAS is not applicable (third-party
/// device), `Some("")` means one of ours whose firmware predates remote
/// configuration (shown, configuration disabled), non-empty means
/// configurable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceEntry {
    pub display_name: String,
    pub tag: DeviceTag,
    pub category: DeviceCategory,
    /// Presentation URL when the device provided one, plain IP otherwise.
    pub link: String,
    pub ip_address: String,
    pub uuid: Option<String>,
    pub properties: Option<UpnpProperties>,
    /// 1-based presentation row, maintained by the registry.
    pub row: usize,
}

impl DeviceEntry {
    /// An entry discovered over SSDP.
    pub fn ssdp(
        display_name: impl Into<String>,
        tag: DeviceTag,
        category: DeviceCategory,
        link: impl Into<String>,
        ip_address: impl Into<String>,
        uuid: Option<String>,
        properties: Option<UpnpProperties>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            tag,
            category,
            link: link.into(),
            ip_address: ip_address.into(),
            uuid,
            properties,
            row: 0,
        }
    }

    /// An entry discovered over the legacy broadcast protocol. The device
    /// only reveals its address, so the name is the address and the link
    /// points at the firmware's fixed web port.
    pub fn legacy(ip_address: impl Into<String>, link: impl Into<String>) -> Self {
        let ip_address = ip_address.into();
        Self {
            display_name: ip_address.clone(),
            tag: DeviceTag::OldLocal,
            category: DeviceCategory::Ours,
            link: link.into(),
            ip_address,
            uuid: None,
            properties: None,
            row: 0,
        }
    }

    /// True when the device accepts MIPAS reconfiguration.
    pub fn configurable(&self) -> bool {
        matches!(&self.uuid, Some(uuid) if !uuid.is_empty())
    }
}
