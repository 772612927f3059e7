use std::collections::HashSet;
use std::sync::{mpsc, Mutex, MutexGuard};

use crate::entry::{DeviceCategory, DeviceEntry, DeviceTag};

/// Notifications produced for the presentation layer.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    EntryAdded(DeviceEntry),
    EntryRemoved(DeviceEntry),
    SearchFinished,
}

/// The authoritative, deduplicated, sorted collection of discovered
/// devices for one session.
///
/// Sort rule: Ours-category SSDP devices form a case-insensitive
/// alphabetical block above Other-category devices (also alphabetical);
/// legacy (OldLocal) devices form their own alphabetical block after all
/// SSDP devices. Row numbers are 1-based and recomputed on every insert.
///
/// Identity: `display_name + link` for SSDP devices, guarded by a
/// session-wide `ip + uuid` key (with a UDN fallback from the device's
/// description); plain `ip` for legacy devices. First writer wins;
/// re-discovery is a no-op.
pub struct DeviceRegistry {
    inner: Mutex<Inner>,
    event_tx: Option<mpsc::Sender<RegistryEvent>>,
}

#[derive(Default)]
struct Inner {
    ssdp: Vec<DeviceEntry>,
    legacy: Vec<DeviceEntry>,
    /// display_name + link, SSDP identity.
    ssdp_keys: HashSet<String>,
    /// ip + uuid (or UDN fallback), whole-session identity.
    address_keys: HashSet<String>,
    /// Every inserted address; legacy replies already seen over SSDP
    /// (or legacy) dedup against this.
    seen_ips: HashSet<String>,
}

impl DeviceRegistry {
    /// Create a registry wired to an event channel.
    pub fn new() -> (Self, mpsc::Receiver<RegistryEvent>) {
        let (event_tx, event_rx) = mpsc::channel();
        (
            Self {
                inner: Mutex::new(Inner::default()),
                event_tx: Some(event_tx),
            },
            event_rx,
        )
    }

    /// Registry without an event channel.
    pub fn detached() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            event_tx: None,
        }
    }

    /// Insert a discovered device. Returns false when the identity was
    /// already seen this session (the insert is then a no-op).
    pub fn insert(&self, entry: DeviceEntry) -> bool {
        let mut inner = self.lock();

        let inserted = match entry.tag {
            DeviceTag::OldLocal => Self::insert_legacy(&mut inner, entry),
            DeviceTag::Local | DeviceTag::NotLocal => Self::insert_ssdp(&mut inner, entry),
        };

        if let Some(entry) = inserted {
            tracing::debug!(name = %entry.display_name, row = entry.row, "device added");
            self.emit(RegistryEvent::EntryAdded(entry));
            true
        } else {
            false
        }
    }

    fn insert_ssdp(inner: &mut Inner, entry: DeviceEntry) -> Option<DeviceEntry> {
        let address_key = format!("{}{}", entry.ip_address, session_uuid(&entry));
        if inner.address_keys.contains(&address_key) {
            tracing::debug!(key = %address_key, "duplicate address identity, ignoring");
            return None;
        }
        let identity = format!("{}{}", entry.display_name, entry.link);
        if inner.ssdp_keys.contains(&identity) {
            tracing::debug!(key = %identity, "duplicate ssdp identity, ignoring");
            return None;
        }

        inner.address_keys.insert(address_key);
        inner.ssdp_keys.insert(identity);
        inner.seen_ips.insert(entry.ip_address.clone());

        let key = sort_key(&entry);
        let ours_count = inner
            .ssdp
            .iter()
            .filter(|e| e.category == DeviceCategory::Ours)
            .count();

        let index = match entry.category {
            DeviceCategory::Ours => position_by_key(&inner.ssdp[..ours_count], &key),
            DeviceCategory::Other => {
                ours_count + position_by_key(&inner.ssdp[ours_count..], &key)
            }
        };

        inner.ssdp.insert(index, entry);
        renumber(inner);
        Some(inner.ssdp[index].clone())
    }

    fn insert_legacy(inner: &mut Inner, entry: DeviceEntry) -> Option<DeviceEntry> {
        if inner.seen_ips.contains(&entry.ip_address) {
            tracing::debug!(ip = %entry.ip_address, "legacy reply from known device, ignoring");
            return None;
        }
        inner.seen_ips.insert(entry.ip_address.clone());

        let key = sort_key(&entry);
        let index = position_by_key(&inner.legacy, &key);
        inner.legacy.insert(index, entry);
        renumber(inner);
        Some(inner.legacy[index].clone())
    }

    /// Remove the entry for a successfully reconfigured device. The device
    /// is expected to re-announce under its new parameters on a later
    /// search, so its identity keys are released too.
    pub fn remove_by_uuid(&self, uuid: &str) -> Option<DeviceEntry> {
        // A blank uuid marks "ours, not configurable"; it is not an identity.
        if uuid.is_empty() {
            return None;
        }
        let mut inner = self.lock();

        let index = inner
            .ssdp
            .iter()
            .position(|e| e.uuid.as_deref() == Some(uuid))?;
        let entry = inner.ssdp.remove(index);

        let address_key = format!("{}{}", entry.ip_address, session_uuid(&entry));
        inner.address_keys.remove(&address_key);
        inner
            .ssdp_keys
            .remove(&format!("{}{}", entry.display_name, entry.link));
        inner.seen_ips.remove(&entry.ip_address);
        renumber(&mut inner);

        tracing::debug!(name = %entry.display_name, "device removed after reconfiguration");
        self.emit(RegistryEvent::EntryRemoved(entry.clone()));
        Some(entry)
    }

    /// Drop all entries and identity keys. Called once at session start.
    pub fn clear(&self) {
        *self.lock() = Inner::default();
    }

    /// Row-ordered copy of the table: SSDP block, then the legacy block.
    pub fn snapshot(&self) -> Vec<DeviceEntry> {
        let inner = self.lock();
        inner
            .ssdp
            .iter()
            .chain(inner.legacy.iter())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.lock();
        inner.ssdp.len() + inner.legacy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Announce the end of a discovery session to the consumer.
    pub fn notify_search_finished(&self) {
        self.emit(RegistryEvent::SearchFinished);
    }

    fn emit(&self, event: RegistryEvent) {
        if let Some(tx) = &self.event_tx {
            // A departed consumer is not an error for the engine.
            let _ = tx.send(event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Case-insensitive alphabetical key, name first then link.
fn sort_key(entry: &DeviceEntry) -> String {
    format!("{}{}", entry.display_name, entry.link).to_uppercase()
}

/// Index of the first entry sorting after `key` within an already-sorted
/// block, i.e. the insertion point keeping the block alphabetical.
fn position_by_key(block: &[DeviceEntry], key: &str) -> usize {
    block
        .iter()
        .position(|e| sort_key(e).as_str() > key)
        .unwrap_or(block.len())
}

/// The session-wide dedup uses the device uuid when the record carried
/// one; devices without an applicable uuid fall back to the UDN from
/// their description.
fn session_uuid(entry: &DeviceEntry) -> String {
    match &entry.uuid {
        Some(uuid) => uuid.clone(),
        None => entry
            .properties
            .as_ref()
            .and_then(|p| p.get("UDN"))
            .map(|udn| udn.strip_prefix("uuid:").unwrap_or(udn).to_string())
            .unwrap_or_default(),
    }
}

fn renumber(inner: &mut Inner) {
    let mut row = 0;
    for entry in inner.ssdp.iter_mut().chain(inner.legacy.iter_mut()) {
        row += 1;
        entry.row = row;
    }
}
