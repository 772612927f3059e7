use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};

use revealer_discovery::{
    local_addresses, DiscoveryConfig, DiscoveryCoordinator, LegacyDiscoveryCoordinator,
    NotifyListener,
};
use revealer_mipas::{MipasError, MipasSettings, NotifySource, SettingsNegotiator};
use revealer_registry::{
    DeviceEntry, DeviceRegistry, Diagnostic, DiagnosticLog, DiagnosticScope, RegistryEvent,
};
use revealer_scheduler::{CancelToken, Worker};

use crate::error::RevealerError;

/// The discovery engine.
///
/// Owns the device registry, the diagnostic buffer, one long-lived worker
/// per protocol, and the shared NOTIFY socket. A search runs the SSDP and
/// legacy passes in parallel; when the second one finishes the registry
/// announces `SearchFinished`. Searches are serialized — starting one
/// while another runs is refused rather than queued, and reconfiguration
/// is refused while a search is listening.
pub struct Revealer {
    config: DiscoveryConfig,
    registry: Arc<DeviceRegistry>,
    diagnostics: Arc<DiagnosticLog>,
    ssdp_worker: Worker,
    legacy_worker: Worker,
    /// Bound lazily on the first search; kept for the engine's lifetime so
    /// the negotiator can drain announcements between searches.
    notify: Mutex<Option<Arc<NotifyListener>>>,
    session: Mutex<CancelToken>,
    /// Passes still running in the current search (0 = idle).
    passes_pending: Arc<AtomicUsize>,
}

impl Revealer {
    pub fn new() -> (Self, mpsc::Receiver<RegistryEvent>) {
        Self::with_config(DiscoveryConfig::default())
    }

    pub fn with_config(config: DiscoveryConfig) -> (Self, mpsc::Receiver<RegistryEvent>) {
        let (registry, events) = DeviceRegistry::new();
        (
            Self {
                config,
                registry: Arc::new(registry),
                diagnostics: Arc::new(DiagnosticLog::new()),
                ssdp_worker: Worker::spawn("revealer-ssdp"),
                legacy_worker: Worker::spawn("revealer-legacy"),
                notify: Mutex::new(None),
                session: Mutex::new(CancelToken::new()),
                passes_pending: Arc::new(AtomicUsize::new(0)),
            },
            events,
        )
    }

    /// Start a search: wipe the previous session's results and run the
    /// SSDP and legacy passes concurrently. Returns as soon as both are
    /// scheduled; completion arrives as `RegistryEvent::SearchFinished`.
    pub fn start_search(&self) -> Result<(), RevealerError> {
        if self.is_searching() {
            return Err(RevealerError::SearchInProgress);
        }

        // Without the NOTIFY port no announcements can be heard; refuse
        // the search and let a later one retry the bind.
        let notify = self.ensure_notify_bound()?;

        self.registry.clear();
        self.diagnostics.clear();

        let session = CancelToken::new();
        *lock_unpoisoned(&self.session) = session.clone();
        self.passes_pending.store(2, Ordering::SeqCst);

        {
            let coordinator = DiscoveryCoordinator::new(
                self.config.clone(),
                Arc::clone(&self.registry),
                Arc::clone(&self.diagnostics),
            );
            let registry = Arc::clone(&self.registry);
            let pending = Arc::clone(&self.passes_pending);
            let session = session.clone();
            self.ssdp_worker.submit(move || {
                coordinator.run_session(&session, Some(notify));
                finish_pass(&pending, &registry);
            });
        }
        {
            let coordinator = LegacyDiscoveryCoordinator::new(
                self.config.clone(),
                Arc::clone(&self.registry),
                Arc::clone(&self.diagnostics),
            );
            let registry = Arc::clone(&self.registry);
            let pending = Arc::clone(&self.passes_pending);
            self.legacy_worker.submit(move || {
                coordinator.run_session(&session);
                finish_pass(&pending, &registry);
            });
        }

        tracing::info!("search started");
        Ok(())
    }

    pub fn is_searching(&self) -> bool {
        self.passes_pending.load(Ordering::SeqCst) != 0
    }

    /// Push new network settings to the device behind `uuid` and wait for
    /// its acknowledgement. Blocks through the negotiation windows; on
    /// success the device reboots into its new address, so its stale
    /// entry is dropped from the registry.
    pub fn reconfigure(
        &self,
        uuid: &str,
        settings: &MipasSettings,
    ) -> Result<(), RevealerError> {
        if self.is_searching() {
            return Err(RevealerError::SearchInProgress);
        }

        let notify = lock_unpoisoned(&self.notify).clone();
        let negotiator = SettingsNegotiator::new(
            self.config.mipas_unicast_window,
            self.config.mipas_notify_window,
        );
        let addresses = local_addresses();

        match negotiator.reconfigure(
            &addresses,
            notify.as_deref().map(|listener| listener as &dyn NotifySource),
            uuid,
            settings,
        ) {
            Ok(_record) => {
                tracing::info!(uuid, "settings applied, dropping the stale entry");
                self.registry.remove_by_uuid(uuid);
                Ok(())
            }
            Err(error) => {
                let scope = match &error {
                    MipasError::Validation(_) => DiagnosticScope::Validation,
                    MipasError::Transport(_) => DiagnosticScope::Transport,
                    MipasError::NoReply { .. } => DiagnosticScope::Negotiation,
                };
                self.diagnostics.push(scope, uuid, error.to_string());
                Err(error.into())
            }
        }
    }

    /// Current table contents, sorted and row-numbered.
    pub fn snapshot(&self) -> Vec<DeviceEntry> {
        self.registry.snapshot()
    }

    /// Everything a device told us, as displayable pairs in key order.
    pub fn view_properties(&self, entry: &DeviceEntry) -> Vec<(String, String)> {
        entry
            .properties
            .as_ref()
            .map(|properties| {
                properties
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Failures accumulated since the current session started.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.snapshot()
    }

    /// Cancel whatever is running and wait for the workers to drain.
    pub fn shutdown(&self) {
        lock_unpoisoned(&self.session).cancel();
        self.ssdp_worker.wait_idle();
        self.legacy_worker.wait_idle();
    }

    fn ensure_notify_bound(&self) -> Result<Arc<NotifyListener>, RevealerError> {
        let mut slot = lock_unpoisoned(&self.notify);
        if let Some(listener) = slot.as_ref() {
            return Ok(Arc::clone(listener));
        }
        let listener = Arc::new(NotifyListener::bind(&self.config)?);
        *slot = Some(Arc::clone(&listener));
        Ok(listener)
    }
}

impl Drop for Revealer {
    fn drop(&mut self) {
        // Flip the session flag so the worker drops behind us join fast.
        lock_unpoisoned(&self.session).cancel();
    }
}

fn finish_pass(pending: &AtomicUsize, registry: &DeviceRegistry) {
    if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
        tracing::info!("search finished");
        registry.notify_search_finished();
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revealer_mipas::ValidationError;
    use revealer_registry::{DeviceCategory, DeviceTag, UpnpProperties};

    #[test]
    fn invalid_settings_fail_fast_and_are_recorded() {
        let (revealer, _events) = Revealer::new();
        let result = revealer.reconfigure("uuid-123", &MipasSettings::dhcp(""));

        assert!(matches!(
            result,
            Err(RevealerError::Mipas(MipasError::Validation(
                ValidationError::MissingPassword
            )))
        ));

        let diagnostics = revealer.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].scope, DiagnosticScope::Validation);
        assert_eq!(diagnostics[0].context, "uuid-123");
    }

    #[test]
    fn properties_view_is_empty_for_bare_entries() {
        let (revealer, _events) = Revealer::new();
        let entry = DeviceEntry::legacy("192.168.1.9", "http://192.168.1.9:8080");
        assert!(revealer.view_properties(&entry).is_empty());
    }

    #[test]
    fn properties_view_lists_pairs_in_key_order() {
        let (revealer, _events) = Revealer::new();
        let mut properties = UpnpProperties::new();
        properties.insert("serialNumber".to_string(), "ABC123".to_string());
        properties.insert("friendlyName".to_string(), "8SMC5-USB".to_string());

        let entry = DeviceEntry::ssdp(
            "8SMC5-USB",
            DeviceTag::Local,
            DeviceCategory::Ours,
            "http://192.168.1.20/ximc_info.html",
            "192.168.1.20",
            Some("40001-abc".to_string()),
            Some(properties),
        );

        let pairs = revealer.view_properties(&entry);
        assert_eq!(pairs[0].0, "friendlyName");
        assert_eq!(pairs[1].0, "serialNumber");
    }
}
