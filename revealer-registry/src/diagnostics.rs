use std::sync::Mutex;

/// Where in the pipeline a failure was caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticScope {
    /// Bind/send/receive failure on one local address.
    Transport,
    /// Malformed header or XML document, degraded to a partial record.
    Protocol,
    /// Reconfiguration input rejected before any packet was sent.
    Validation,
    /// No confirming reply within the negotiation window.
    Negotiation,
}

/// One accumulated per-session diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub scope: DiagnosticScope,
    /// What was being worked on, usually an address or URL.
    pub context: String,
    pub message: String,
}

/// Bounded per-session diagnostic buffer.
///
/// Per-datagram and per-address failures land here instead of aborting the
/// session; the presentation layer can show the buffer after a search.
/// Every push is mirrored to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
}

/// Keep a session's buffer from growing unbounded on a noisy network.
const MAX_ENTRIES: usize = 512;

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &self,
        scope: DiagnosticScope,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            scope,
            context: context.into(),
            message: message.into(),
        };
        tracing::debug!(
            scope = ?diagnostic.scope,
            context = %diagnostic.context,
            "{}",
            diagnostic.message
        );

        let mut entries = lock_unpoisoned(&self.entries);
        if entries.len() < MAX_ENTRIES {
            entries.push(diagnostic);
        }
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        lock_unpoisoned(&self.entries).clone()
    }

    pub fn clear(&self) {
        lock_unpoisoned(&self.entries).clear();
    }

    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.entries).is_empty()
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_clears() {
        let log = DiagnosticLog::new();
        assert!(log.is_empty());

        log.push(DiagnosticScope::Transport, "10.0.0.1", "bind failed");
        log.push(DiagnosticScope::Protocol, "10.0.0.9", "bad USN");

        let entries = log.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].scope, DiagnosticScope::Transport);
        assert_eq!(entries[1].context, "10.0.0.9");

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn caps_entry_count() {
        let log = DiagnosticLog::new();
        for i in 0..(MAX_ENTRIES + 50) {
            log.push(DiagnosticScope::Protocol, format!("ctx-{i}"), "noise");
        }
        assert_eq!(log.snapshot().len(), MAX_ENTRIES);
    }
}
