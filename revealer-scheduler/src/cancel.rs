use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Shared cancellation flag checked cooperatively by receive loops.
///
/// Cloning yields a handle to the same flag. A token never un-cancels;
/// each listen window or session gets a fresh one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Spawn a companion timer that cancels this token after `window`.
    ///
    /// Used to bound per-adapter listen windows: the receive loop blocks in
    /// short timed reads and re-checks the token between them, so it
    /// unblocks within one read timeout of the window elapsing.
    pub fn cancel_after(&self, window: Duration) {
        let token = self.clone();
        thread::spawn(move || {
            thread::sleep(window);
            token.cancel();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn starts_uncancelled_and_latches() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        assert!(token.is_cancelled());

        // Clones observe the same flag.
        let clone = token.clone();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn clone_cancellation_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_after_flips_within_window() {
        let token = CancelToken::new();
        let start = Instant::now();
        token.cancel_after(Duration::from_millis(50));

        while !token.is_cancelled() {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "timer never fired"
            );
            thread::sleep(Duration::from_millis(5));
        }
    }
}
