use thiserror::Error;

/// Failures that abort a whole discovery pass. Per-address and
/// per-datagram trouble never surfaces here — it degrades into the
/// session's diagnostic buffer instead.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The HTTP client for description fetches could not be built.
    #[error("failed to build the description HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The shared NOTIFY port (1900) could not be claimed. Without it no
    /// asynchronous announcements can be heard, so the search cannot start.
    #[error("the shared NOTIFY port is unavailable: {0}")]
    NotifyUnavailable(#[source] std::io::Error),
}
