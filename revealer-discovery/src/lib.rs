//! Network-facing discovery: SSDP multicast search, the shared NOTIFY
//! listener, UPnP description fetching, and the legacy broadcast protocol.
//!
//! The coordinators here own no session policy — they run one bounded
//! search pass each and feed whatever they hear into the registry. The
//! facade crate decides when passes start and when a session is over.

mod adapters;
mod config;
mod coordinator;
mod description;
mod error;
mod legacy;
mod notify;

pub use adapters::local_addresses;
pub use config::DiscoveryConfig;
pub use coordinator::DiscoveryCoordinator;
pub use description::DescriptionFetcher;
pub use error::DiscoveryError;
pub use legacy::LegacyDiscoveryCoordinator;
pub use notify::NotifyListener;
