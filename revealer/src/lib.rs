//! Revealer — find vendor devices on the local networks and point them at
//! new network settings.
//!
//! Devices are discovered two ways at once: an SSDP M-SEARCH fanned over
//! every adapter (current firmware) and a plain UDP broadcast probe
//! (first-generation firmware). Replies land in a deduplicated, sorted
//! device table; devices whose firmware supports it can then be handed
//! new network settings over the proprietary MIPAS multicast exchange.
//!
//! ```no_run
//! use revealer::{RegistryEvent, Revealer};
//!
//! let (revealer, events) = Revealer::new();
//! revealer.start_search()?;
//! for event in events {
//!     match event {
//!         RegistryEvent::EntryAdded(entry) => println!("{} @ {}", entry.display_name, entry.link),
//!         RegistryEvent::SearchFinished => break,
//!         _ => {}
//!     }
//! }
//! # Ok::<(), revealer::RevealerError>(())
//! ```

mod error;
mod revealer;

pub use crate::revealer::Revealer;
pub use error::RevealerError;

pub use revealer_codec::SsdpRecord;
pub use revealer_discovery::DiscoveryConfig;
pub use revealer_mipas::{MipasSettings, ValidationError};
pub use revealer_registry::{
    DeviceCategory, DeviceEntry, DeviceTag, Diagnostic, DiagnosticScope, RegistryEvent,
    UpnpProperties,
};
