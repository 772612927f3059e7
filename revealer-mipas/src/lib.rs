//! MIPAS — the proprietary multicast protocol for remotely reconfiguring
//! supporting devices' network settings.
//!
//! Three concerns live here: deciding whether a discovered device supports
//! MIPAS at all (the vendor capability table and firmware comparison),
//! validating requested settings before any packet leaves the machine, and
//! the negotiation itself — a targeted M-SEARCH fanned across every local
//! address, acknowledged by any reply from the addressed uuid.

mod eligibility;
mod error;
mod negotiator;
mod settings;
mod vendor;

pub use eligibility::{classify, MipasClassification};
pub use error::{MipasError, ValidationError};
pub use negotiator::{NotifySource, SettingsNegotiator};
pub use settings::MipasSettings;
pub use vendor::{EnhancedDeviceDescriptor, VendorTable};
