//! Session state for the discovery engine: the authoritative device table
//! and the per-session diagnostic buffer.
//!
//! The registry is read-mostly (polled by the presentation layer) and
//! write-concurrent (every per-adapter listener inserts into it), so it is
//! the one structure in the system behind a mutex. Sorting is a linear
//! insert behind that lock — fine at the expected scale of tens of
//! devices, and the interface hides the representation so a smarter
//! structure could drop in later.

mod diagnostics;
mod entry;
mod registry;

pub use diagnostics::{Diagnostic, DiagnosticLog, DiagnosticScope};
pub use entry::{DeviceCategory, DeviceEntry, DeviceTag, UpnpProperties};
pub use registry::{DeviceRegistry, RegistryEvent};
