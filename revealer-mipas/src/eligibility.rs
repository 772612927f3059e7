//! Deciding whether a discovered device accepts MIPAS reconfiguration.

use revealer_codec::SsdpRecord;

use crate::vendor::VendorTable;

/// Outcome of the eligibility check for one SSDP record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MipasClassification {
    /// One of ours, firmware new enough: carries the uuid to address it by.
    Eligible { uuid: String },
    /// One of ours, but this firmware predates remote configuration.
    /// Shown with configuration disabled (the blank-uuid state).
    FirmwareTooOld,
    /// Not a vendor device; MIPAS does not apply.
    NotApplicable,
}

impl MipasClassification {
    /// The tri-state uuid stored on the device entry: `None` = not
    /// applicable, `Some("")` = ours but not configurable, non-empty =
    /// configurable.
    pub fn entry_uuid(&self) -> Option<String> {
        match self {
            Self::Eligible { uuid } => Some(uuid.clone()),
            Self::FirmwareTooOld => Some(String::new()),
            Self::NotApplicable => None,
        }
    }

    /// Ours-vs-other presentation category.
    pub fn is_ours(&self) -> bool {
        !matches!(self, Self::NotApplicable)
    }
}

/// Classify a decoded record against the vendor table.
///
/// A table hit compares the reported firmware against the descriptor's
/// minimum, segment-wise. A miss is still eligible when the device itself
/// advertised a MIPAS header — newer products may not be in the shipped
/// table yet, and the device knows best.
pub fn classify(table: &VendorTable, record: &SsdpRecord) -> MipasClassification {
    if let Some(descriptor) = table.lookup(&record.server) {
        if version_at_least(&record.product_version, &descriptor.min_firmware) {
            return MipasClassification::Eligible {
                uuid: record.uuid.clone(),
            };
        }
        tracing::debug!(
            product = %record.server,
            reported = %record.product_version,
            minimum = %descriptor.min_firmware,
            "firmware predates MIPAS support"
        );
        return MipasClassification::FirmwareTooOld;
    }

    if record.mipas_supported {
        return MipasClassification::Eligible {
            uuid: record.uuid.clone(),
        };
    }

    MipasClassification::NotApplicable
}

/// Segment-wise numeric comparison: major, then minor, then patch.
/// Missing segments count as zero; a non-numeric segment compares as zero.
fn version_at_least(reported: &str, minimum: &str) -> bool {
    let reported: Vec<u64> = reported.split('.').map(parse_segment).collect();
    let minimum: Vec<u64> = minimum.split('.').map(parse_segment).collect();

    for i in 0..reported.len().max(minimum.len()) {
        let r = reported.get(i).copied().unwrap_or(0);
        let m = minimum.get(i).copied().unwrap_or(0);
        if r != m {
            return r > m;
        }
    }
    true
}

fn parse_segment(segment: &str) -> u64 {
    match segment.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::debug!(segment, "non-numeric version segment, comparing as 0");
            0
        }
    }
}
