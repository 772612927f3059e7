//! Static capability table for vendor devices.

/// Minimum firmware at which one of our products speaks MIPAS, plus the
/// protocol revision that firmware line implements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedDeviceDescriptor {
    pub product: String,
    pub min_firmware: String,
    pub protocol_version: String,
}

impl EnhancedDeviceDescriptor {
    pub fn new(
        product: impl Into<String>,
        min_firmware: impl Into<String>,
        protocol_version: impl Into<String>,
    ) -> Self {
        Self {
            product: product.into(),
            min_firmware: min_firmware.into(),
            protocol_version: protocol_version.into(),
        }
    }
}

/// Immutable lookup table passed into the eligibility check, so tests can
/// inject alternate vendor tables instead of patching a global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorTable {
    entries: Vec<EnhancedDeviceDescriptor>,
}

impl VendorTable {
    pub fn new(entries: Vec<EnhancedDeviceDescriptor>) -> Self {
        Self { entries }
    }

    /// The products shipped with the application.
    pub fn builtin() -> Self {
        Self::new(vec![EnhancedDeviceDescriptor::new(
            "8SMC5-USB",
            "4.7.9",
            "1.0.0",
        )])
    }

    /// Case-insensitive exact match on the product name.
    pub fn lookup(&self, product: &str) -> Option<&EnhancedDeviceDescriptor> {
        self.entries
            .iter()
            .find(|d| d.product.eq_ignore_ascii_case(product))
    }
}

impl Default for VendorTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_exact() {
        let table = VendorTable::builtin();
        assert!(table.lookup("8smc5-usb").is_some());
        assert!(table.lookup("8SMC5-USB").is_some());
        assert!(table.lookup("8SMC5").is_none());
        assert!(table.lookup("8SMC5-USB-PRO").is_none());
    }
}
