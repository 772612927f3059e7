use std::net::Ipv4Addr;

use crate::error::ValidationError;

const PASSWORD_LIMIT: usize = 20;

/// Requested network settings for one device. Transient: built from user
/// input, validated, serialized onto the wire, then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MipasSettings {
    pub password: String,
    pub dhcp: bool,
    pub ip: String,
    pub netmask: String,
    pub gateway: String,
}

impl MipasSettings {
    pub fn dhcp(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            dhcp: true,
            ..Self::default()
        }
    }

    pub fn static_ip(
        password: impl Into<String>,
        ip: impl Into<String>,
        netmask: impl Into<String>,
        gateway: impl Into<String>,
    ) -> Self {
        Self {
            password: password.into(),
            dhcp: false,
            ip: ip.into(),
            netmask: netmask.into(),
            gateway: gateway.into(),
        }
    }

    /// Client-side checks, run before any packet is sent: the password is
    /// required and capped by the device at 20 characters; static
    /// configuration needs a syntactically valid IPv4 address and subnet
    /// mask, gateway optional.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.password.is_empty() {
            return Err(ValidationError::MissingPassword);
        }
        let password_chars = self.password.chars().count();
        if password_chars > PASSWORD_LIMIT {
            return Err(ValidationError::PasswordTooLong(password_chars));
        }

        if self.dhcp {
            return Ok(());
        }

        if self.ip.is_empty() || self.netmask.is_empty() {
            return Err(ValidationError::MissingStaticFields);
        }
        if self.ip.parse::<Ipv4Addr>().is_err() {
            return Err(ValidationError::InvalidIp(self.ip.clone()));
        }
        if self.netmask.parse::<Ipv4Addr>().is_err() {
            return Err(ValidationError::InvalidNetmask(self.netmask.clone()));
        }
        if !self.gateway.is_empty() && self.gateway.parse::<Ipv4Addr>().is_err() {
            return Err(ValidationError::InvalidGateway(self.gateway.clone()));
        }
        Ok(())
    }

    /// Vendor header payload: `<password>;<0|1 dhcp>;<ip>;<netmask>;<gateway>;`.
    pub fn wire_payload(&self) -> String {
        format!(
            "{};{};{};{};{};",
            self.password,
            u8::from(self.dhcp),
            self.ip,
            self.netmask,
            self.gateway
        )
    }
}
