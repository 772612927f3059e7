//! Error taxonomy for the reconfiguration path.

use thiserror::Error;

/// Client-side rejection of reconfiguration input, raised before any
/// packet is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a password is required")]
    MissingPassword,

    #[error("password is {0} characters, the device limit is 20")]
    PasswordTooLong(usize),

    #[error("static configuration requires an IP address and a netmask")]
    MissingStaticFields,

    #[error("'{0}' is not a valid IPv4 address")]
    InvalidIp(String),

    #[error("'{0}' is not a valid subnet mask")]
    InvalidNetmask(String),

    #[error("'{0}' is not a valid gateway address")]
    InvalidGateway(String),
}

/// Failure modes of a reconfiguration attempt. Negotiation timing out is
/// deliberately distinct from transport trouble: the former means the
/// device never confirmed, the latter that we could not even ask.
#[derive(Error, Debug)]
pub enum MipasError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no local address could carry the request: {0}")]
    Transport(String),

    #[error("device {uuid} did not confirm within the negotiation window")]
    NoReply { uuid: String },
}
