use thiserror::Error;

use revealer_discovery::DiscoveryError;
use revealer_mipas::MipasError;

#[derive(Error, Debug)]
pub enum RevealerError {
    /// Searches are serialized; finish or shut down the running one first.
    #[error("a search is already in progress")]
    SearchInProgress,

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Mipas(#[from] MipasError),
}
