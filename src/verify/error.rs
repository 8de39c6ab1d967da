use thiserror::Error;

use crate::mx::Error as MxError;

/// Configuration faults. Network failures never show up here: they resolve
/// to a [`Verdict`](super::Verdict).
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("resolver initialisation failed: {0}")]
    ResolverInit(#[from] MxError),
}
