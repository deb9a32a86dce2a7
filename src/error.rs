use oid4vp_verifier_frontend::Status;
use uuid::Uuid;

/// Failures surfaced by session lifecycle operations.
///
/// Store and signing failures propagate to the caller unchanged, wrapped in [`Error::Storage`]
/// and [`Error::Crypto`] respectively. Authentication and state failures never mutate the stored
/// session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The presented session secret did not match the stored secret.
    #[error("session secret mismatch")]
    Authentication,

    /// No session exists under the given identifier.
    #[error("session {0} not found")]
    NotFound(Uuid),

    /// A session under the given identifier has already been persisted.
    #[error("session {0} already exists")]
    Conflict(Uuid),

    /// The operation is not legal while the session is in its current status.
    #[error("operation not permitted while session status is {current:?}")]
    InvalidState { current: Status },

    /// The request or response payload failed structural validation.
    #[error("invalid payload: {0}")]
    Validation(String),

    /// The session store backend failed.
    #[error("session store failure")]
    Storage(#[source] anyhow::Error),

    /// Signing or verification failed in the signing capability.
    #[error("signing capability failure")]
    Crypto(#[source] anyhow::Error),
}

impl Error {
    /// Wrap a backend failure from a session store implementation.
    pub fn storage(e: impl Into<anyhow::Error>) -> Self {
        Self::Storage(e.into())
    }

    /// Wrap a failure from the signing capability.
    pub fn crypto(e: impl Into<anyhow::Error>) -> Self {
        Self::Crypto(e.into())
    }
}
