use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

pub use oid4vp_verifier_frontend::{Outcome, Status};

use crate::error::Error;

use super::{secret::SecretHash, status::permits};

/// A single presentation exchange between this verifier and a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub uuid: Uuid,
    /// Digest of the session secret. The plaintext is returned once at creation and never stored.
    pub secret_hash: SecretHash,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// The signed request object, set once when the request is initiated.
    pub request_payload: Option<String>,
    /// Where the wallet can resolve the request, set once for by-reference delivery.
    pub request_uri: Option<Url>,
    /// The wallet's submitted response, set once when it arrives.
    pub response_payload: Option<Json>,
}

impl Session {
    /// A fresh session in the `Created` status.
    pub fn new(uuid: Uuid, secret_hash: SecretHash) -> Self {
        Self {
            uuid,
            secret_hash,
            status: Status::Created,
            created_at: OffsetDateTime::now_utc(),
            request_payload: None,
            request_uri: None,
            response_payload: None,
        }
    }
}

/// The session fields reachable without the session secret.
///
/// This is what the unauthenticated read path serves, so a wallet can resolve a by-reference
/// request using only the uuid it was handed. It never carries secret material or the wallet's
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSession {
    pub status: Status,
    pub request_payload: Option<String>,
    pub request_uri: Option<Url>,
}

impl From<&Session> for PublicSession {
    fn from(session: &Session) -> Self {
        Self {
            status: session.status.clone(),
            request_payload: session.request_payload.clone(),
            request_uri: session.request_uri.clone(),
        }
    }
}

/// Storage interface for session information.
///
/// Each method is atomic over a single record: a second reader never observes a partially applied
/// write. Implementations must evaluate [`permits`](crate::verifier::status::permits) against the
/// *stored* status while holding the record for both status writes, rejecting anything else with
/// [`Error::InvalidState`]. That check is what arbitrates racing mutations on the same session;
/// cross-record transactions are not required.
#[async_trait]
pub trait SessionStore: Debug {
    /// Store a brand-new session, failing with [`Error::Conflict`] if the uuid is already taken.
    async fn initiate(&self, session: Session) -> Result<(), Error>;

    /// Overwrite the status of a session.
    async fn update_status(&self, uuid: Uuid, status: Status) -> Result<(), Error>;

    /// Replace a session record wholesale.
    ///
    /// Callers must carry the write-once fields (`request_payload`, `request_uri`,
    /// `response_payload`) forward unchanged once set; the status guard confines this method to
    /// the lifecycle edges where those fields are legally written.
    async fn update_session(&self, uuid: Uuid, session: Session) -> Result<(), Error>;

    /// Get a full session record. Authenticated-context read: callers are expected to have
    /// checked the session secret before acting on the result.
    async fn get_session(&self, uuid: Uuid) -> Result<Session, Error>;

    /// Get the reduced view of a session, reachable without the session secret.
    async fn get_session_unauthenticated(&self, uuid: Uuid) -> Result<PublicSession, Error>;

    /// Remove a session from the store. Retention policy is external to the lifecycle engine;
    /// nothing in this crate calls this on its own.
    async fn remove_session(&self, uuid: Uuid) -> Result<(), Error>;
}

/// A local in-memory store. Not for production use!
///
/// # Warning
/// This in-memory store should only be used for test purposes, it will not work for a distributed
/// deployment.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    store: Arc<Mutex<BTreeMap<Uuid, Session>>>,
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn initiate(&self, session: Session) -> Result<(), Error> {
        let mut store = self.store.lock().await;
        if store.contains_key(&session.uuid) {
            return Err(Error::Conflict(session.uuid));
        }
        store.insert(session.uuid, session);
        Ok(())
    }

    async fn update_status(&self, uuid: Uuid, status: Status) -> Result<(), Error> {
        let mut store = self.store.lock().await;
        let session = store.get_mut(&uuid).ok_or(Error::NotFound(uuid))?;
        if !permits(&session.status, &status) {
            return Err(Error::InvalidState {
                current: session.status.clone(),
            });
        }
        session.status = status;
        Ok(())
    }

    async fn update_session(&self, uuid: Uuid, session: Session) -> Result<(), Error> {
        let mut store = self.store.lock().await;
        let stored = store.get_mut(&uuid).ok_or(Error::NotFound(uuid))?;
        if !permits(&stored.status, &session.status) {
            return Err(Error::InvalidState {
                current: stored.status.clone(),
            });
        }
        *stored = session;
        Ok(())
    }

    async fn get_session(&self, uuid: Uuid) -> Result<Session, Error> {
        self.store
            .lock()
            .await
            .get(&uuid)
            .cloned()
            .ok_or(Error::NotFound(uuid))
    }

    async fn get_session_unauthenticated(&self, uuid: Uuid) -> Result<PublicSession, Error> {
        self.store
            .lock()
            .await
            .get(&uuid)
            .map(PublicSession::from)
            .ok_or(Error::NotFound(uuid))
    }

    async fn remove_session(&self, uuid: Uuid) -> Result<(), Error> {
        self.store
            .lock()
            .await
            .remove(&uuid)
            .map(|_| ())
            .ok_or(Error::NotFound(uuid))
    }
}
