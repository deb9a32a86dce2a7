use std::{future::Future, pin::Pin, sync::Arc};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::{config::Config, error::Error};

use client::{Client, X509SanClient, X509SanVariant};
use delivery::{Delivery, DeliveryPolicy, RequestIndirection};
use request_signer::P256Signer;
use secret::SessionSecret;
use session::{Outcome, Session, SessionStore, Status};
use status::{transition, Event};

pub mod client;
pub mod delivery;
pub mod request_signer;
pub mod secret;
pub mod session;
pub mod status;

/// The verifier side of a presentation exchange: creates sessions, issues signed requests, and
/// records what the wallet sent back.
///
/// The verifier holds no mutable state of its own; all shared state lives in the
/// [SessionStore], so independent request handlers can share one `Verifier` by cloning it.
#[derive(Debug, Clone)]
pub struct Verifier {
    client: Arc<dyn Client + Send + Sync>,
    delivery_policy: Arc<dyn DeliveryPolicy + Send + Sync>,
    session_store: Arc<dyn SessionStore + Send + Sync>,
    submission_endpoint: Url,
    reference_endpoint: Url,
}

/// Handed to the verifier backend when a session is created.
///
/// This is the only place the plaintext session secret ever appears; everything after creation
/// authenticates by presenting it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreationResponse {
    pub uuid: Uuid,
    pub secret: SessionSecret,
}

impl Verifier {
    /// Build a new verifier.
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    /// Build a verifier from deployment configuration: a PEM signing key and certificate chain,
    /// and endpoints joined onto the configured base URL.
    ///
    /// Configured deployments deliver requests by reference; use [Verifier::builder] directly for
    /// a different [DeliveryPolicy].
    pub async fn from_config(
        config: &Config,
        session_store: Arc<dyn SessionStore + Send + Sync>,
    ) -> Result<Self> {
        let signer = P256Signer::from_pkcs8_pem(&config.client.key)?;
        let client = X509SanClient::new(
            config.client.x5c.clone(),
            Arc::new(signer),
            X509SanVariant::Dns,
        )
        .context("could not build the verifier's signing client")?;
        Verifier::builder()
            .with_client(Arc::new(client))
            .with_session_store(session_store)
            .with_submission_endpoint(
                config
                    .base_url
                    .join(&config.submission_endpoint)
                    .context("could not join submission url")?,
            )
            .by_reference(
                config
                    .base_url
                    .join(&config.reference_endpoint)
                    .context("could not join reference url")?,
            )
            .build()
            .await
    }

    /// The endpoint wallets submit authorization responses to. Exposed for the transport layer
    /// mounting routes.
    pub fn submission_endpoint(&self) -> &Url {
        &self.submission_endpoint
    }

    /// The endpoint wallets resolve by-reference requests against.
    pub fn reference_endpoint(&self) -> &Url {
        &self.reference_endpoint
    }

    /// Create a new presentation session in the `Created` status.
    ///
    /// Returns the session identifier together with the freshly generated session secret; only
    /// the secret's digest is persisted.
    pub async fn create_new_session(&self) -> Result<SessionCreationResponse, Error> {
        let uuid = Uuid::new_v4();
        let secret = SessionSecret::generate();
        self.session_store
            .initiate(Session::new(uuid, secret.digest()))
            .await?;
        debug!("created presentation session {uuid}");
        Ok(SessionCreationResponse { uuid, secret })
    }

    /// Construct, sign, and record the request for a session, returning what should be handed to
    /// the wallet: the signed request itself, or the URI where the wallet can retrieve it.
    ///
    /// The request body is an opaque request object; this crate signs and delivers it without
    /// interpreting its schema. Fails with [Error::InvalidState] if a request was already
    /// initiated for this session.
    pub async fn initiate_request(
        &self,
        session_id: Uuid,
        session_secret: &str,
        request: Json,
        user_agent: Option<&str>,
    ) -> Result<RequestIndirection, Error> {
        let mut session = self.session_store.get_session(session_id).await?;
        if !session.secret_hash.matches(session_secret) {
            return Err(Error::Authentication);
        }
        // Refuse re-initiation before any signing work happens.
        if session.status != Status::Created {
            return Err(Error::InvalidState {
                current: session.status,
            });
        }

        let request_jwt = self
            .client
            .generate_request_object_jwt(&request)
            .await
            .map_err(Error::Crypto)?;

        let (event, indirection) = match self.delivery_policy.choose(&request_jwt, user_agent) {
            Delivery::Inline => (
                Event::RequestSent,
                RequestIndirection::ByValue {
                    request: request_jwt.clone(),
                },
            ),
            Delivery::ByReference => {
                let request_uri = self.reference_uri(&session_id)?;
                session.request_uri = Some(request_uri.clone());
                (
                    Event::RequestPublishedByReference,
                    RequestIndirection::ByReference { request_uri },
                )
            }
        };
        session.status = transition(&session.status, event)?;
        session.request_payload = Some(request_jwt);
        self.session_store
            .update_session(session_id, session)
            .await?;
        Ok(indirection)
    }

    /// Retrieve an authorization request that was passed by-reference.
    ///
    /// This should be triggered by a request from the wallet when the request was delivered by
    /// reference: the wallet resolves `<reference-endpoint>/<uuid>` and receives the signed
    /// request recorded for that session. No session secret is involved; the store's
    /// unauthenticated read path serves only the public view.
    ///
    /// The first retrieval advances the session to `SentRequest`.
    pub async fn retrieve_authorization_request(&self, reference: Uuid) -> Result<String, Error> {
        let session = self
            .session_store
            .get_session_unauthenticated(reference)
            .await?;
        let Some(request_payload) = session.request_payload else {
            return Err(Error::InvalidState {
                current: session.status,
            });
        };
        if session.status == Status::SentRequestByReference {
            match self
                .session_store
                .update_status(reference, Status::SentRequest)
                .await
            {
                // A concurrent retrieval or the response itself advanced the session first.
                Ok(()) | Err(Error::InvalidState { .. }) => {}
                Err(e) => return Err(e),
            }
            debug!("wallet retrieved the request for session {reference}");
        }
        Ok(request_payload)
    }

    /// Retrieve the current status of a session.
    ///
    /// This should be triggered by a request from the application frontend, which holds the
    /// session secret.
    pub async fn poll_status(&self, session_id: Uuid, session_secret: &str) -> Result<Status, Error> {
        let session = self.session_store.get_session(session_id).await?;
        if !session.secret_hash.matches(session_secret) {
            return Err(Error::Authentication);
        }
        Ok(session.status)
    }

    /// Accept and validate the wallet's authorization response, driving the session to a terminal
    /// status.
    ///
    /// `validator_function` performs the structural and cryptographic validation of the response;
    /// its verdict is recorded as the session's outcome. Protocol-level failures belong in
    /// [Outcome::Failure] and [Outcome::Error] so the exchange always reaches a well-defined end
    /// state; an `Err` from this method means the session itself could not be operated on.
    ///
    /// Submitting again after the session completed returns the recorded outcome unchanged and
    /// never re-runs validation.
    pub async fn submit_response<F, Fut>(
        &self,
        session_id: Uuid,
        session_secret: &str,
        response: Json,
        validator_function: F,
    ) -> Result<Outcome, Error>
    where
        F: FnOnce(Session, Json) -> Pin<Box<Fut>>,
        Fut: Future<Output = Outcome>,
    {
        let mut session = self.session_store.get_session(session_id).await?;
        if !session.secret_hash.matches(session_secret) {
            return Err(Error::Authentication);
        }
        if let Status::Complete(outcome) = &session.status {
            return Ok(outcome.clone());
        }

        session.status = transition(&session.status, Event::ResponseReceived)?;
        session.response_payload = Some(response.clone());
        self.session_store
            .update_session(session_id, session.clone())
            .await?;

        let outcome = validator_function(session, response).await;
        self.session_store
            .update_status(session_id, Status::Complete(outcome.clone()))
            .await?;
        debug!("session {session_id} completed: {outcome:?}");
        Ok(outcome)
    }

    fn reference_uri(&self, session_id: &Uuid) -> Result<Url, Error> {
        let mut request_uri = self.reference_endpoint.clone();
        {
            let Ok(mut path) = request_uri.path_segments_mut() else {
                return Err(Error::Validation(
                    "the reference endpoint cannot be extended with a session id".into(),
                ));
            };
            path.push(&session_id.to_string());
        }
        Ok(request_uri)
    }
}

/// Builder struct for [Verifier].
#[derive(Debug, Clone, Default)]
pub struct VerifierBuilder {
    client: Option<Arc<dyn Client + Send + Sync>>,
    delivery_policy: Option<Arc<dyn DeliveryPolicy + Send + Sync>>,
    session_store: Option<Arc<dyn SessionStore + Send + Sync>>,
    submission_endpoint: Option<Url>,
    reference_endpoint: Option<Url>,
}

impl VerifierBuilder {
    /// Build the verifier.
    pub async fn build(self) -> Result<Verifier> {
        let Self {
            client,
            delivery_policy,
            session_store,
            submission_endpoint,
            reference_endpoint,
        } = self;

        let Some(client) = client else {
            bail!("client is required, see `with_client`")
        };

        let Some(session_store) = session_store else {
            bail!("session store is required, see `with_session_store`")
        };

        let Some(submission_endpoint) = submission_endpoint else {
            bail!("submission endpoint is required, see `with_submission_endpoint`")
        };

        let Some(reference_endpoint) = reference_endpoint else {
            bail!("reference endpoint is required, see `with_reference_endpoint` or `by_reference`")
        };

        if reference_endpoint.cannot_be_a_base() {
            bail!("invalid base URL for Authorization Request by reference")
        }

        Ok(Verifier {
            client,
            delivery_policy: delivery_policy.unwrap_or_else(|| Arc::new(Delivery::Inline)),
            session_store,
            submission_endpoint,
            reference_endpoint,
        })
    }

    /// Encode signed requests directly in the value returned to the caller.
    pub fn by_value(mut self) -> Self {
        self.delivery_policy = Some(Arc::new(Delivery::Inline));
        self
    }

    /// Publish signed requests at `at` for the wallet to retrieve.
    pub fn by_reference(mut self, at: Url) -> Self {
        self.delivery_policy = Some(Arc::new(Delivery::ByReference));
        self.reference_endpoint = Some(at);
        self
    }

    /// Set the [DeliveryPolicy] deciding between inline and by-reference delivery per request.
    pub fn with_delivery_policy(
        mut self,
        delivery_policy: Arc<dyn DeliveryPolicy + Send + Sync>,
    ) -> Self {
        self.delivery_policy = Some(delivery_policy);
        self
    }

    /// Set the [Client] that the [Verifier] will use to sign requests and identify itself to the
    /// Wallet.
    pub fn with_client(mut self, client: Arc<dyn Client + Send + Sync>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the [SessionStore] that the [Verifier] will use to maintain session state across
    /// transactions.
    pub fn with_session_store(
        mut self,
        session_store: Arc<dyn SessionStore + Send + Sync>,
    ) -> Self {
        self.session_store = Some(session_store);
        self
    }

    /// Set the [Url] that the [Verifier] will listen at to receive the presentation submission
    /// from the Wallet.
    pub fn with_submission_endpoint(mut self, endpoint: Url) -> Self {
        self.submission_endpoint = Some(endpoint);
        self
    }

    /// Set the [Url] that by-reference requests are resolvable under.
    pub fn with_reference_endpoint(mut self, endpoint: Url) -> Self {
        self.reference_endpoint = Some(endpoint);
        self
    }
}
