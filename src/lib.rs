//! Verifier-side session management for OpenID4VP-style credential presentation exchanges.
//!
//! This library implements the session lifecycle engine a relying party needs to run a
//! presentation exchange: it creates sessions, signs and delivers authorization requests (inline
//! or by reference), accepts the wallet's response, and records a terminal outcome. It does not
//! speak HTTP and it does not interpret request or response payloads; the embedding application
//! mounts the transport routes and supplies the response validator.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use oid4vp_verifier::verifier::{session::MemoryStore, Verifier};
//! use serde_json::json;
//!
//! // Setup the verifier.
//! let verifier = Verifier::builder()
//!     .with_client(client)
//!     .with_session_store(Arc::new(MemoryStore::default()))
//!     .with_submission_endpoint("https://verifier.example.com/vp/submit".parse()?)
//!     .by_reference("https://verifier.example.com/vp/request".parse()?)
//!     .build()
//!     .await?;
//!
//! // Create a session; hold on to the secret, it authorizes everything that follows.
//! let created = verifier.create_new_session().await?;
//!
//! // Sign and deliver an authorization request for the session.
//! let indirection = verifier
//!     .initiate_request(created.uuid, created.secret.as_str(), request_object, None)
//!     .await?;
//!
//! // Hand `indirection` to the wallet (e.g. as a QR code). For by-reference delivery, the
//! // wallet resolves the request through `retrieve_authorization_request`, without the secret.
//!
//! // When the wallet responds, validate and complete the session.
//! let outcome = verifier
//!     .submit_response(created.uuid, created.secret.as_str(), response, |session, response| {
//!         Box::pin(async move { validate_response(session, response).await })
//!     })
//!     .await?;
//! ```
//!
//! # Lifecycle
//!
//! A session's status only moves forward:
//!
//! `Created` → `SentRequest` | `SentRequestByReference` → `ReceivedResponse` →
//! `Complete(Success | Failure | Error)`
//!
//! Every mutation authenticates the caller against the session secret issued at creation, and
//! session stores arbitrate racing writers through the
//! [status guard](crate::verifier::status::permits), so the engine stays safe under concurrent
//! access from independent request handlers.
//!
//! The storage backend is pluggable through the
//! [SessionStore](crate::verifier::session::SessionStore) trait; status data structures live in
//! the dependency-light `oid4vp-verifier-frontend` crate so application frontends can consume
//! them directly.

pub mod config;
pub mod error;
pub mod verifier;

pub use error::Error;
pub use verifier::Verifier;
