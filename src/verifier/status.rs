//! The session status state machine.
//!
//! Pure logic, no I/O. [`transition`] is consulted by the
//! [`Verifier`](crate::verifier::Verifier) before persisting a status change, and [`permits`] is
//! the guard that [`SessionStore`](crate::verifier::session::SessionStore) implementations apply
//! atomically against the stored record, so that racing mutations on the same session cannot both
//! succeed from a stale read.

use crate::error::Error;

use super::session::{Outcome, Status};

/// A state-advancing event observed during a presentation exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The signed request was handed to the wallet inline.
    RequestSent,
    /// The signed request was published for retrieval at the reference endpoint.
    RequestPublishedByReference,
    /// The wallet resolved a by-reference request.
    RequestRetrieved,
    /// The wallet submitted its response.
    ResponseReceived,
    /// Response processing finished with the given outcome.
    Completed(Outcome),
}

impl Event {
    /// The status this event moves a session into.
    fn into_target(self) -> Status {
        match self {
            Event::RequestSent | Event::RequestRetrieved => Status::SentRequest,
            Event::RequestPublishedByReference => Status::SentRequestByReference,
            Event::ResponseReceived => Status::ReceivedResponse,
            Event::Completed(outcome) => Status::Complete(outcome),
        }
    }
}

/// Advance `current` by `event`, or reject the attempt without side effects.
///
/// Transitions are monotonic: no event ever moves a session back to an earlier status, and the
/// terminal `Complete` statuses accept no event at all.
pub fn transition(current: &Status, event: Event) -> Result<Status, Error> {
    let legal = matches!(
        (current, &event),
        (Status::Created, Event::RequestSent)
            | (Status::Created, Event::RequestPublishedByReference)
            | (Status::SentRequestByReference, Event::RequestRetrieved)
            | (
                Status::SentRequest | Status::SentRequestByReference,
                Event::ResponseReceived
            )
            | (Status::ReceivedResponse, Event::Completed(_))
    );
    if !legal {
        return Err(Error::InvalidState {
            current: current.clone(),
        });
    }
    Ok(event.into_target())
}

/// Whether `next` is a legal continuation of `current`.
///
/// This is the edge set of the state machine at the status level. Session stores evaluate it
/// against the *stored* status while holding the record, which turns every status write into a
/// compare-and-update: a writer working from a stale read observes the post-transition status and
/// fails with [`Error::InvalidState`].
pub fn permits(current: &Status, next: &Status) -> bool {
    matches!(
        (current, next),
        (
            Status::Created,
            Status::SentRequest | Status::SentRequestByReference
        ) | (
            Status::SentRequestByReference,
            Status::SentRequest | Status::ReceivedResponse
        ) | (Status::SentRequest, Status::ReceivedResponse)
            | (Status::ReceivedResponse, Status::Complete(_))
    )
}
