//! Verifier session data structures that are needed on the frontend, without all of the other
//! dependencies that can cause compilation issues with web targets.
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Status of a presentation session.
///
/// Variants are declared in lifecycle order, so the derived [`PartialOrd`] reflects how far a
/// session has progressed.
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Status {
    /// Session exists but no request has been constructed for it yet.
    Created,
    /// Wallet has been sent the request by reference, waiting for the wallet to request the request.
    SentRequestByReference,
    /// Wallet has received the request, waiting on the wallet to process the request.
    SentRequest,
    /// Verifier has received the response and is now processing it.
    ReceivedResponse,
    /// Verifier has finished processing the response.
    Complete(Outcome),
}

impl Status {
    /// Whether the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Complete(_))
    }
}

/// Outcome of a presentation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Outcome {
    /// An error occurred during response processing.
    Error { cause: String },
    /// The authorization response did not pass verification.
    Failure { reason: String },
    /// The authorization response is verified.
    Success { info: Json },
}

impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

impl Outcome {
    fn ordering(&self) -> u8 {
        match self {
            Outcome::Error { .. } => 0,
            Outcome::Failure { .. } => 1,
            Outcome::Success { .. } => 2,
        }
    }
}

impl PartialOrd for Outcome {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.ordering().partial_cmp(&other.ordering())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_orders_by_lifecycle_position() {
        let complete = Status::Complete(Outcome::Success { info: json!({}) });
        assert!(Status::Created < Status::SentRequestByReference);
        assert!(Status::SentRequestByReference < Status::SentRequest);
        assert!(Status::SentRequest < Status::ReceivedResponse);
        assert!(Status::ReceivedResponse < complete);
    }

    #[test]
    fn status_serialization_round_trips() {
        let statuses = [
            Status::Created,
            Status::SentRequestByReference,
            Status::SentRequest,
            Status::ReceivedResponse,
            Status::Complete(Outcome::Error {
                cause: "signature did not verify".into(),
            }),
            Status::Complete(Outcome::Failure {
                reason: "missing requested claim".into(),
            }),
            Status::Complete(Outcome::Success {
                info: json!({"claims": {"age_over_21": true}}),
            }),
        ];
        for status in statuses {
            let value = serde_json::to_value(&status).unwrap();
            let parsed: Status = serde_json::from_value(value.clone()).unwrap();
            assert_eq!(value, serde_json::to_value(&parsed).unwrap());
        }
    }

    #[test]
    fn outcome_serializes_as_tagged_value() {
        let outcome = Outcome::Failure {
            reason: "expired credential".into(),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"Failure": {"reason": "expired credential"}})
        );
    }
}
