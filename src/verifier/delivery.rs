use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use url::Url;

/// How the signed request reaches the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestIndirection {
    /// The signed request object, embedded directly.
    ByValue { request: String },
    /// A pointer the wallet resolves against the verifier's reference endpoint.
    ByReference { request_uri: Url },
}

/// The delivery mode chosen for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Inline,
    ByReference,
}

/// Decides between inline and by-reference delivery for each request.
///
/// The decision rule is injected configuration, not hard-coded in the orchestration. Inputs are
/// the signed request and the wallet's user agent, when the transport reported one; some user
/// agents cannot carry large requests inline.
pub trait DeliveryPolicy: Debug {
    fn choose(&self, request_jwt: &str, user_agent: Option<&str>) -> Delivery;
}

/// A fixed choice is itself a policy.
impl DeliveryPolicy for Delivery {
    fn choose(&self, _request_jwt: &str, _user_agent: Option<&str>) -> Delivery {
        *self
    }
}

/// Embed requests inline up to a size threshold, switch to by-reference beyond it.
///
/// Inline requests travel inside URLs for QR code and deep link transports, which caps how large
/// they can usefully be.
#[derive(Debug, Clone, Copy)]
pub struct InlineLimit {
    pub max_request_bytes: usize,
}

impl DeliveryPolicy for InlineLimit {
    fn choose(&self, request_jwt: &str, _user_agent: Option<&str>) -> Delivery {
        if request_jwt.len() > self.max_request_bytes {
            Delivery::ByReference
        } else {
            Delivery::Inline
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fixed_delivery_ignores_the_request() {
        assert_eq!(Delivery::Inline.choose("x".repeat(10_000).as_str(), None), Delivery::Inline);
        assert_eq!(
            Delivery::ByReference.choose("tiny", Some("WalletApp/1.0")),
            Delivery::ByReference
        );
    }

    #[test]
    fn inline_limit_switches_at_its_threshold() {
        let policy = InlineLimit {
            max_request_bytes: 8,
        };
        assert_eq!(policy.choose("12345678", None), Delivery::Inline);
        assert_eq!(policy.choose("123456789", None), Delivery::ByReference);
    }
}
