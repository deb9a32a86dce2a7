use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use base64::prelude::*;
use oid4vp_verifier::{
    verifier::{
        client::{make_jwt, Client, ClientId},
        delivery::{Delivery, RequestIndirection},
        request_signer::{P256Signer, RequestSigner},
        session::{MemoryStore, Outcome, SessionStore, Status},
        Verifier,
    },
    Error,
};
use p256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use serde_json::{json, Value as Json};
use uuid::Uuid;

#[derive(Debug)]
struct TestClient {
    id: ClientId,
    signer: P256Signer,
}

impl TestClient {
    fn new() -> Self {
        Self {
            id: ClientId("verifier.example.com".into()),
            signer: P256Signer::new(SigningKey::random(&mut OsRng)).unwrap(),
        }
    }
}

#[async_trait]
impl Client for TestClient {
    fn id(&self) -> &ClientId {
        &self.id
    }

    async fn generate_request_object_jwt(&self, body: &Json) -> Result<String> {
        make_jwt(
            json!({"alg": self.signer.alg(), "typ": "JWT"}),
            body,
            &self.signer,
        )
        .await
    }
}

async fn verifier_with_delivery(delivery: Delivery) -> (Verifier, MemoryStore) {
    let store = MemoryStore::default();
    let verifier = Verifier::builder()
        .with_client(Arc::new(TestClient::new()))
        .with_session_store(Arc::new(store.clone()))
        .with_submission_endpoint("https://verifier.example.com/vp/submit".parse().unwrap())
        .with_reference_endpoint("https://verifier.example.com/vp/request".parse().unwrap())
        .with_delivery_policy(Arc::new(delivery))
        .build()
        .await
        .unwrap();
    (verifier, store)
}

fn request_object() -> Json {
    json!({
        "response_type": "vp_token",
        "nonce": "n-0S6_WzA2Mj",
        "dcql_query": {"credentials": [{"id": "mdl", "format": "mso_mdoc"}]},
    })
}

fn wallet_response() -> Json {
    json!({"vp_token": "opaque-presentation"})
}

fn jwt_body(jwt: &str) -> Json {
    let body = jwt.split('.').nth(1).expect("not a compact JWS");
    serde_json::from_slice(&BASE64_URL_SAFE_NO_PAD.decode(body).unwrap()).unwrap()
}

#[tokio::test]
async fn by_reference_exchange_reaches_success() {
    let (verifier, store) = verifier_with_delivery(Delivery::ByReference).await;
    let created = verifier.create_new_session().await.unwrap();
    let secret = created.secret.as_str();

    let indirection = verifier
        .initiate_request(created.uuid, secret, request_object(), None)
        .await
        .unwrap();
    let RequestIndirection::ByReference { request_uri } = indirection else {
        panic!("expected by-reference delivery, got {indirection:?}");
    };
    assert_eq!(
        request_uri.as_str(),
        format!("https://verifier.example.com/vp/request/{}", created.uuid)
    );
    assert_eq!(
        verifier.poll_status(created.uuid, secret).await.unwrap(),
        Status::SentRequestByReference
    );

    // The wallet resolves the reference without any secret.
    let retrieved = verifier
        .retrieve_authorization_request(created.uuid)
        .await
        .unwrap();
    assert_eq!(jwt_body(&retrieved), request_object());
    let stored = store.get_session(created.uuid).await.unwrap();
    assert_eq!(stored.request_payload.as_deref(), Some(retrieved.as_str()));
    assert_eq!(
        verifier.poll_status(created.uuid, secret).await.unwrap(),
        Status::SentRequest
    );
    // Re-fetching does not regress the status.
    verifier
        .retrieve_authorization_request(created.uuid)
        .await
        .unwrap();
    assert_eq!(
        verifier.poll_status(created.uuid, secret).await.unwrap(),
        Status::SentRequest
    );

    let outcome = verifier
        .submit_response(created.uuid, secret, wallet_response(), |session, response| {
            Box::pin(async move {
                assert_eq!(session.status, Status::ReceivedResponse);
                assert_eq!(session.response_payload.as_ref(), Some(&response));
                Outcome::Success {
                    info: json!({"age_over_21": true}),
                }
            })
        })
        .await
        .unwrap();
    let Outcome::Success { info } = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(info, json!({"age_over_21": true}));
    assert!(matches!(
        verifier.poll_status(created.uuid, secret).await.unwrap(),
        Status::Complete(Outcome::Success { .. })
    ));
}

#[tokio::test]
async fn inline_exchange_embeds_the_signed_request() {
    let (verifier, _store) = verifier_with_delivery(Delivery::Inline).await;
    let created = verifier.create_new_session().await.unwrap();
    let secret = created.secret.as_str();

    let indirection = verifier
        .initiate_request(created.uuid, secret, request_object(), Some("WalletApp/2.1"))
        .await
        .unwrap();
    let RequestIndirection::ByValue { request } = indirection else {
        panic!("expected inline delivery, got {indirection:?}");
    };
    assert_eq!(jwt_body(&request), request_object());
    assert_eq!(
        verifier.poll_status(created.uuid, secret).await.unwrap(),
        Status::SentRequest
    );

    let outcome = verifier
        .submit_response(created.uuid, secret, wallet_response(), |_, _| {
            Box::pin(async move {
                Outcome::Failure {
                    reason: "requested claim missing".into(),
                }
            })
        })
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Failure { .. }));
}

#[tokio::test]
async fn responses_are_rejected_before_a_request_was_initiated() {
    let (verifier, _store) = verifier_with_delivery(Delivery::ByReference).await;
    let created = verifier.create_new_session().await.unwrap();
    let secret = created.secret.as_str();

    let err = verifier
        .submit_response(created.uuid, secret, wallet_response(), |_, _| {
            Box::pin(async move { Outcome::Success { info: json!({}) } })
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidState {
            current: Status::Created
        }
    ));
    assert_eq!(
        verifier.poll_status(created.uuid, secret).await.unwrap(),
        Status::Created
    );
}

#[tokio::test]
async fn requests_cannot_be_initiated_twice() {
    let (verifier, store) = verifier_with_delivery(Delivery::ByReference).await;
    let created = verifier.create_new_session().await.unwrap();
    let secret = created.secret.as_str();

    verifier
        .initiate_request(created.uuid, secret, request_object(), None)
        .await
        .unwrap();
    let first_payload = store
        .get_session(created.uuid)
        .await
        .unwrap()
        .request_payload;

    let err = verifier
        .initiate_request(created.uuid, secret, json!({"replacement": true}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert_eq!(
        store
            .get_session(created.uuid)
            .await
            .unwrap()
            .request_payload,
        first_payload
    );
}

#[tokio::test]
async fn a_wrong_secret_is_rejected_without_touching_the_session() {
    let (verifier, store) = verifier_with_delivery(Delivery::ByReference).await;
    let created = verifier.create_new_session().await.unwrap();

    let before = serde_json::to_value(store.get_session(created.uuid).await.unwrap()).unwrap();

    let err = verifier
        .initiate_request(created.uuid, "wrong-secret", request_object(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication));

    let err = verifier
        .submit_response(created.uuid, "wrong-secret", wallet_response(), |_, _| {
            Box::pin(async move { Outcome::Success { info: json!({}) } })
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication));

    let err = verifier
        .poll_status(created.uuid, "wrong-secret")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authentication));

    let after = serde_json::to_value(store.get_session(created.uuid).await.unwrap()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn completed_sessions_replay_their_outcome_without_revalidating() {
    let (verifier, _store) = verifier_with_delivery(Delivery::Inline).await;
    let created = verifier.create_new_session().await.unwrap();
    let secret = created.secret.as_str();

    verifier
        .initiate_request(created.uuid, secret, request_object(), None)
        .await
        .unwrap();

    let validations = Arc::new(AtomicUsize::new(0));
    let submit = |response: Json| {
        let validations = validations.clone();
        verifier.submit_response(created.uuid, secret, response, move |_, _| {
            validations.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Outcome::Success {
                    info: json!({"holder": "did:example:holder"}),
                }
            })
        })
    };

    let first = submit(wallet_response()).await.unwrap();
    let second = submit(json!({"vp_token": "a replayed response"})).await.unwrap();

    let (Outcome::Success { info: first_info }, Outcome::Success { info: second_info }) =
        (first, second)
    else {
        panic!("expected both submissions to report success");
    };
    assert_eq!(first_info, second_info);
    assert_eq!(validations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn protocol_failures_still_terminate_the_session() {
    let (verifier, _store) = verifier_with_delivery(Delivery::Inline).await;
    let created = verifier.create_new_session().await.unwrap();
    let secret = created.secret.as_str();

    verifier
        .initiate_request(created.uuid, secret, request_object(), None)
        .await
        .unwrap();
    // A malformed response is not an `Err`: the validator records it as a terminal outcome.
    let outcome = verifier
        .submit_response(created.uuid, secret, json!("not an object"), |_, _| {
            Box::pin(async move {
                Outcome::Error {
                    cause: "response is not a JSON object".into(),
                }
            })
        })
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Error { .. }));
    assert!(verifier
        .poll_status(created.uuid, secret)
        .await
        .unwrap()
        .is_terminal());
}

#[tokio::test]
async fn session_identifiers_never_collide() {
    let (verifier, _store) = verifier_with_delivery(Delivery::Inline).await;
    let mut seen = std::collections::HashSet::new();
    for _ in 0..100 {
        let created = verifier.create_new_session().await.unwrap();
        assert!(seen.insert(created.uuid));
    }
}

#[tokio::test]
async fn unknown_sessions_fail_not_found() {
    let (verifier, _store) = verifier_with_delivery(Delivery::Inline).await;
    let uuid = Uuid::new_v4();
    assert!(matches!(
        verifier
            .initiate_request(uuid, "secret", request_object(), None)
            .await,
        Err(Error::NotFound(u)) if u == uuid
    ));
    assert!(matches!(
        verifier.retrieve_authorization_request(uuid).await,
        Err(Error::NotFound(_))
    ));
}
