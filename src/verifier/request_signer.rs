use std::fmt::Debug;

use anyhow::{Context, Result};
use async_trait::async_trait;
use p256::{
    ecdsa::{signature::Signer, Signature, SigningKey},
    pkcs8::DecodePrivateKey,
};
use serde_json::Value as Json;

#[async_trait]
pub trait RequestSigner: Debug {
    /// The algorithm that will be used to sign.
    fn alg(&self) -> &str;
    /// The public JWK of the signer.
    fn jwk(&self) -> &Json;
    async fn sign(&self, payload: &[u8]) -> Vec<u8>;
}

#[derive(Debug)]
pub struct P256Signer {
    key: SigningKey,
    jwk: Json,
}

impl P256Signer {
    pub fn new(key: SigningKey) -> Result<Self> {
        let pk: p256::PublicKey = key.verifying_key().into();
        let jwk = serde_json::from_str(&pk.to_jwk_string())?;
        Ok(Self { key, jwk })
    }

    /// Load the signing key from a PKCS#8 PEM document, as found in deployment configuration.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let secret_key =
            p256::SecretKey::from_pkcs8_pem(pem).context("could not load the signing key")?;
        Self::new(secret_key.into())
    }
}

#[async_trait]
impl RequestSigner for P256Signer {
    fn alg(&self) -> &str {
        "ES256"
    }

    fn jwk(&self) -> &Json {
        &self.jwk
    }

    async fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let sig: Signature = self.key.sign(payload);
        sig.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier as _;
    use rand::rngs::OsRng;

    #[tokio::test]
    async fn signatures_verify_against_the_advertised_key() {
        let key = SigningKey::random(&mut OsRng);
        let verifying_key = *key.verifying_key();
        let signer = P256Signer::new(key).unwrap();

        assert_eq!(signer.alg(), "ES256");
        assert_eq!(signer.jwk()["kty"], "EC");
        assert_eq!(signer.jwk()["crv"], "P-256");

        let payload = b"header.payload";
        let signature = signer.sign(payload).await;
        let signature = Signature::from_slice(&signature).unwrap();
        verifying_key.verify(payload, &signature).unwrap();
    }
}
