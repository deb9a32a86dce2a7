use std::{fmt::Debug, sync::Arc};

use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use base64::prelude::*;
use serde_json::{json, Value as Json};
use tracing::debug;
use x509_cert::{
    der::Encode,
    ext::pkix::{name::GeneralName, SubjectAltName},
    Certificate,
};

use super::request_signer::RequestSigner;

/// The identifier under which the verifier is known to wallets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The signing capability: turns an opaque request object into the signed artifact that is
/// delivered to, or published for, the wallet.
#[async_trait]
pub trait Client: Debug {
    fn id(&self) -> &ClientId;

    async fn generate_request_object_jwt(&self, body: &Json) -> Result<String>;
}

/// A [Client] identified by the Subject Alternative Name of its certificate.
///
/// The signed request carries the full `x5c` chain in its header, so wallets can verify it
/// against the verifier's certificate.
#[derive(Debug, Clone)]
pub struct X509SanClient {
    id: ClientId,
    x5c: Vec<Certificate>,
    signer: Arc<dyn RequestSigner + Send + Sync>,
}

impl X509SanClient {
    pub fn new(
        x5c: Vec<Certificate>,
        signer: Arc<dyn RequestSigner + Send + Sync>,
        variant: X509SanVariant,
    ) -> Result<Self> {
        let leaf = x5c.first().context("certificate chain is empty")?;
        let id = if let Some(san) = leaf
            .tbs_certificate
            .filter::<SubjectAltName>()
            .filter_map(|r| match r {
                Ok((_crit, san)) => Some(san.0.into_iter()),
                Err(e) => {
                    debug!("unable to parse SubjectAlternativeName from DER: {e}");
                    None
                }
            })
            .flatten()
            .filter_map(|general_name| match (general_name, variant) {
                (GeneralName::DnsName(uri), X509SanVariant::Dns) => Some(uri.to_string()),
                (gn, X509SanVariant::Dns) => {
                    debug!("found non-DNS SAN: {gn:?}");
                    None
                }
                (GeneralName::UniformResourceIdentifier(uri), X509SanVariant::Uri) => {
                    Some(uri.to_string())
                }
                (gn, X509SanVariant::Uri) => {
                    debug!("found non-URI SAN: {gn:?}");
                    None
                }
            })
            .next()
        {
            san
        } else {
            bail!("x509 certificate does not contain Subject Alternative Name");
        };
        Ok(X509SanClient {
            id: ClientId(id),
            x5c,
            signer,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum X509SanVariant {
    Uri,
    Dns,
}

#[async_trait]
impl Client for X509SanClient {
    fn id(&self) -> &ClientId {
        &self.id
    }

    async fn generate_request_object_jwt(&self, body: &Json) -> Result<String> {
        let algorithm = self.signer.alg();
        let x5c: Vec<String> = self
            .x5c
            .iter()
            .map(|x509| x509.to_der())
            .map(|der| Ok(BASE64_STANDARD.encode(der?)))
            .collect::<Result<_>>()?;
        let header = json!({
            "alg": algorithm,
            "x5c": x5c,
            "typ": "JWT"
        });
        make_jwt(header, body, self.signer.as_ref()).await
    }
}

/// Assemble and sign a JWS compact serialization over `body`.
///
/// Exposed for custom [Client] implementations that build their own headers.
pub async fn make_jwt<S: RequestSigner + ?Sized>(
    header: Json,
    body: &Json,
    signer: &S,
) -> Result<String> {
    let header_b64: String =
        serde_json::to_vec(&header).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    let body_b64 = serde_json::to_vec(body).map(|b| BASE64_URL_SAFE_NO_PAD.encode(b))?;
    let payload = [header_b64.as_bytes(), b".", body_b64.as_bytes()].concat();
    let signature = signer.sign(&payload).await;
    let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{header_b64}.{body_b64}.{signature_b64}"))
}
