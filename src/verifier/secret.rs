use base64::prelude::*;
use rand::{rngs::OsRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Number of random bytes backing a freshly generated secret.
const SECRET_BYTES: usize = 32;

/// A session secret: the capability token that authorizes mutating operations on a session.
///
/// The plaintext secret is returned to the session's creator exactly once, in
/// [`SessionCreationResponse`](crate::verifier::SessionCreationResponse). Only its digest is
/// persisted, so a compromised session store does not yield usable secrets.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSecret(String);

impl SessionSecret {
    /// Generate a fresh secret from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(BASE64_URL_SAFE_NO_PAD.encode(bytes))
    }

    /// The digest to persist in the session record.
    pub fn digest(&self) -> SecretHash {
        SecretHash::of(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionSecret(..)")
    }
}

/// SHA-256 digest of a session secret, as stored in a [`Session`](crate::verifier::session::Session).
#[derive(Clone, Eq)]
pub struct SecretHash([u8; 32]);

impl SecretHash {
    fn of(secret: &str) -> Self {
        Self(Sha256::digest(secret.as_bytes()).into())
    }

    /// Compare a presented secret against the stored digest.
    ///
    /// Runs in constant time with respect to the digest contents, regardless of where the
    /// candidate diverges.
    pub fn matches(&self, presented: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        self.0.ct_eq(&candidate).into()
    }
}

impl PartialEq for SecretHash {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl std::fmt::Debug for SecretHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretHash({})", hex::encode(self.0))
    }
}

impl Serialize for SecretHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for SecretHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        let digest = bytes
            .try_into()
            .map_err(|_| de::Error::custom("expected a 32-byte digest"))?;
        Ok(Self(digest))
    }
}
