use anyhow::Context;
use serde::{de, Deserialize};
use url::Url;
use x509_cert::Certificate;

/// Construction-time configuration for a [Verifier](crate::verifier::Verifier).
///
/// The endpoints are paths joined onto `base_url`; their transport exposure is the embedding
/// application's concern.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(alias = "baseurl")]
    pub base_url: BaseUrl,
    pub client: ClientConfig,
    pub submission_endpoint: String,
    pub reference_endpoint: String,
}

/// Key material for the verifier's signing identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// certs chain in PEM format
    #[serde(deserialize_with = "deserialize_x5c")]
    pub x5c: Vec<Certificate>,
    /// PEM encoded
    pub key: String,
}

fn deserialize_x5c<'de, D>(deserializer: D) -> Result<Vec<Certificate>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Certificate::load_pem_chain(s.as_bytes())
        .context("could not load x5c")
        .map_err(de::Error::custom)
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_joins_without_mangling() {
        let base: BaseUrl = String::from("https://verifier.example.com/vp").try_into().unwrap();
        assert_eq!(
            base.join("submit").unwrap().as_str(),
            "https://verifier.example.com/vp/submit"
        );
    }

    #[test]
    fn endpoints_join_relative_to_the_base() {
        let config = Config {
            base_url: String::from("https://verifier.example.com").try_into().unwrap(),
            client: ClientConfig {
                x5c: vec![],
                key: String::new(),
            },
            submission_endpoint: "vp/submit".into(),
            reference_endpoint: "vp/request".into(),
        };
        assert_eq!(
            config
                .base_url
                .join(&config.reference_endpoint)
                .unwrap()
                .as_str(),
            "https://verifier.example.com/vp/request"
        );
    }
}
