//! Event stream connection strings and shared access signatures.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// Parsed `Endpoint=sb://..;SharedAccessKeyName=..;SharedAccessKey=..[;EntityPath=..]`.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamConnection {
    /// Namespace host, e.g. `my-ns.servicebus.windows.net`
    pub host: String,
    pub key_name: String,
    pub key: String,
    pub entity_path: Option<String>,
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("host", &self.host)
            .field("key_name", &self.key_name)
            .field("entity_path", &self.entity_path)
            .finish_non_exhaustive()
    }
}

impl StreamConnection {
    /// Parse a connection string. Keys are matched case-insensitively; values
    /// may themselves contain `=`.
    pub fn parse(connection: &str) -> Result<Self, ConfigError> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut entity_path = None;

        for part in connection.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                ConfigError::Invalid("connection string segment without `=`".to_string())
            })?;
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key = Some(value),
                "entitypath" => entity_path = Some(value).filter(|v| !v.is_empty()),
                _ => {}
            }
        }

        let endpoint = required(endpoint, "Endpoint")?;
        let host = endpoint
            .split_once("://")
            .map_or(endpoint.as_str(), |(_, rest)| rest)
            .trim_end_matches('/')
            .to_string();
        if host.is_empty() {
            return Err(ConfigError::Invalid(
                "connection string Endpoint has no host".to_string(),
            ));
        }

        Ok(Self {
            host,
            key_name: required(key_name, "SharedAccessKeyName")?,
            key: required(key, "SharedAccessKey")?,
            entity_path,
        })
    }

    /// The entity named in the connection string, or `fallback`.
    pub fn entity<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.entity_path.as_deref().unwrap_or(fallback)
    }

    /// `https://{host}/{entity}`, the resource a token is scoped to.
    pub fn resource_uri(&self, entity: &str) -> String {
        format!("https://{}/{}", self.host, entity.trim_matches('/'))
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::Invalid(format!("connection string has no {name}")))
}

/// Mints `SharedAccessSignature` tokens for one resource.
#[derive(Clone)]
pub struct SasSigner {
    encoded_uri: String,
    key_name: String,
    mac: HmacSha256,
    ttl: Duration,
}

impl SasSigner {
    pub fn new(resource_uri: &str, key_name: &str, key: &str, ttl: Duration) -> Result<Self, ConfigError> {
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| ConfigError::Invalid(format!("unusable shared access key: {e}")))?;
        Ok(Self {
            encoded_uri: urlencoding::encode(resource_uri).into_owned(),
            key_name: key_name.to_string(),
            mac,
            ttl,
        })
    }

    /// Token that expires at `expiry` (seconds since the Unix epoch).
    pub fn token(&self, expiry: i64) -> String {
        let mut mac = self.mac.clone();
        mac.update(format!("{}\n{}", self.encoded_uri, expiry).as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        format!(
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            self.encoded_uri,
            urlencoding::encode(&signature),
            expiry,
            self.key_name
        )
    }

    /// Token valid for the configured lifetime from now.
    pub fn fresh_token(&self) -> String {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        self.token(chrono::Utc::now().timestamp().saturating_add(ttl))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONNECTION: &str = "Endpoint=sb://example-ns.servicebus.windows.net/;\
        SharedAccessKeyName=RootManageSharedAccessKey;\
        SharedAccessKey=c2VjcmV0LWtleQ==;EntityPath=reddit-data-stream";

    #[test]
    fn test_parse_connection_string() {
        let connection = StreamConnection::parse(CONNECTION).unwrap();
        assert_eq!(connection.host, "example-ns.servicebus.windows.net");
        assert_eq!(connection.key_name, "RootManageSharedAccessKey");
        assert_eq!(connection.key, "c2VjcmV0LWtleQ==");
        assert_eq!(connection.entity("fallback"), "reddit-data-stream");
        assert_eq!(
            connection.resource_uri("reddit-data-stream"),
            "https://example-ns.servicebus.windows.net/reddit-data-stream"
        );
    }

    #[test]
    fn test_entity_falls_back_without_entity_path() {
        let connection = StreamConnection::parse(
            "endpoint=sb://ns.servicebus.windows.net;sharedaccesskeyname=send;sharedaccesskey=k",
        )
        .unwrap();
        assert_eq!(connection.entity_path, None);
        assert_eq!(connection.entity("reddit-data-stream"), "reddit-data-stream");
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = StreamConnection::parse(
            "Endpoint=sb://ns.servicebus.windows.net/;SharedAccessKeyName=send",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("SharedAccessKey")));
    }

    #[test]
    fn test_malformed_segment_rejected() {
        assert!(StreamConnection::parse("Endpoint").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let connection = StreamConnection::parse(CONNECTION).unwrap();
        assert!(!format!("{connection:?}").contains("c2VjcmV0LWtleQ=="));
    }

    #[test]
    fn test_known_signature() {
        let signer = SasSigner::new(
            "https://example-ns.servicebus.windows.net/reddit-data-stream",
            "RootManageSharedAccessKey",
            "c2VjcmV0LWtleQ==",
            Duration::from_secs(3600),
        )
        .unwrap();
        assert_eq!(
            signer.token(1_700_000_000),
            "SharedAccessSignature \
             sr=https%3A%2F%2Fexample-ns.servicebus.windows.net%2Freddit-data-stream\
             &sig=NXQPUMZ%2BGrehlgAQN8yhSEFj6DCMabt2z1PO5Au6des%3D\
             &se=1700000000&skn=RootManageSharedAccessKey"
        );
    }

    #[test]
    fn test_fresh_token_expires_after_ttl() {
        let signer = SasSigner::new("https://ns/hub", "send", "k", Duration::from_secs(60)).unwrap();
        let token = signer.fresh_token();
        let expiry: i64 = token
            .split("&se=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap()
            .parse()
            .unwrap();
        let now = chrono::Utc::now().timestamp();
        assert!(expiry > now && expiry <= now + 60);
    }
}
