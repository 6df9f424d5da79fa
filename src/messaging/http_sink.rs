//! HTTP client that delivers batches to the event stream's REST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::batch::{BatchLimits, EventBatch};
use super::connection::{SasSigner, StreamConnection};
use super::sink::{SinkError, StreamSink};
use crate::types::ConfigError;

/// Content type for a JSON array of events.
const BATCH_CONTENT_TYPE: &str = "application/vnd.microsoft.servicebus.json";

const API_VERSION: &str = "2014-01";

/// `[` and `]` around the envelopes.
const ARRAY_FRAMING: usize = 2;

/// One event in the batch envelope.
#[derive(Debug, Serialize)]
struct EventEnvelope<'a> {
    #[serde(rename = "Body")]
    body: &'a str,
}

/// Stream sink that posts each batch as a JSON array of event envelopes,
/// signed with a shared access signature.
pub struct HttpStreamSink {
    client: Client,
    url: String,
    signer: SasSigner,
    limits: BatchLimits,
}

impl HttpStreamSink {
    /// Create a sink for `event_hub` in the connection's namespace.
    ///
    /// An `EntityPath` in the connection string takes precedence over
    /// `event_hub`.
    pub fn new(
        connection: &StreamConnection,
        event_hub: &str,
        limits: BatchLimits,
        token_ttl: Duration,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let entity = connection.entity(event_hub);
        let resource_uri = connection.resource_uri(entity);
        let signer = SasSigner::new(&resource_uri, &connection.key_name, &connection.key, token_ttl)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(BATCH_CONTENT_TYPE));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Client {
                client: "stream sink",
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: format!("{resource_uri}/messages"),
            signer,
            limits,
        })
    }

    /// Post to `url` instead of the namespace endpoint. Tokens stay scoped to
    /// the namespace resource.
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Serialize a batch exactly as it goes on the wire.
fn encode_batch(batch: &EventBatch) -> serde_json::Result<Vec<u8>> {
    let events: Vec<EventEnvelope<'_>> = batch
        .payloads()
        .iter()
        .map(|payload| EventEnvelope { body: payload })
        .collect();
    serde_json::to_vec(&events)
}

#[async_trait]
impl StreamSink for HttpStreamSink {
    fn name(&self) -> &'static str {
        "http_stream"
    }

    fn limits(&self) -> BatchLimits {
        BatchLimits {
            max_bytes: self.limits.max_bytes.saturating_sub(ARRAY_FRAMING),
            ..self.limits
        }
    }

    /// Escaped envelope plus one separator.
    fn encoded_len(&self, payload: &str) -> usize {
        serde_json::to_string(&EventEnvelope { body: payload }).map_or(usize::MAX, |e| e.len() + 1)
    }

    async fn send(&self, batch: &EventBatch) -> Result<(), SinkError> {
        let body = encode_batch(batch)?;
        let wire_bytes = body.len();

        let response = self
            .client
            .post(&self.url)
            .query(&[("api-version", API_VERSION)])
            .header(AUTHORIZATION, self.signer.fresh_token())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(records = batch.len(), wire_bytes, status = status.as_u16(), "Stream accepted batch");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::HeaderMap as AxumHeaders, routing::post, Router};

    const CONNECTION: &str = "Endpoint=sb://example-ns.servicebus.windows.net/;\
        SharedAccessKeyName=send;SharedAccessKey=c2VjcmV0LWtleQ==";

    fn sink(max_bytes: usize) -> HttpStreamSink {
        HttpStreamSink::new(
            &StreamConnection::parse(CONNECTION).unwrap(),
            "reddit-data-stream",
            BatchLimits::new(max_bytes),
            Duration::from_secs(3600),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_url_from_connection() {
        assert_eq!(
            sink(1024).url(),
            "https://example-ns.servicebus.windows.net/reddit-data-stream/messages"
        );
    }

    #[test]
    fn test_envelope_shape() {
        let mut batch = EventBatch::new(BatchLimits::default());
        batch.try_add(r#"{"post_id":"a"}"#.to_string()).unwrap();
        let json = String::from_utf8(encode_batch(&batch).unwrap()).unwrap();
        assert_eq!(json, r#"[{"Body":"{\"post_id\":\"a\"}"}]"#);
    }

    #[test]
    fn test_encoded_len_counts_escapes() {
        let sink = sink(1024);
        let payload = r#"{"text":"a \"quoted\" \\ path"}"#;
        let envelope = serde_json::to_string(&EventEnvelope { body: payload }).unwrap();
        assert_eq!(sink.encoded_len(payload), envelope.len() + 1);
        assert!(sink.encoded_len(payload) > payload.len() + 11);
    }

    #[test]
    fn test_full_batch_fits_on_the_wire() {
        let max_bytes = 4096;
        let sink = sink(max_bytes);
        let payload = r#"{"title":"\"Xbox\" vs \"PS5\"","text":"C:\\games \"quoted\"","arg":"Xbox"}"#;

        let mut batch = sink.create_batch();
        loop {
            let encoded_len = sink.encoded_len(payload);
            if batch.try_add_encoded(payload.to_string(), encoded_len).is_err() {
                break;
            }
        }

        let wire = encode_batch(&batch).unwrap();
        assert!(batch.len() > 1);
        assert!(wire.len() <= max_bytes, "{} > {max_bytes}", wire.len());
        // raw accounting would have over-filled the batch
        assert!(batch.len() * payload.len() < max_bytes - payload.len());
    }

    #[tokio::test]
    async fn test_send_posts_signed_envelopes() {
        type Seen = Arc<Mutex<Vec<(String, String)>>>;

        async fn capture(State(seen): State<Seen>, headers: AxumHeaders, body: String) -> &'static str {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            seen.lock().unwrap().push((auth, body));
            "ok"
        }

        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/hub/messages", post(capture))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let sink = sink(1024).with_url(&format!("http://{addr}/hub/messages"));
        let mut batch = sink.create_batch();
        batch.try_add(r#"{"post_id":"a"}"#.to_string()).unwrap();
        sink.send(&batch).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (auth, body) = &seen[0];
        assert!(auth.starts_with(
            "SharedAccessSignature sr=https%3A%2F%2Fexample-ns.servicebus.windows.net%2Freddit-data-stream&sig="
        ));
        assert!(auth.ends_with("&skn=send"));
        assert_eq!(body, r#"[{"Body":"{\"post_id\":\"a\"}"}]"#);
    }
}
