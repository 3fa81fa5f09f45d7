//! Remote event sinks.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::errors::SinkError;
use crate::event::encode_key;

/// Blocking submission contract of the remote event collector.
///
/// Called from transport worker threads, never from the simulation.
pub trait EventSink: Send + Sync {
    fn submit(&self, key: &str, payload: &Value, collection: &str) -> Result<(), SinkError>;
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    data: &'a Value,
    colname: &'a str,
    #[serde(rename = "api-key")]
    api_key: &'a str,
}

/// Posts events to the HTTP collector.
///
/// The collector answers `201 Created` for an accepted record; anything else is a failure.
pub struct HttpSink {
    client: Client,
    handle: Handle,
    base_url: String,
    api_key: String,
}

impl HttpSink {
    /// Requests run on `handle` so worker threads can block on them.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, handle: Handle) -> Self {
        Self {
            client: Client::new(),
            handle,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, key: &str) -> String {
        format!("{}{}/", self.base_url, encode_key(key))
    }
}

impl EventSink for HttpSink {
    fn submit(&self, key: &str, payload: &Value, collection: &str) -> Result<(), SinkError> {
        let url = self.url(key);
        let request = SubmitRequest {
            data: payload,
            colname: collection,
            api_key: &self.api_key,
        };
        self.handle.block_on(async {
            let resp = self.client.post(&url).json(&request).send().await?;
            match resp.status() {
                StatusCode::CREATED => Ok(()),
                status => Err(SinkError::Status(status.as_u16())),
            }
        })
    }
}

/// Logs every submission and accepts it. Used for dry runs.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn submit(&self, key: &str, payload: &Value, collection: &str) -> Result<(), SinkError> {
        if collection.ends_with("-locations") {
            debug!("{collection} {key}: {payload}");
        } else {
            info!("{collection} {key}: {payload}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_url_encodes_key() {
        let sink = HttpSink::new("http://localhost:5000/data/", "k", Handle::current());
        assert_eq!(sink.url("dev 1/2"), "http://localhost:5000/data/dev+1%2F2/");
    }

    #[test]
    fn test_request_body_shape() {
        let payload = serde_json::json!({"dev": "d", "la": "1.0"});
        let body = serde_json::to_value(SubmitRequest {
            data: &payload,
            colname: "race-locations",
            api_key: "secret",
        })
        .unwrap();
        assert_eq!(body["colname"], "race-locations");
        assert_eq!(body["api-key"], "secret");
        assert_eq!(body["data"]["dev"], "d");
    }

    #[test]
    fn test_log_sink_accepts() {
        assert!(LogSink.submit("1", &Value::Null, "race-RaceStart").is_ok());
    }
}
