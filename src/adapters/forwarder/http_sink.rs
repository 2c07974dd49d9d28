//! HTTP telemetry sink.
//!
//! `POST`s each normalized record as JSON to the configured storage endpoint.
//! Any 2xx counts as stored; everything else maps to a [`ForwardError`].
//! Status records go to a second endpoint and are skipped when none is set.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::domain::relay::{SystemStatusRecord, TelemetryRecord};
use crate::ports::{ForwardError, TelemetrySink};

/// Telemetry sink backed by a plain HTTP endpoint.
pub struct HttpTelemetrySink {
    url: String,
    status_url: Option<String>,
    timeout: Duration,
    client: Client,
}

impl HttpTelemetrySink {
    /// Creates a sink posting to `url` with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ForwardError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForwardError::Client(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            status_url: None,
            timeout,
            client,
        })
    }

    /// Also post producer online/offline records to `url`.
    pub fn with_status_url(mut self, url: impl Into<String>) -> Self {
        self.status_url = Some(url.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status_url(&self) -> Option<&str> {
        self.status_url.as_deref()
    }

    async fn post_json<T: Serialize + Sync>(&self, url: &str, body: &T) -> Result<(), ForwardError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ForwardError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                    }
                } else if e.is_connect() {
                    ForwardError::Network(format!("Connection failed: {}", e))
                } else {
                    ForwardError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ForwardError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn log_telemetry(&self, record: &TelemetryRecord) -> Result<(), ForwardError> {
        self.post_json(&self.url, record).await
    }

    async fn log_system_status(&self, record: &SystemStatusRecord) -> Result<(), ForwardError> {
        match &self.status_url {
            Some(url) => self.post_json(url, record).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::relay::ComponentStatus;
    use axum::{routing::post, Json, Router};
    use http::StatusCode;
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/telemetry", addr)
    }

    fn record() -> TelemetryRecord {
        TelemetryRecord {
            sequence: 1,
            received_at: "2025-01-10T00:00:00.000Z".to_string(),
            source: "esp32".to_string(),
            soil_moisture: Some(42.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn posts_record_as_json() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let router = Router::new().route(
            "/telemetry",
            post(move |Json(body): Json<Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    StatusCode::CREATED
                }
            }),
        );
        let url = serve(router).await;
        let sink = HttpTelemetrySink::new(url, Duration::from_secs(2)).unwrap();

        sink.log_telemetry(&record()).await.unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body["soil_moisture"], 42.0);
        assert_eq!(body["source"], "esp32");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let router = Router::new().route(
            "/telemetry",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let url = serve(router).await;
        let sink = HttpTelemetrySink::new(url, Duration::from_secs(2)).unwrap();

        assert_eq!(
            sink.log_telemetry(&record()).await,
            Err(ForwardError::Status { status: 500 })
        );
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let router = Router::new().route(
            "/telemetry",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK
            }),
        );
        let url = serve(router).await;
        let sink = HttpTelemetrySink::new(url, Duration::from_millis(100)).unwrap();

        assert!(matches!(
            sink.log_telemetry(&record()).await,
            Err(ForwardError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink =
            HttpTelemetrySink::new(format!("http://{}/telemetry", addr), Duration::from_secs(2))
                .unwrap();

        assert!(matches!(
            sink.log_telemetry(&record()).await,
            Err(ForwardError::Network(_))
        ));
    }

    #[tokio::test]
    async fn status_records_go_to_status_url() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let router = Router::new().route(
            "/telemetry",
            post(move |Json(body): Json<Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    StatusCode::OK
                }
            }),
        );
        let status_url = serve(router).await;
        let sink = HttpTelemetrySink::new("http://127.0.0.1:9/unused", Duration::from_secs(2))
            .unwrap()
            .with_status_url(status_url);

        let record = SystemStatusRecord::producer(ComponentStatus::Online, "esp32", Timestamp::now());
        sink.log_system_status(&record).await.unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body["component"], "producer");
        assert_eq!(body["status"], "online");
        assert_eq!(body["message"], "Producer esp32 connected");
    }

    #[tokio::test]
    async fn status_records_are_skipped_without_status_url() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink =
            HttpTelemetrySink::new(format!("http://{}/telemetry", addr), Duration::from_secs(2))
                .unwrap();
        let record = SystemStatusRecord::producer(ComponentStatus::Offline, "esp32", Timestamp::now());

        assert_eq!(sink.status_url(), None);
        assert_eq!(sink.log_system_status(&record).await, Ok(()));
    }
}
