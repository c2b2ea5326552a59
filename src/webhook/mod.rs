//! Forwards completed envelopes to a configured webhook URL via HTTPS POST.
//!
//! This module defines the wire payload (`EnvelopePayload`) and a
//! `WebhookClient` that serves as the SMTP engine's message-received
//! callback: every envelope that survives a full `DATA` phase is
//! serialized to JSON and POSTed here. Unlike the payload-forwarding
//! callback this module was grounded on, a failed delivery is reported
//! back to the caller instead of being logged and swallowed — the
//! engine turns that failure into a `552` reply to the client.

use crate::config::Config;
use crate::core::envelope::Envelope;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

type HttpsConn = hyper_rustls::HttpsConnector<HttpConnector>;
type WebhookHttpClient = Client<HttpsConn, Full<Bytes>>;

/// The JSON payload POSTed to the webhook URL for each completed envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopePayload {
    /// The reverse-path sender, if `MAIL FROM` was ever accepted.
    pub sender: Option<String>,
    /// The forward-path recipients accumulated via `RCPT TO`.
    pub recipients: Vec<String>,
    /// The identity string supplied via `HELO`/`EHLO`.
    pub helo: String,
    /// The raw, dot-unstuffed message body.
    pub body: String,
    /// The id this engine assigned the envelope.
    pub message_id: String,
}

impl From<&Envelope> for EnvelopePayload {
    fn from(envelope: &Envelope) -> Self {
        EnvelopePayload {
            sender: envelope.from.clone(),
            recipients: envelope.to.clone(),
            helo: envelope.helo.clone(),
            body: envelope.body.clone(),
            message_id: envelope.id.clone(),
        }
    }
}

/// An error forwarding an envelope to the configured webhook.
#[derive(Debug)]
pub enum WebhookError {
    /// The circuit breaker is open; delivery was not attempted.
    CircuitOpen,
    /// Serializing the envelope to JSON failed.
    Serialization(serde_json::Error),
    /// Building or sending the HTTP request failed.
    Request(String),
    /// The webhook endpoint responded with a non-2xx status, after
    /// exhausting all configured retries.
    Status(hyper::StatusCode),
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookError::CircuitOpen => write!(f, "webhook circuit breaker is open"),
            WebhookError::Serialization(e) => write!(f, "failed to serialize envelope: {e}"),
            WebhookError::Request(e) => write!(f, "webhook request failed: {e}"),
            WebhookError::Status(status) => write!(f, "webhook responded with status {status}"),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Tracks consecutive webhook failures and trips once
/// `circuit_breaker_threshold` is reached, refusing further attempts
/// until `circuit_breaker_reset_secs` has elapsed since the trip.
struct CircuitBreaker {
    consecutive_failures: u32,
    tripped_at: Option<Instant>,
}

impl CircuitBreaker {
    fn new() -> Self {
        CircuitBreaker {
            consecutive_failures: 0,
            tripped_at: None,
        }
    }

    fn is_open(&self, reset_after: Duration) -> bool {
        match self.tripped_at {
            Some(tripped_at) => tripped_at.elapsed() < reset_after,
            None => false,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.tripped_at = None;
    }

    fn record_failure(&mut self, threshold: u32) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= threshold {
            self.tripped_at = Some(Instant::now());
        }
    }
}

/// Forwards completed envelopes to the configured webhook URL over HTTPS.
pub struct WebhookClient {
    config: Config,
    client: WebhookHttpClient,
    user_agent: String,
    breaker: Mutex<CircuitBreaker>,
}

impl WebhookClient {
    /// Creates a new `WebhookClient`.
    ///
    /// Initializes an HTTPS client using `hyper-rustls` with native system certificates.
    ///
    /// # Panics
    ///
    /// Panics if loading the system's native root TLS certificates fails. This is considered
    /// a fatal error during startup.
    pub fn new(config: Config) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()
            .expect("Failed to load native root certificates for hyper-rustls")
            .https_only()
            .enable_http1()
            .build();

        let client: WebhookHttpClient = Client::builder(TokioExecutor::new()).build(https);

        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

        Self {
            config,
            client,
            user_agent,
            breaker: Mutex::new(CircuitBreaker::new()),
        }
    }

    /// Serializes `envelope` and POSTs it to the configured webhook URL,
    /// retrying up to `webhook_max_retries` times on failure. Returns the
    /// envelope's message id on success.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the circuit breaker is open, serialization fails,
    /// or every attempt (initial plus retries) fails to get a `2xx`
    /// response.
    pub async fn forward(&self, envelope: &Envelope) -> Result<String, WebhookError> {
        let reset_after = Duration::from_secs(self.config.circuit_breaker_reset_secs);
        if self.breaker.lock().unwrap().is_open(reset_after) {
            warn!(
                "Webhook circuit breaker open; refusing to forward envelope {}",
                envelope.id
            );
            return Err(WebhookError::CircuitOpen);
        }

        let payload = EnvelopePayload::from(envelope);
        info!(
            "Forwarding envelope {} from {:?} to {} recipient(s)",
            payload.message_id,
            payload.sender,
            payload.recipients.len()
        );

        let json_body = serde_json::to_string(&payload).map_err(WebhookError::Serialization)?;

        let attempts = 1 + self.config.webhook_max_retries;
        let mut last_err = None;

        for attempt in 1..=attempts {
            match self.post_once(&json_body).await {
                Ok(()) => {
                    self.breaker.lock().unwrap().record_success();
                    info!(
                        "Envelope {} forwarded to webhook on attempt {}",
                        payload.message_id, attempt
                    );
                    return Ok(payload.message_id);
                }
                Err(e) => {
                    error!(
                        "Webhook delivery attempt {}/{} for envelope {} failed: {}",
                        attempt, attempts, payload.message_id, e
                    );
                    last_err = Some(e);
                }
            }
        }

        self.breaker
            .lock()
            .unwrap()
            .record_failure(self.config.circuit_breaker_threshold);

        Err(last_err.expect("loop ran at least once"))
    }

    async fn post_once(&self, json_body: &str) -> Result<(), WebhookError> {
        let request = Request::builder()
            .method(hyper::Method::POST)
            .uri(&self.config.webhook_url)
            .header("content-type", "application/json")
            .header("user-agent", &self.user_agent)
            .body(Full::new(Bytes::from(json_body.to_string())))
            .map_err(|e| WebhookError::Request(e.to_string()))?;

        let timeout = Duration::from_secs(self.config.webhook_timeout_secs);
        let response = tokio::time::timeout(timeout, self.client.request(request))
            .await
            .map_err(|_| WebhookError::Request("request timed out".to_string()))?
            .map_err(|e| WebhookError::Request(e.to_string()))?;

        let status = response.status();
        // Drain the body so the connection can be reused by the pool.
        let _ = response.into_body().collect().await;

        if status.is_success() {
            Ok(())
        } else {
            Err(WebhookError::Status(status))
        }
    }
}
