//! Client-side confirmation handshake against the processor.
//!
//! The browser exchanges the client secret plus a payment-method token for a
//! final charge. This module is the typed client for that exchange: a
//! transport implementation, a single-flight guard that disables duplicate
//! submission, and a composable error boundary that observes one declared
//! error category and passes everything else through untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::processor::{ProcessorConfig, shared_http_client};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Succeeded,
    Failed,
    /// The processor accepted the request but the final state is not yet
    /// known (timeout-adjacent, or still processing). Never promoted to
    /// `Succeeded` locally; the webhook reconciles it.
    Unknown,
}

#[derive(Debug, Error)]
pub enum ConfirmError {
    /// The request timed out. A charge may still have been accepted
    /// remotely, so the outcome is unknown rather than failed.
    #[error("confirmation timed out; outcome unknown")]
    Timeout,
    #[error("confirmation transport failed: {0}")]
    Transport(String),
    #[error("confirmation declined: {0}")]
    Declined(String),
    #[error("a confirmation is already in flight")]
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Timeout,
    Transport,
    Declined,
    InFlight,
}

impl ConfirmError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConfirmError::Timeout => ErrorCategory::Timeout,
            ConfirmError::Transport(_) => ErrorCategory::Transport,
            ConfirmError::Declined(_) => ErrorCategory::Declined,
            ConfirmError::InFlight => ErrorCategory::InFlight,
        }
    }
}

#[async_trait]
pub trait ConfirmPayment: Send + Sync {
    async fn confirm(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<ConfirmOutcome, ConfirmError>;
}

pub struct HttpConfirmClient {
    config: ProcessorConfig,
}

impl HttpConfirmClient {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }
}

#[derive(Deserialize)]
struct ConfirmBody {
    status: String,
}

#[async_trait]
impl ConfirmPayment for HttpConfirmClient {
    async fn confirm(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<ConfirmOutcome, ConfirmError> {
        // The secret embeds the intent id: "<intent_id>_secret_<nonce>".
        let intent_id = client_secret
            .split("_secret")
            .next()
            .unwrap_or(client_secret);

        let url = format!(
            "{}/v1/payment_intents/{}/confirm",
            self.config.base_url.trim_end_matches('/'),
            intent_id
        );
        let params = [
            ("client_secret", client_secret),
            ("payment_method", payment_method),
        ];

        let response = shared_http_client()
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .form(&params)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ConfirmError::Timeout
                } else {
                    ConfirmError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ConfirmError::Transport(format!(
                "processor returned {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConfirmError::Declined(format!("{status}: {body}")));
        }

        let body: ConfirmBody = response
            .json()
            .await
            .map_err(|err| ConfirmError::Transport(err.to_string()))?;

        Ok(match body.status.as_str() {
            "succeeded" => ConfirmOutcome::Succeeded,
            "processing" => ConfirmOutcome::Unknown,
            _ => ConfirmOutcome::Failed,
        })
    }
}

/// Rejects a confirmation while a previous one is still outstanding, the
/// server-side analogue of disabling the pay button mid-submit.
pub struct SingleFlight<C> {
    inner: C,
    in_flight: AtomicBool,
}

impl<C> SingleFlight<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            in_flight: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<C: ConfirmPayment> ConfirmPayment for SingleFlight<C> {
    async fn confirm(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<ConfirmOutcome, ConfirmError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(ConfirmError::InFlight);
        }
        let result = self.inner.confirm(client_secret, payment_method).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }
}

/// Composition-style error interceptor: holds the wrapped handler, observes
/// errors of exactly one declared category, and passes every result through
/// unchanged.
pub struct ErrorBoundary<C> {
    inner: C,
    category: ErrorCategory,
    observer: Box<dyn Fn(&ConfirmError) + Send + Sync>,
}

impl<C> ErrorBoundary<C> {
    pub fn new(
        inner: C,
        category: ErrorCategory,
        observer: impl Fn(&ConfirmError) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            category,
            observer: Box::new(observer),
        }
    }
}

#[async_trait]
impl<C: ConfirmPayment> ConfirmPayment for ErrorBoundary<C> {
    async fn confirm(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<ConfirmOutcome, ConfirmError> {
        let result = self.inner.confirm(client_secret, payment_method).await;
        if let Err(err) = &result
            && err.category() == self.category
        {
            (self.observer)(err);
        }
        result
    }
}
