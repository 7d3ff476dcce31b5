use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Process-wide HTTP client, initialized on first use and never torn down.
/// Timeouts are applied per request so one client serves every caller.
pub fn shared_http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(reqwest::Client::new)
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Network failure, timeout, or 5xx. Safe to retry with the same
    /// idempotency key.
    #[error("payment processor unreachable: {0}")]
    Unavailable(String),
    /// The processor rejected the request outright (4xx).
    #[error("payment processor rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected processor response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct CreateIntentCall {
    pub amount: i64,
    pub currency: String,
    pub idempotency_key: Option<String>,
}

/// What the processor hands back on creation. The client secret is only ever
/// relayed to the requesting client, never logged or listed.
#[derive(Debug, Clone)]
pub struct RemoteIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_intent(&self, call: &CreateIntentCall) -> Result<RemoteIntent, ProcessorError>;
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_ms: u64,
}

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let api_key = std::env::var("CHECKOUT_PROCESSOR_API_KEY")?;

        let base_url = std::env::var("CHECKOUT_PROCESSOR_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let mut timeout_ms = DEFAULT_TIMEOUT_MS;
        if let Ok(value) = std::env::var("CHECKOUT_PROCESSOR_TIMEOUT_MS")
            && let Ok(parsed) = value.parse::<u64>()
        {
            timeout_ms = parsed.max(1);
        }

        Ok(Self {
            api_key,
            base_url,
            timeout_ms,
        })
    }
}

pub struct HttpProcessorClient {
    config: ProcessorConfig,
}

impl HttpProcessorClient {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }
}

#[derive(Deserialize)]
struct IntentCreatedBody {
    id: String,
    client_secret: String,
}

#[async_trait]
impl PaymentProcessor for HttpProcessorClient {
    async fn create_intent(&self, call: &CreateIntentCall) -> Result<RemoteIntent, ProcessorError> {
        let url = format!(
            "{}/v1/payment_intents",
            self.config.base_url.trim_end_matches('/')
        );
        let params = [
            ("amount", call.amount.to_string()),
            ("currency", call.currency.clone()),
        ];

        let mut request = shared_http_client()
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .form(&params);
        if let Some(key) = call.idempotency_key.as_deref() {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ProcessorError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ProcessorError::Unavailable(format!(
                "processor returned {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProcessorError::Rejected(format!("{status}: {body}")));
        }

        let body: IntentCreatedBody = response
            .json()
            .await
            .map_err(|err| ProcessorError::InvalidResponse(err.to_string()))?;

        Ok(RemoteIntent {
            id: body.id,
            client_secret: body.client_secret,
        })
    }
}
