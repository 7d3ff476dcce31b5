pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Shared signing secret issued by the processor for this endpoint.
    pub signing_secret: String,
    /// Replay-tolerance window applied to the signed timestamp.
    pub tolerance_secs: i64,
}

impl WebhookConfig {
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let signing_secret = std::env::var("CHECKOUT_WEBHOOK_SECRET")?;

        let mut tolerance_secs = DEFAULT_TOLERANCE_SECS;
        if let Ok(value) = std::env::var("CHECKOUT_WEBHOOK_TOLERANCE_SECS")
            && let Ok(parsed) = value.parse::<i64>()
        {
            tolerance_secs = parsed.max(1);
        }

        Ok(Self {
            signing_secret,
            tolerance_secs,
        })
    }
}
