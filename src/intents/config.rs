#[derive(Debug, Clone, Copy, Default)]
pub struct IntentConfig {
    /// When set, a local persistence failure after the remote intent was
    /// created surfaces as an error instead of success-plus-reconciliation-log.
    pub strict_persistence: bool,
}

impl IntentConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("CHECKOUT_STRICT_PERSISTENCE") {
            config.strict_persistence = matches!(value.trim(), "1" | "true" | "True" | "TRUE");
        }

        config
    }
}
