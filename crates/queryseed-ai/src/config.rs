use serde::{Deserialize, Serialize};

const DEFAULT_MAX_TOKENS: u32 = 64;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;

/// Gateway settings, usually read from the `[ai]` table of `queryseed.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    pub enabled: bool,
    /// Environment variable holding the service API key.
    pub api_key_env: String,
    pub endpoints: Vec<EndpointConfig>,
    pub max_tokens: u32,
    /// Backoff after a rate limit or timeout, capped by the endpoint delay.
    pub retry_backoff_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key_env: "QUERYSEED_AI_API_KEY".to_string(),
            endpoints: vec![
                EndpointConfig::new("gemini-1.5-flash", 1_500, 4_000),
                EndpointConfig::new("gemini-1.5-pro", 50, 30_000),
            ],
            max_tokens: DEFAULT_MAX_TOKENS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    pub model: String,
    pub daily_limit: u32,
    #[serde(default)]
    pub min_interval_ms: u64,
}

impl EndpointConfig {
    pub fn new(model: impl Into<String>, daily_limit: u32, min_interval_ms: u64) -> Self {
        Self {
            model: model.into(),
            daily_limit,
            min_interval_ms,
        }
    }
}
