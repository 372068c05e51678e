use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{EndpointConfig, GatewayConfig};
use crate::prompt::{ValueHint, build_prompt, clean_completion};
use crate::service::{CompletionError, CompletionErrorKind, CompletionRequest, TextCompletion};

/// Why the gateway produced no value. Callers fall back on every variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Unavailable {
    #[error("ai generation is disabled")]
    Disabled,
    #[error("no completion service configured")]
    NoService,
    #[error("no endpoint can be called right now")]
    NoCallableEndpoint,
    #[error("every attempted endpoint failed, last error: {0}")]
    AllFailed(CompletionErrorKind),
    #[error("completion was empty")]
    EmptyCompletion,
}

/// Snapshot of one endpoint's counters and health.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EndpointUsage {
    pub model: String,
    pub healthy: bool,
    pub last_failure: Option<String>,
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub last_call: Option<DateTime<Utc>>,
    pub min_interval_ms: u64,
    pub available_at: Option<DateTime<Utc>>,
    pub reset_at: DateTime<Utc>,
    pub can_call_now: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UsageStats {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub can_call_now: bool,
    pub endpoints: Vec<EndpointUsage>,
}

#[derive(Debug)]
struct EndpointState {
    config: EndpointConfig,
    healthy: bool,
    last_failure: Option<String>,
    used: u32,
    last_call: Option<DateTime<Utc>>,
    /// Quota exhaustion or a transient backoff.
    blocked_until: Option<DateTime<Utc>>,
}

impl EndpointState {
    fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            healthy: true,
            last_failure: None,
            used: 0,
            last_call: None,
            blocked_until: None,
        }
    }

    fn remaining(&self) -> u32 {
        self.config.daily_limit.saturating_sub(self.used)
    }

    fn min_interval(&self) -> TimeDelta {
        TimeDelta::milliseconds(i64::try_from(self.config.min_interval_ms).unwrap_or(i64::MAX))
    }

    fn next_allowed(&self) -> Option<DateTime<Utc>> {
        let after_delay = self.last_call.map(|last| last + self.min_interval());
        match (after_delay, self.blocked_until) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    fn callable(&self, now: DateTime<Utc>) -> bool {
        self.healthy
            && self.remaining() > 0
            && self.next_allowed().is_none_or(|allowed| allowed <= now)
    }
}

#[derive(Debug)]
struct GatewayState {
    day: NaiveDate,
    cursor: usize,
    endpoints: Vec<EndpointState>,
}

impl GatewayState {
    /// Reset counters and health when the UTC day changes.
    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today == self.day {
            return;
        }
        info!(previous = %self.day, current = %today, "daily ai quota reset");
        self.day = today;
        for endpoint in &mut self.endpoints {
            endpoint.used = 0;
            endpoint.healthy = true;
            endpoint.last_failure = None;
            endpoint.blocked_until = None;
        }
    }

    /// Pick the next callable endpoint from the cursor and count the call.
    fn reserve(&mut self, now: DateTime<Utc>) -> Option<usize> {
        let count = self.endpoints.len();
        let idx = (0..count)
            .map(|offset| (self.cursor + offset) % count)
            .find(|idx| self.endpoints[*idx].callable(now))?;

        let endpoint = &mut self.endpoints[idx];
        endpoint.used += 1;
        endpoint.last_call = Some(now);
        self.cursor = (idx + 1) % count;
        Some(idx)
    }
}

/// Quota-aware front door to a [`TextCompletion`] service.
///
/// State is owned by the instance and guarded by a mutex; the call itself
/// runs outside the lock once a slot has been reserved.
pub struct AiGateway {
    config: GatewayConfig,
    service: Option<Arc<dyn TextCompletion>>,
    clock: Arc<dyn Clock>,
    state: Mutex<GatewayState>,
}

impl std::fmt::Debug for AiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiGateway")
            .field("config", &self.config)
            .field("has_service", &self.service.is_some())
            .finish_non_exhaustive()
    }
}

impl AiGateway {
    pub fn new(
        config: GatewayConfig,
        service: Option<Arc<dyn TextCompletion>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let endpoints = config
            .endpoints
            .iter()
            .cloned()
            .map(EndpointState::new)
            .collect();
        let state = GatewayState {
            day: clock.now().date_naive(),
            cursor: 0,
            endpoints,
        };
        Self {
            config,
            service,
            clock,
            state: Mutex::new(state),
        }
    }

    /// Gateway that never calls out; every request falls back.
    pub fn disabled(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            GatewayConfig {
                enabled: false,
                ..GatewayConfig::default()
            },
            None,
            clock,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.service.is_some() && !self.config.endpoints.is_empty()
    }

    /// Ask the service for one value; never blocks on quota or delay.
    pub fn try_generate_value(&self, hint: &ValueHint) -> Result<String, Unavailable> {
        if !self.config.enabled {
            return Err(Unavailable::Disabled);
        }
        let Some(service) = self.service.as_ref() else {
            return Err(Unavailable::NoService);
        };

        let prompt = build_prompt(hint);
        let mut last_error = None;

        for _ in 0..self.config.endpoints.len() {
            let now = self.clock.now();
            let reserved = {
                let mut state = self.lock_state();
                state.roll_day(now);
                state
                    .reserve(now)
                    .map(|idx| (idx, state.endpoints[idx].config.model.clone()))
            };
            let Some((idx, model)) = reserved else {
                break;
            };

            let request = CompletionRequest {
                model: model.clone(),
                prompt: prompt.clone(),
                max_tokens: self.config.max_tokens,
            };
            match service.complete(&request) {
                Ok(raw) => {
                    return match clean_completion(&raw, hint.max_length) {
                        Some(value) => {
                            debug!(
                                model = %model,
                                table = %hint.table,
                                column = %hint.column,
                                "ai value generated"
                            );
                            Ok(value)
                        }
                        None => {
                            self.record_failure(
                                idx,
                                &CompletionError::new(
                                    CompletionErrorKind::InvalidResponse,
                                    "empty completion",
                                ),
                            );
                            Err(Unavailable::EmptyCompletion)
                        }
                    };
                }
                Err(error) => {
                    self.record_failure(idx, &error);
                    last_error = Some(error.kind);
                }
            }
        }

        Err(match last_error {
            Some(kind) => Unavailable::AllFailed(kind),
            None => Unavailable::NoCallableEndpoint,
        })
    }

    /// True when some endpoint is under its limit, healthy and past its delay.
    pub fn can_call_now(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let now = self.clock.now();
        let mut state = self.lock_state();
        state.roll_day(now);
        state.endpoints.iter().any(|endpoint| endpoint.callable(now))
    }

    pub fn usage_stats(&self) -> UsageStats {
        let now = self.clock.now();
        let enabled = self.is_enabled();
        let mut state = self.lock_state();
        state.roll_day(now);
        let reset_at = next_midnight_utc(now);

        let endpoints: Vec<EndpointUsage> = state
            .endpoints
            .iter()
            .map(|endpoint| EndpointUsage {
                model: endpoint.config.model.clone(),
                healthy: endpoint.healthy,
                last_failure: endpoint.last_failure.clone(),
                used: endpoint.used,
                limit: endpoint.config.daily_limit,
                remaining: endpoint.remaining(),
                last_call: endpoint.last_call,
                min_interval_ms: endpoint.config.min_interval_ms,
                available_at: endpoint.next_allowed().filter(|at| *at > now),
                reset_at,
                can_call_now: enabled && endpoint.callable(now),
            })
            .collect();

        let used = endpoints.iter().map(|e| e.used).sum();
        let limit = endpoints.iter().map(|e| e.limit).sum::<u32>();
        UsageStats {
            used,
            limit,
            remaining: endpoints.iter().map(|e| e.remaining).sum(),
            reset_at,
            can_call_now: endpoints.iter().any(|e| e.can_call_now),
            endpoints,
        }
    }

    fn record_failure(&self, idx: usize, error: &CompletionError) {
        let now = self.clock.now();
        let backoff = TimeDelta::milliseconds(
            i64::try_from(self.config.retry_backoff_ms).unwrap_or(i64::MAX),
        );
        let mut state = self.lock_state();
        let Some(endpoint) = state.endpoints.get_mut(idx) else {
            return;
        };
        endpoint.last_failure = Some(error.to_string());

        match error.kind {
            CompletionErrorKind::QuotaExhausted => {
                endpoint.used = endpoint.config.daily_limit;
                endpoint.blocked_until = Some(next_midnight_utc(now));
                warn!(
                    model = %endpoint.config.model,
                    code = error.kind.as_str(),
                    "ai endpoint quota exhausted until next UTC day"
                );
            }
            kind if kind.is_transient() => {
                let delay = backoff.min(endpoint.min_interval());
                endpoint.blocked_until = Some(now + delay);
                warn!(
                    model = %endpoint.config.model,
                    code = kind.as_str(),
                    backoff_ms = delay.num_milliseconds(),
                    "ai endpoint backing off"
                );
            }
            kind => {
                endpoint.healthy = false;
                warn!(
                    model = %endpoint.config.model,
                    code = kind.as_str(),
                    error = %error.message,
                    "ai endpoint marked failed"
                );
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, GatewayState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Start of the next UTC day.
pub fn next_midnight_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn next_midnight_rolls_to_following_day() {
        let now = Utc.with_ymd_and_hms(2024, 2, 28, 23, 59, 59).unwrap();
        let midnight = next_midnight_utc(now);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn disabled_gateway_reports_unavailable() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gateway = AiGateway::disabled(clock);
        let hint = ValueHint::new("users", "full_name", queryseed_core::DataType::String);
        assert_eq!(gateway.try_generate_value(&hint), Err(Unavailable::Disabled));
        assert!(!gateway.can_call_now());
        let stats = gateway.usage_stats();
        assert_eq!(stats.remaining, stats.limit - stats.used);
    }
}
