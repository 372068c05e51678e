use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{TimeDelta, TimeZone, Utc};
use queryseed_ai::{
    AiGateway, CompletionError, CompletionErrorKind, CompletionRequest, EndpointConfig,
    GatewayConfig, ManualClock, TextCompletion, Unavailable, ValueHint,
};
use queryseed_core::DataType;

/// Replays scripted replies and records which model was asked.
#[derive(Default)]
struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedService {
    fn new(replies: Vec<Result<String, CompletionError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn models(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl TextCompletion for ScriptedService {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.calls.lock().unwrap().push(request.model.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("value".to_string()))
    }
}

fn config(endpoints: Vec<EndpointConfig>) -> GatewayConfig {
    GatewayConfig {
        enabled: true,
        endpoints,
        retry_backoff_ms: 500,
        ..GatewayConfig::default()
    }
}

fn hint() -> ValueHint {
    ValueHint::new("companies", "name", DataType::String)
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
    ))
}

#[test]
fn rotates_between_endpoints() {
    let service = ScriptedService::new(vec![]);
    let clock = clock();
    let gateway = AiGateway::new(
        config(vec![
            EndpointConfig::new("alpha", 10, 0),
            EndpointConfig::new("beta", 10, 0),
        ]),
        Some(service.clone()),
        clock,
    );

    for _ in 0..3 {
        assert_eq!(gateway.try_generate_value(&hint()), Ok("value".to_string()));
    }
    assert_eq!(service.models(), vec!["alpha", "beta", "alpha"]);
}

#[test]
fn respects_daily_limit_and_resets_next_day() {
    let service = ScriptedService::new(vec![]);
    let clock = clock();
    let gateway = AiGateway::new(
        config(vec![EndpointConfig::new("alpha", 2, 0)]),
        Some(service),
        clock.clone(),
    );

    assert!(gateway.try_generate_value(&hint()).is_ok());
    assert!(gateway.try_generate_value(&hint()).is_ok());
    assert_eq!(
        gateway.try_generate_value(&hint()),
        Err(Unavailable::NoCallableEndpoint)
    );

    let stats = gateway.usage_stats();
    assert_eq!((stats.used, stats.limit, stats.remaining), (2, 2, 0));
    assert!(!stats.can_call_now);

    clock.advance(TimeDelta::hours(12));
    assert!(gateway.can_call_now());
    assert_eq!(gateway.usage_stats().used, 0);
}

#[test]
fn enforces_minimum_interval_without_blocking() {
    let service = ScriptedService::new(vec![]);
    let clock = clock();
    let gateway = AiGateway::new(
        config(vec![EndpointConfig::new("alpha", 100, 2_000)]),
        Some(service),
        clock.clone(),
    );

    assert!(gateway.try_generate_value(&hint()).is_ok());
    assert!(!gateway.can_call_now());
    assert_eq!(
        gateway.try_generate_value(&hint()),
        Err(Unavailable::NoCallableEndpoint)
    );

    clock.advance(TimeDelta::milliseconds(2_000));
    assert!(gateway.can_call_now());
}

#[test]
fn quota_error_blocks_endpoint_until_midnight_and_falls_through() {
    let service = ScriptedService::new(vec![Err(CompletionError::new(
        CompletionErrorKind::QuotaExhausted,
        "daily quota exceeded",
    ))]);
    let clock = clock();
    let gateway = AiGateway::new(
        config(vec![
            EndpointConfig::new("alpha", 100, 0),
            EndpointConfig::new("beta", 100, 0),
        ]),
        Some(service.clone()),
        clock.clone(),
    );

    assert_eq!(gateway.try_generate_value(&hint()), Ok("value".to_string()));
    assert_eq!(service.models(), vec!["alpha", "beta"]);

    let stats = gateway.usage_stats();
    let alpha = &stats.endpoints[0];
    assert_eq!(alpha.remaining, 0);
    assert_eq!(
        alpha.available_at,
        Some(Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap())
    );
    assert_eq!(stats.remaining, stats.limit - stats.used);
}

#[test]
fn rate_limit_backs_off_by_at_most_the_endpoint_delay() {
    let service = ScriptedService::new(vec![Err(CompletionError::new(
        CompletionErrorKind::RateLimited,
        "429",
    ))]);
    let clock = clock();
    let gateway = AiGateway::new(
        config(vec![EndpointConfig::new("alpha", 100, 200)]),
        Some(service),
        clock.clone(),
    );

    assert_eq!(
        gateway.try_generate_value(&hint()),
        Err(Unavailable::AllFailed(CompletionErrorKind::RateLimited))
    );
    assert!(gateway.usage_stats().endpoints[0].healthy);

    clock.advance(TimeDelta::milliseconds(200));
    assert!(gateway.can_call_now());
}

#[test]
fn network_failure_marks_endpoint_failed_until_daily_reset() {
    let service = ScriptedService::new(vec![
        Err(CompletionError::new(CompletionErrorKind::Network, "connection refused")),
    ]);
    let clock = clock();
    let gateway = AiGateway::new(
        config(vec![
            EndpointConfig::new("alpha", 100, 0),
            EndpointConfig::new("beta", 100, 0),
        ]),
        Some(service.clone()),
        clock.clone(),
    );

    assert!(gateway.try_generate_value(&hint()).is_ok());
    assert!(gateway.try_generate_value(&hint()).is_ok());
    assert_eq!(service.models(), vec!["alpha", "beta", "beta"]);

    let alpha = &gateway.usage_stats().endpoints[0];
    assert!(!alpha.healthy);
    assert!(alpha.last_failure.as_deref().unwrap().contains("connection refused"));

    clock.advance(TimeDelta::days(1));
    assert!(gateway.usage_stats().endpoints[0].healthy);
}

#[test]
fn concurrent_callers_never_overspend_the_last_call() {
    let service = ScriptedService::new(vec![]);
    let gateway = Arc::new(AiGateway::new(
        config(vec![EndpointConfig::new("alpha", 5, 0)]),
        Some(service),
        clock(),
    ));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let gateway = Arc::clone(&gateway);
            std::thread::spawn(move || gateway.try_generate_value(&hint()).is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 5);
    assert_eq!(gateway.usage_stats().used, 5);
}

#[test]
fn missing_service_signals_fallback() {
    let gateway = AiGateway::new(config(vec![EndpointConfig::new("alpha", 5, 0)]), None, clock());
    assert_eq!(gateway.try_generate_value(&hint()), Err(Unavailable::NoService));
}

#[test]
fn config_reads_from_toml() {
    let config: GatewayConfig = toml::from_str(
        r#"
        enabled = true
        max_tokens = 32

        [[endpoints]]
        model = "alpha"
        daily_limit = 10
        min_interval_ms = 250
        "#,
    )
    .unwrap();

    assert!(config.enabled);
    assert_eq!(config.endpoints, vec![EndpointConfig::new("alpha", 10, 250)]);
    assert_eq!(config.api_key_env, "QUERYSEED_AI_API_KEY");
}
