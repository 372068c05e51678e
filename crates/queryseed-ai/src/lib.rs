//! Rate-limited access to an external text-generation service.
//!
//! The gateway rotates across configured model endpoints, tracks daily
//! quotas and endpoint health, and reports unavailability instead of
//! blocking so callers can fall back to deterministic values.

pub mod clock;
pub mod config;
pub mod gateway;
pub mod prompt;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EndpointConfig, GatewayConfig};
pub use gateway::{AiGateway, EndpointUsage, Unavailable, UsageStats};
pub use prompt::{ValueHint, build_prompt, clean_completion};
pub use service::{CompletionError, CompletionErrorKind, CompletionRequest, TextCompletion};
