//! The Rust SDK for Hyphen Toggle, a feature flag service.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] that resolves toggle values for an
//! [`EvaluationContext`]. A context has a targeting key (usually a user or session id) and
//! attributes the service uses for targeting.
//!
//! Toggles are evaluated remotely. The client sends the context to a horizon endpoint, receives
//! the values of all toggles for it, and caches that response for a configurable time (30 seconds
//! by default), so resolving several toggles for the same context costs a single request.
//!
//! # Endpoints
//!
//! Requests go to the horizon URLs given with [`ClientConfig::horizon_urls`], in order, and
//! finally to a URL derived from the public key. The first endpoint that answers successfully
//! wins; there is no retry of a failed endpoint and no backoff.
//!
//! # Usage telemetry
//!
//! Unless disabled with [`ClientConfig::enable_toggle_usage`], every resolved toggle is reported
//! back to the service from a background thread. Telemetry failures are logged and never affect
//! resolution.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! The `get_*_details()` methods return errors; the `get_*_value()` methods take a default value
//! and return it whenever resolution fails. In production, it is recommended to use the latter, as
//! feature flag evaluation should not be critical enough to cause system crashes.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging messages, with
//! target `hyphen`. Consider integrating a `log`-compatible logger implementation for better
//! visibility into SDK operations.
//!
//! # Examples
//!
//! A runnable example can be found in the `demos` directory of the crate repository.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod cache;
mod cache_key;
mod client;
mod config;
mod context;
mod endpoints;
mod error;
mod evaluation;
mod fallback;
mod gateway;
mod telemetry;
mod transport;

pub use cache::TtlCache;
pub use cache_key::{CacheKeyGenerator, Md5CacheKeyGenerator};
pub use client::{Client, ResolutionDetails, DEFAULT_REASON};
pub use config::ClientConfig;
pub use context::{AttributeValue, Attributes, EvaluationContext, User};
pub use endpoints::{
    build_url, default_horizon_url, org_id_from_public_key, EndpointList, DEFAULT_HORIZON_URL,
};
pub use error::{Error, Result};
pub use evaluation::{Evaluation, EvaluationResponse, ToggleType};
pub use fallback::EndpointFallbackClient;
pub use gateway::EvaluationGateway;
pub use telemetry::{TelemetryPayload, ToggleUsage};
pub use transport::{HttpTransport, Transport};
