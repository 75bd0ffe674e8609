//! Cached flag evaluation on top of the endpoint fallback client.
use std::{sync::Arc, time::Duration};

use crate::{
    cache::{Clock, SystemClock, TtlCache},
    cache_key::CacheKeyGenerator,
    endpoints::EndpointList,
    fallback::EndpointFallbackClient,
    telemetry::TelemetryPayload,
    transport::Transport,
    EvaluationContext, EvaluationResponse, Result,
};

const EVALUATE_PATH: &str = "/toggle/evaluate";
const TELEMETRY_PATH: &str = "/toggle/telemetry";

/// Answers "evaluate toggles for this context", serving repeated contexts from a TTL cache.
///
/// The cache belongs to the gateway: two gateways never share entries.
pub struct EvaluationGateway {
    endpoints: EndpointList,
    fallback: EndpointFallbackClient,
    cache: TtlCache<String, Arc<EvaluationResponse>>,
    key_generator: Box<dyn CacheKeyGenerator + Send + Sync>,
}

impl EvaluationGateway {
    /// Create a gateway that caches responses for `cache_ttl`.
    pub fn new(
        endpoints: EndpointList,
        transport: Box<dyn Transport + Send + Sync>,
        key_generator: Box<dyn CacheKeyGenerator + Send + Sync>,
        cache_ttl: Duration,
    ) -> EvaluationGateway {
        EvaluationGateway::with_clock(
            endpoints,
            transport,
            key_generator,
            cache_ttl,
            Arc::new(SystemClock),
        )
    }

    pub(crate) fn with_clock(
        endpoints: EndpointList,
        transport: Box<dyn Transport + Send + Sync>,
        key_generator: Box<dyn CacheKeyGenerator + Send + Sync>,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> EvaluationGateway {
        EvaluationGateway {
            endpoints,
            fallback: EndpointFallbackClient::new(transport),
            cache: TtlCache::with_clock(cache_ttl, clock),
            key_generator,
        }
    }

    /// Endpoints requests are sent to, in order.
    pub fn endpoints(&self) -> &EndpointList {
        &self.endpoints
    }

    /// Cache key `context` is stored under.
    pub fn cache_key(&self, context: &EvaluationContext) -> String {
        self.key_generator.generate(context)
    }

    /// Evaluate all toggles for `context`.
    ///
    /// A cached response younger than the cache TTL is returned without any network request.
    /// Otherwise the endpoints are tried in order and the parsed response is cached.
    ///
    /// # Errors
    ///
    /// - The error of the last endpoint if every endpoint failed.
    /// - [`Error::ResponseParse`](crate::Error::ResponseParse) if the response body is malformed.
    pub fn evaluate(&self, context: &EvaluationContext) -> Result<Arc<EvaluationResponse>> {
        let key = self.cache_key(context);

        if let Some(response) = self.cache.get(&key) {
            log::debug!(target: "hyphen", cache_key:display = key; "evaluation cache hit");
            return Ok(response);
        }

        log::debug!(target: "hyphen", cache_key:display = key; "evaluating toggles");
        let body = self
            .fallback
            .send(&self.endpoints, EVALUATE_PATH, &context.to_wire_value())?;
        let response = Arc::new(EvaluationResponse::from_json(&body)?);

        self.cache.set(key, response.clone());

        Ok(response)
    }

    /// Send a usage record. Never touches the evaluation cache.
    ///
    /// # Errors
    ///
    /// Returns the error of the last endpoint if every endpoint failed. Callers on the evaluation
    /// path should log and discard it.
    pub fn post_telemetry(&self, payload: &TelemetryPayload) -> Result<()> {
        self.fallback
            .send(&self.endpoints, TELEMETRY_PATH, &payload.to_wire_value())?;
        Ok(())
    }

    /// Drop all cached responses.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
