use std::sync::Arc;

use serde_json::Value;

use crate::{
    cache_key::md5_hex,
    endpoints::EndpointList,
    gateway::EvaluationGateway,
    telemetry::{TelemetryPayload, TelemetryThread, ToggleUsage},
    transport::{HttpTransport, Transport},
    ClientConfig, Error, EvaluationContext, EvaluationResponse, Result, ToggleType,
};

/// Reason reported when the server does not give one.
pub const DEFAULT_REASON: &str = "TARGETING_MATCH";

/// A resolved toggle value with the metadata reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionDetails<T> {
    /// Toggle key.
    pub flag_key: String,
    /// Resolved value.
    pub value: T,
    /// Variant name, or the value rendered as text when the server sends none.
    pub variant: Option<String>,
    /// Resolution reason.
    pub reason: String,
}

/// A client for the Hyphen toggle service.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// Every resolution goes through the client's [`EvaluationGateway`], so repeated calls for the
/// same context within the cache TTL issue a single request. When toggle usage is enabled, each
/// successful resolution is reported in the background.
///
/// # Examples
/// ```no_run
/// # use hyphen::{ClientConfig, EvaluationContext};
/// let client = ClientConfig::from_public_key("public_key")
///     .application("my-app")
///     .environment("production")
///     .to_client()?;
///
/// let enabled = client.get_boolean_value(
///     "new-checkout",
///     false,
///     &EvaluationContext::new("user-1"),
/// );
/// # Ok::<(), hyphen::Error>(())
/// ```
pub struct Client {
    application: String,
    environment: String,
    gateway: Arc<EvaluationGateway>,
    telemetry: Option<TelemetryThread>,
}

impl Client {
    /// Create a new `Client` using the specified configuration.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::to_client`].
    pub fn new(config: ClientConfig) -> Result<Client> {
        config.validate()?;

        let endpoints = EndpointList::new(&config.horizon_urls, &config.public_key)?;
        let transport: Box<dyn Transport + Send + Sync> = match config.transport {
            Some(transport) => transport,
            None => Box::new(HttpTransport::new(
                &config.public_key,
                config.request_timeout,
            )?),
        };
        let gateway = Arc::new(EvaluationGateway::new(
            endpoints,
            transport,
            config.cache_key_generator,
            config.cache_ttl,
        ));

        let telemetry = if config.enable_toggle_usage {
            Some(TelemetryThread::start(gateway.clone())?)
        } else {
            None
        };

        Ok(Client {
            application: config.application,
            environment: config.environment,
            gateway,
            telemetry,
        })
    }

    /// The gateway used for evaluation and telemetry requests.
    pub fn gateway(&self) -> &EvaluationGateway {
        &self.gateway
    }

    /// Evaluate all toggles for `context`.
    ///
    /// The context is prepared first: application and environment are filled in from the
    /// configuration and a targeting key is derived if the context has none.
    pub fn evaluate(&self, context: &EvaluationContext) -> Result<Arc<EvaluationResponse>> {
        self.gateway.evaluate(&self.prepare_context(context))
    }

    /// Resolve a boolean toggle.
    ///
    /// # Errors
    ///
    /// - [`Error::FlagNotFound`] if the server did not evaluate `flag_key`.
    /// - [`Error::FlagError`] if the server reported an error for `flag_key`.
    /// - [`Error::TypeMismatch`] if the toggle is not a boolean.
    /// - Any error of [`EvaluationGateway::evaluate`].
    pub fn get_boolean_details(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<bool>> {
        self.resolve(flag_key, context, ToggleType::Boolean, |value| match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    }

    /// Resolve a string toggle.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_boolean_details`].
    pub fn get_string_details(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<String>> {
        self.resolve(flag_key, context, ToggleType::String, |value| {
            value.as_str().map(str::to_owned)
        })
    }

    /// Resolve a number toggle as an integer. Fractional values are truncated.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_boolean_details`].
    pub fn get_integer_details(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<i64>> {
        self.resolve(flag_key, context, ToggleType::Number, |value| {
            value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
        })
    }

    /// Resolve a number toggle as a float.
    ///
    /// # Errors
    ///
    /// Same as [`Client::get_boolean_details`].
    pub fn get_float_details(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<f64>> {
        self.resolve(flag_key, context, ToggleType::Number, Value::as_f64)
    }

    /// Resolve an object toggle. Values sent as JSON-encoded strings are decoded.
    ///
    /// # Errors
    ///
    /// - [`Error::ObjectParse`] if the value is a string that is not valid JSON.
    /// - Same as [`Client::get_boolean_details`] otherwise.
    pub fn get_object_details(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
    ) -> Result<ResolutionDetails<Value>> {
        let ResolutionDetails {
            flag_key,
            value,
            variant,
            reason,
        } = self.resolve(flag_key, context, ToggleType::Object, |value| {
            Some(value.clone())
        })?;

        let value = match value {
            Value::String(encoded) => {
                serde_json::from_str(&encoded).map_err(|err| Error::ObjectParse(err.into()))?
            }
            other => other,
        };

        Ok(ResolutionDetails {
            flag_key,
            value,
            variant,
            reason,
        })
    }

    /// Resolve a boolean toggle, returning `default` on any error.
    pub fn get_boolean_value(
        &self,
        flag_key: &str,
        default: bool,
        context: &EvaluationContext,
    ) -> bool {
        value_or_default(flag_key, self.get_boolean_details(flag_key, context), default)
    }

    /// Resolve a string toggle, returning `default` on any error.
    pub fn get_string_value(
        &self,
        flag_key: &str,
        default: impl Into<String>,
        context: &EvaluationContext,
    ) -> String {
        value_or_default(
            flag_key,
            self.get_string_details(flag_key, context),
            default.into(),
        )
    }

    /// Resolve an integer toggle, returning `default` on any error.
    pub fn get_integer_value(
        &self,
        flag_key: &str,
        default: i64,
        context: &EvaluationContext,
    ) -> i64 {
        value_or_default(flag_key, self.get_integer_details(flag_key, context), default)
    }

    /// Resolve a float toggle, returning `default` on any error.
    pub fn get_float_value(
        &self,
        flag_key: &str,
        default: f64,
        context: &EvaluationContext,
    ) -> f64 {
        value_or_default(flag_key, self.get_float_details(flag_key, context), default)
    }

    /// Resolve an object toggle, returning `default` on any error.
    pub fn get_object_value(
        &self,
        flag_key: &str,
        default: Value,
        context: &EvaluationContext,
    ) -> Value {
        value_or_default(flag_key, self.get_object_details(flag_key, context), default)
    }

    /// Stop the telemetry thread, waiting for queued usage records to be posted.
    ///
    /// Dropping the client also stops the thread, but without waiting.
    pub fn shutdown(self) -> Result<()> {
        match self.telemetry {
            Some(telemetry) => telemetry.shutdown(),
            None => Ok(()),
        }
    }

    fn resolve<T>(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        expected: ToggleType,
        convert: impl FnOnce(&Value) -> Option<T>,
    ) -> Result<ResolutionDetails<T>> {
        let context = self.prepare_context(context);
        let response = self.gateway.evaluate(&context)?;

        let evaluation = response.get(flag_key).ok_or(Error::FlagNotFound)?;
        if let Some(error_message) = evaluation
            .error_message
            .as_ref()
            .filter(|message| !message.is_empty())
        {
            return Err(Error::FlagError(error_message.clone()));
        }
        if evaluation.toggle_type != expected {
            return Err(Error::TypeMismatch {
                expected: expected.as_str(),
                found: evaluation.toggle_type.as_str(),
            });
        }

        let value = convert(&evaluation.value).ok_or(Error::TypeMismatch {
            expected: expected.as_str(),
            found: json_kind(&evaluation.value),
        })?;

        let details = ResolutionDetails {
            flag_key: flag_key.to_owned(),
            value,
            variant: evaluation
                .variant
                .clone()
                .or_else(|| Some(value_to_text(&evaluation.value))),
            reason: evaluation
                .reason
                .clone()
                .unwrap_or_else(|| DEFAULT_REASON.to_owned()),
        };

        log::trace!(target: "hyphen",
                    flag_key,
                    targeting_key:display = context.targeting_key,
                    value:serde = evaluation.value;
                    "resolved a toggle");

        if let Some(telemetry) = &self.telemetry {
            telemetry.submit(TelemetryPayload::new(
                context,
                ToggleUsage {
                    key: flag_key.to_owned(),
                    value: evaluation.value.clone(),
                    toggle_type: Some(evaluation.toggle_type),
                    reason: Some(details.reason.clone()),
                    variant: details.variant.clone(),
                    error_message: None,
                },
            ));
        }

        Ok(details)
    }

    /// Fill in application, environment and targeting key.
    pub(crate) fn prepare_context(&self, context: &EvaluationContext) -> EvaluationContext {
        let mut prepared = context.clone();
        prepared.targeting_key = self.targeting_key(context);
        prepared.application = Some(self.application.clone());
        prepared.environment = Some(self.environment.clone());
        prepared
    }

    /// Targeting key of the context, else the user id, else a key derived from the context
    /// contents.
    fn targeting_key(&self, context: &EvaluationContext) -> String {
        if !context.targeting_key.is_empty() {
            return context.targeting_key.clone();
        }
        if let Some(user) = context.user.as_ref().filter(|user| !user.id.is_empty()) {
            return user.id.clone();
        }
        format!(
            "{}-{}-{}",
            self.application,
            self.environment,
            md5_hex(&context.to_wire_value())
        )
    }
}

fn value_or_default<T>(flag_key: &str, details: Result<ResolutionDetails<T>>, default: T) -> T {
    match details {
        Ok(details) => details.value,
        Err(err) => {
            log::warn!(target: "hyphen", flag_key; "failed to resolve toggle, returning default value: {:?}", err);
            default
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{fallback::tests::FakeTransport, User};

    fn client(transport: &FakeTransport) -> Client {
        ClientConfig::from_public_key("test-key")
            .application("test-app")
            .environment("test")
            .horizon_urls(["https://test.example.com"])
            .enable_toggle_usage(false)
            .transport(transport.clone())
            .to_client()
            .unwrap()
    }

    fn respond_with(toggles: serde_json::Value) -> FakeTransport {
        let transport = FakeTransport::default();
        transport.push(Ok(json!({ "toggles": toggles }).to_string()));
        transport
    }

    #[test]
    fn prepare_context_keeps_targeting_key() {
        let client = client(&FakeTransport::default());
        let context = client.prepare_context(&EvaluationContext::new("user1"));

        assert_eq!(context.targeting_key, "user1");
        assert_eq!(context.application.as_deref(), Some("test-app"));
        assert_eq!(context.environment.as_deref(), Some("test"));
    }

    #[test]
    fn targeting_key_falls_back_to_user_id() {
        let client = client(&FakeTransport::default());
        let context = EvaluationContext::default().with_user(User::new("user-42"));
        assert_eq!(client.prepare_context(&context).targeting_key, "user-42");
    }

    #[test]
    fn targeting_key_is_generated_when_missing() {
        let client = client(&FakeTransport::default());
        let context = EvaluationContext::default().with_attribute("plan", "pro");

        let first = client.prepare_context(&context).targeting_key;
        let second = client.prepare_context(&context).targeting_key;

        assert!(first.starts_with("test-app-test-"));
        assert_eq!(first, second);
    }

    #[test]
    fn resolves_boolean() {
        let transport = respond_with(json!({
            "test-flag": {"value": true, "type": "boolean", "reason": "STATIC"}
        }));
        let client = client(&transport);

        let details = client
            .get_boolean_details("test-flag", &EvaluationContext::new("user1"))
            .unwrap();

        assert!(details.value);
        assert_eq!(details.reason, "STATIC");
        assert_eq!(details.variant.as_deref(), Some("true"));

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].1["application"], "test-app");
        assert_eq!(requests[0].1["environment"], "test");
    }

    #[test]
    fn resolves_boolean_encoded_as_string() {
        let client = client(&respond_with(json!({
            "test-flag": {"value": "true", "type": "boolean"}
        })));

        let details = client
            .get_boolean_details("test-flag", &EvaluationContext::new("user1"))
            .unwrap();

        assert!(details.value);
        assert_eq!(details.reason, DEFAULT_REASON);
    }

    #[test]
    fn resolves_string_and_numbers() {
        let client = client(&respond_with(json!({
            "name": {"value": "test-value", "type": "string", "variant": "b"},
            "limit": {"value": 42, "type": "number"},
            "ratio": {"value": 0.75, "type": "number"}
        })));
        let context = EvaluationContext::new("user1");

        let name = client.get_string_details("name", &context).unwrap();
        assert_eq!(name.value, "test-value");
        assert_eq!(name.variant.as_deref(), Some("b"));

        assert_eq!(client.get_integer_details("limit", &context).unwrap().value, 42);
        assert_eq!(client.get_float_details("limit", &context).unwrap().value, 42.0);
        assert_eq!(client.get_integer_details("ratio", &context).unwrap().value, 0);
        assert_eq!(client.get_float_details("ratio", &context).unwrap().value, 0.75);
    }

    #[test]
    fn resolves_objects() {
        let client = client(&respond_with(json!({
            "plain": {"value": {"key": "value"}, "type": "object"},
            "encoded": {"value": "{\"key\": \"value\"}", "type": "object"},
            "broken": {"value": "{not json", "type": "object"}
        })));
        let context = EvaluationContext::new("user1");

        assert_eq!(
            client.get_object_details("plain", &context).unwrap().value,
            json!({"key": "value"})
        );
        assert_eq!(
            client.get_object_details("encoded", &context).unwrap().value,
            json!({"key": "value"})
        );
        assert!(matches!(
            client.get_object_details("broken", &context),
            Err(Error::ObjectParse(_))
        ));
        assert_eq!(
            client.get_object_value("broken", json!({}), &context),
            json!({})
        );
    }

    #[test]
    fn resolution_errors() {
        let client = client(&respond_with(json!({
            "text": {"value": "test", "type": "string"},
            "failing": {"value": true, "type": "boolean", "errorMessage": "Test error"}
        })));
        let context = EvaluationContext::new("user1");

        assert!(matches!(
            client.get_boolean_details("text", &context),
            Err(Error::TypeMismatch {
                expected: "boolean",
                found: "string"
            })
        ));
        assert!(matches!(
            client.get_boolean_details("missing", &context),
            Err(Error::FlagNotFound)
        ));
        assert!(matches!(
            client.get_boolean_details("failing", &context),
            Err(Error::FlagError(message)) if message == "Test error"
        ));
        assert!(client.get_boolean_value("failing", true, &context));
        assert_eq!(client.get_string_value("missing", "default", &context), "default");
    }

    #[test]
    fn empty_error_message_is_not_an_error() {
        let client = client(&respond_with(json!({
            "test-flag": {"value": "on", "type": "string", "errorMessage": ""}
        })));

        let details = client
            .get_string_details("test-flag", &EvaluationContext::new("user1"))
            .unwrap();
        assert_eq!(details.value, "on");
    }

    #[test]
    fn network_failure_returns_default() {
        // Both the override and the derived default endpoint fail.
        let transport = FakeTransport::default();
        let client = client(&transport);

        assert_eq!(
            client.get_integer_value("limit", 7, &EvaluationContext::new("user1")),
            7
        );
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let result = ClientConfig::from_public_key("test-key")
            .application("test-app")
            .environment("Production")
            .transport(FakeTransport::default())
            .to_client();
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        let result = ClientConfig::from_public_key("test-key")
            .application("test-app")
            .environment("test")
            .horizon_urls(["::not a url::"])
            .transport(FakeTransport::default())
            .to_client();
        assert!(matches!(result, Err(Error::InvalidBaseUrl(_))));
    }

    #[test]
    fn endpoint_list_ends_with_derived_default() {
        let client = client(&FakeTransport::default());
        let urls: Vec<&str> = client
            .gateway()
            .endpoints()
            .urls()
            .iter()
            .map(|url| url.as_str())
            .collect();
        assert_eq!(
            urls,
            ["https://test.example.com/", "https://toggle.hyphen.cloud/"]
        );
    }
}
