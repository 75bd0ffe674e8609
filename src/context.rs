//! Evaluation context and its wire rendering.
use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key-value attributes attached to a context or a user.
///
/// # Examples
/// ```
/// # use hyphen::{Attributes, AttributeValue};
/// let attributes = [
///     ("age".to_owned(), 30.0.into()),
///     ("is_premium_member".to_owned(), true.into()),
///     ("plan".to_owned(), "pro".into()),
/// ].into_iter().collect::<Attributes>();
/// ```
pub type Attributes = HashMap<String, AttributeValue>;

/// A single attribute value.
///
/// Attribute bags may nest, so lists and mappings are values too.
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// A numerical value.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// A list of values.
    List(Vec<AttributeValue>),
    /// A nested attribute mapping.
    Map(Attributes),
    /// A null value or absence of value.
    Null,
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl AttributeValue {
    /// Returns the string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        if let AttributeValue::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    fn to_wire_value(&self) -> Value {
        match self {
            AttributeValue::String(s) => Value::String(s.clone()),
            AttributeValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                // NaN and infinities have no JSON representation.
                .unwrap_or(Value::Null),
            AttributeValue::Boolean(b) => Value::Bool(*b),
            AttributeValue::List(items) => {
                Value::Array(items.iter().map(AttributeValue::to_wire_value).collect())
            }
            AttributeValue::Map(attributes) => Value::Object(camel_case_attributes(attributes)),
            AttributeValue::Null => Value::Null,
        }
    }
}

/// User record attached to an [`EvaluationContext`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    /// User id. Used as the targeting key when the context has none.
    pub id: String,
    /// User email.
    pub email: Option<String>,
    /// User display name.
    pub name: Option<String>,
    /// Free-form user attributes.
    pub custom_attributes: Attributes,
}

impl User {
    /// Create a user with the given id.
    pub fn new(id: impl Into<String>) -> User {
        User {
            id: id.into(),
            ..User::default()
        }
    }

    /// Set user email.
    pub fn with_email(mut self, email: impl Into<String>) -> User {
        self.email = Some(email.into());
        self
    }

    /// Set user display name.
    pub fn with_name(mut self, name: impl Into<String>) -> User {
        self.name = Some(name.into());
        self
    }

    /// Add a custom attribute.
    pub fn with_custom_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> User {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    fn to_wire_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_owned(), Value::String(self.id.clone()));
        if let Some(email) = &self.email {
            map.insert("email".to_owned(), Value::String(email.clone()));
        }
        if let Some(name) = &self.name {
            map.insert("name".to_owned(), Value::String(name.clone()));
        }
        if !self.custom_attributes.is_empty() {
            map.insert(
                "customAttributes".to_owned(),
                Value::Object(camel_case_attributes(&self.custom_attributes)),
            );
        }
        Value::Object(map)
    }
}

/// The targeting context flags are evaluated for.
///
/// `application` and `environment` are normally filled in by [`Client`](crate::Client) from its
/// configuration.
///
/// ```
/// # use hyphen::{EvaluationContext, User};
/// let context = EvaluationContext::new("user-1")
///     .with_ip_address("203.0.113.7")
///     .with_user(User::new("user-1").with_email("user@example.com"))
///     .with_attribute("plan", "pro");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    /// Identity the evaluation is partitioned by.
    pub targeting_key: String,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// User record.
    pub user: Option<User>,
    /// Custom attributes, sent as a nested `customAttributes` object.
    pub custom_attributes: Attributes,
    /// Generic attributes, flattened to the top level of the request.
    pub attributes: Attributes,
    /// Application id.
    pub application: Option<String>,
    /// Environment id.
    pub environment: Option<String>,
}

impl EvaluationContext {
    /// Create a context with the given targeting key.
    pub fn new(targeting_key: impl Into<String>) -> EvaluationContext {
        EvaluationContext {
            targeting_key: targeting_key.into(),
            ..EvaluationContext::default()
        }
    }

    /// Set IP address.
    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> EvaluationContext {
        self.ip_address = Some(ip_address.into());
        self
    }

    /// Set user record.
    pub fn with_user(mut self, user: User) -> EvaluationContext {
        self.user = Some(user);
        self
    }

    /// Add a custom attribute.
    pub fn with_custom_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> EvaluationContext {
        self.custom_attributes.insert(key.into(), value.into());
        self
    }

    /// Add a generic attribute.
    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> EvaluationContext {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Render the context the way the evaluation service expects it: camelCase keys, unset
    /// fields omitted and generic attributes flattened to the top level.
    pub fn to_wire_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "targetingKey".to_owned(),
            Value::String(self.targeting_key.clone()),
        );
        if let Some(ip_address) = &self.ip_address {
            map.insert("ipAddress".to_owned(), Value::String(ip_address.clone()));
        }
        if let Some(user) = &self.user {
            map.insert("user".to_owned(), user.to_wire_value());
        }
        if !self.custom_attributes.is_empty() {
            map.insert(
                "customAttributes".to_owned(),
                Value::Object(camel_case_attributes(&self.custom_attributes)),
            );
        }
        if let Some(application) = &self.application {
            map.insert("application".to_owned(), Value::String(application.clone()));
        }
        if let Some(environment) = &self.environment {
            map.insert("environment".to_owned(), Value::String(environment.clone()));
        }
        // Named fields take precedence over flattened attributes.
        for (key, value) in camel_case_attributes(&self.attributes) {
            map.entry(key).or_insert(value);
        }
        Value::Object(map)
    }
}

impl Serialize for EvaluationContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire_value().serialize(serializer)
    }
}

/// Convert `snake_case` to `camelCase`. Keys without underscores are returned unchanged.
pub(crate) fn to_camel_case(key: &str) -> String {
    let mut parts = key.split('_');
    let mut result = parts.next().unwrap_or_default().to_owned();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.push_str(&chars.as_str().to_lowercase());
        }
    }
    result
}

/// Render attributes with camelCased keys.
///
/// Keys are visited in sorted order so that two keys colliding after conversion always resolve
/// the same way.
fn camel_case_attributes(attributes: &Attributes) -> Map<String, Value> {
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort();

    let mut map = Map::new();
    for key in keys {
        map.entry(to_camel_case(key))
            .or_insert_with(|| attributes[key].to_wire_value());
    }
    map
}
