//! Cache key derivation for evaluation contexts.
use serde_json::Value;

use crate::EvaluationContext;

/// Maps an evaluation context to the key its evaluation response is cached under.
///
/// Implementations must be deterministic: equal contexts must always produce equal keys.
///
/// Closures are accepted as generators, which is the usual way to override the default:
/// ```
/// # use hyphen::{CacheKeyGenerator, EvaluationContext};
/// let by_user = |context: &EvaluationContext| context.targeting_key.clone();
/// assert_eq!(by_user.generate(&EvaluationContext::new("user1")), "user1");
/// ```
pub trait CacheKeyGenerator {
    /// Generate the cache key for `context`.
    fn generate(&self, context: &EvaluationContext) -> String;
}

impl<T: Fn(&EvaluationContext) -> String> CacheKeyGenerator for T {
    fn generate(&self, context: &EvaluationContext) -> String {
        self(context)
    }
}

/// The default generator: MD5 over the canonical JSON rendering of the context.
///
/// Canonical JSON has object keys sorted at every level, so the key does not depend on attribute
/// insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5CacheKeyGenerator;

impl CacheKeyGenerator for Md5CacheKeyGenerator {
    fn generate(&self, context: &EvaluationContext) -> String {
        md5_hex(&context.to_wire_value())
    }
}

/// Hex-encoded MD5 digest of the canonical rendering of `value`.
pub(crate) fn md5_hex(value: &Value) -> String {
    let mut ctx = md5::Context::new();
    write_canonical(&mut ctx, value);
    format!("{:x}", ctx.compute())
}

fn write_canonical(ctx: &mut md5::Context, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            ctx.consume(b"{");
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    ctx.consume(b",");
                }
                write_scalar(ctx, &Value::String(key.clone()));
                ctx.consume(b":");
                write_canonical(ctx, value);
            }
            ctx.consume(b"}");
        }
        Value::Array(items) => {
            ctx.consume(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    ctx.consume(b",");
                }
                write_canonical(ctx, item);
            }
            ctx.consume(b"]");
        }
        scalar => write_scalar(ctx, scalar),
    }
}

fn write_scalar(ctx: &mut md5::Context, value: &Value) {
    // Display of a scalar `Value` is its compact JSON form, with strings quoted and escaped.
    ctx.consume(value.to_string().as_bytes());
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{AttributeValue, User};

    #[test]
    fn key_is_32_hex_chars() {
        let key = Md5CacheKeyGenerator.generate(&EvaluationContext::new("user1"));
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn equal_contexts_produce_equal_keys() {
        let make = || {
            EvaluationContext::new("user1")
                .with_user(User::new("user1").with_email("a@example.com"))
                .with_attribute("plan", "pro")
                .with_attribute("seats", 12.0)
                .with_attribute(
                    "nested",
                    AttributeValue::Map(
                        [
                            ("a".to_owned(), 1.0.into()),
                            ("b".to_owned(), AttributeValue::List(vec!["x".into()])),
                        ]
                        .into_iter()
                        .collect(),
                    ),
                )
        };
        assert_eq!(
            Md5CacheKeyGenerator.generate(&make()),
            Md5CacheKeyGenerator.generate(&make())
        );
    }

    #[test]
    fn key_does_not_depend_on_insertion_order() {
        let a = EvaluationContext::new("user1")
            .with_attribute("first", "1")
            .with_attribute("second", "2");
        let b = EvaluationContext::new("user1")
            .with_attribute("second", "2")
            .with_attribute("first", "1");
        assert_eq!(
            Md5CacheKeyGenerator.generate(&a),
            Md5CacheKeyGenerator.generate(&b)
        );
    }

    #[test]
    fn different_targeting_keys_produce_different_keys() {
        assert_ne!(
            Md5CacheKeyGenerator.generate(&EvaluationContext::new("user1")),
            Md5CacheKeyGenerator.generate(&EvaluationContext::new("user2"))
        );
    }

    #[test]
    fn attributes_change_the_key() {
        let plain = EvaluationContext::new("user1");
        let with_attribute = EvaluationContext::new("user1").with_attribute("custom_field", "value");
        let other_value = EvaluationContext::new("user1").with_attribute("custom_field", "other");

        let keys = [&plain, &with_attribute, &other_value].map(|c| Md5CacheKeyGenerator.generate(c));
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
    }

    #[test]
    fn custom_generator_overrides_default() {
        let generator = |context: &EvaluationContext| context.targeting_key.clone();
        let context = EvaluationContext::new("user1").with_attribute("ignored", "value");
        assert_eq!(generator.generate(&context), "user1");
    }

    #[test]
    fn canonical_hash_ignores_object_key_order() {
        let mut a = serde_json::Map::new();
        a.insert("z".to_owned(), json!(1));
        a.insert("a".to_owned(), json!({"y": true, "b": null}));
        let b = json!({"a": {"b": null, "y": true}, "z": 1});
        assert_eq!(md5_hex(&Value::Object(a)), md5_hex(&b));
    }
}
