//! Horizon endpoint list and URL helpers.
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use url::Url;

use crate::{Error, Result};

/// Used when no organization can be derived from the public key.
pub const DEFAULT_HORIZON_URL: &str = "https://toggle.hyphen.cloud";

const HORIZON_DOMAIN: &str = "toggle.hyphen.cloud";
const PUBLIC_KEY_PREFIX: &str = "public_";
const ORG_ID_PREFIX: &str = "org_";

fn org_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+$").expect("org id pattern should be valid")
    })
}

/// Extract the organization id embedded in a public key.
///
/// A public key is `public_` followed by base64 of `<org id>:<secret>`; the org id may carry an
/// `org_` prefix, which is stripped. Returns `None` if the key does not have this shape or the id
/// contains characters outside `[A-Za-z0-9_-]`.
pub fn org_id_from_public_key(public_key: &str) -> Option<String> {
    let encoded = public_key.strip_prefix(PUBLIC_KEY_PREFIX)?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let org_id = decoded.split(':').next()?;
    let org_id = org_id.strip_prefix(ORG_ID_PREFIX).unwrap_or(org_id);

    org_id_pattern().is_match(org_id).then(|| org_id.to_owned())
}

/// Build the organization-specific horizon URL for `public_key`, falling back to
/// [`DEFAULT_HORIZON_URL`].
pub fn default_horizon_url(public_key: &str) -> String {
    match org_id_from_public_key(public_key) {
        Some(org_id) => format!("https://{org_id}.{HORIZON_DOMAIN}"),
        None => DEFAULT_HORIZON_URL.to_owned(),
    }
}

/// Join `path` onto `base`, keeping any path segments `base` already has.
///
/// Exactly one `/` separates the two parts, regardless of trailing or leading slashes.
///
/// ```
/// # use url::Url;
/// # use hyphen::build_url;
/// let base = Url::parse("https://example.com/base/").unwrap();
/// assert_eq!(build_url(&base, "/path").as_str(), "https://example.com/base/path");
/// ```
pub fn build_url(base: &Url, path: &str) -> Url {
    let base_path = base.path().trim_end_matches('/');
    let path = path.trim_start_matches('/');

    let mut url = base.clone();
    url.set_path(&format!("{base_path}/{path}"));
    url
}

/// An ordered, non-empty list of horizon base URLs.
///
/// Caller-supplied URLs come first, in the order given; the URL derived from the public key is
/// always last.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointList {
    urls: Vec<Url>,
}

impl EndpointList {
    /// Build the endpoint list from override URLs and the public key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBaseUrl`] if any override URL fails to parse.
    pub fn new<S: AsRef<str>>(overrides: &[S], public_key: &str) -> Result<EndpointList> {
        let mut urls = overrides
            .iter()
            .map(|url| Url::parse(url.as_ref()).map_err(Error::InvalidBaseUrl))
            .collect::<Result<Vec<_>>>()?;

        urls.push(Url::parse(&default_horizon_url(public_key)).map_err(Error::InvalidBaseUrl)?);

        Ok(EndpointList { urls })
    }

    /// Build an endpoint list from already-parsed URLs, without appending a derived default.
    pub fn from_urls(urls: Vec<Url>) -> EndpointList {
        EndpointList { urls }
    }

    /// The URLs in the order they are tried.
    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    /// The last-resort URL.
    pub fn default_url(&self) -> Option<&Url> {
        self.urls.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public_key(raw: &str) -> String {
        format!("{PUBLIC_KEY_PREFIX}{}", STANDARD.encode(raw))
    }

    #[test]
    fn org_id_with_org_prefix() {
        assert_eq!(
            org_id_from_public_key(&public_key("org_test:key")),
            Some("test".to_owned())
        );
    }

    #[test]
    fn org_id_without_org_prefix() {
        assert_eq!(
            org_id_from_public_key(&public_key("test:key")),
            Some("test".to_owned())
        );
    }

    #[test]
    fn org_id_rejects_malformed_keys() {
        assert_eq!(org_id_from_public_key("invalid_key"), None);
        assert_eq!(org_id_from_public_key("public_invalid"), None);
        assert_eq!(org_id_from_public_key(&public_key("invalid@org:key")), None);
        assert_eq!(org_id_from_public_key(&public_key(":key")), None);
    }

    #[test]
    fn org_id_pattern_is_compiled_once() {
        assert!(std::ptr::eq(org_id_pattern(), org_id_pattern()));
        assert_eq!(
            org_id_from_public_key(&public_key("acme-1:key")),
            Some("acme-1".to_owned())
        );
        assert_eq!(org_id_from_public_key(&public_key("acme 1:key")), None);
    }

    #[test]
    fn default_url_uses_org_id() {
        assert_eq!(
            default_horizon_url(&public_key("test:key")),
            "https://test.toggle.hyphen.cloud"
        );
        assert_eq!(default_horizon_url("invalid_key"), DEFAULT_HORIZON_URL);
    }

    #[test]
    fn build_url_joins_paths() {
        let cases = [
            ("https://example.com/base", "/path", "https://example.com/base/path"),
            ("https://example.com", "/path", "https://example.com/path"),
            ("https://example.com/base/", "/path", "https://example.com/base/path"),
            ("https://example.com/base", "path", "https://example.com/base/path"),
            ("https://example.com/", "toggle/evaluate", "https://example.com/toggle/evaluate"),
            ("https://example.com/a/b//", "//c", "https://example.com/a/b/c"),
        ];
        for (base, path, expected) in cases {
            let base = Url::parse(base).unwrap();
            assert_eq!(build_url(&base, path).as_str(), expected, "{base} + {path}");
        }
    }

    #[test]
    fn derived_url_is_last() {
        let endpoints = EndpointList::new(
            &["https://one.example.com", "https://two.example.com"],
            &public_key("acme:key"),
        )
        .unwrap();

        let urls: Vec<&str> = endpoints.urls().iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            [
                "https://one.example.com/",
                "https://two.example.com/",
                "https://acme.toggle.hyphen.cloud/"
            ]
        );
    }

    #[test]
    fn no_overrides_still_has_default() {
        let endpoints = EndpointList::new::<&str>(&[], "test-key").unwrap();
        assert_eq!(endpoints.urls().len(), 1);
        assert_eq!(
            endpoints.default_url().map(Url::as_str),
            Some("https://toggle.hyphen.cloud/")
        );
    }

    #[test]
    fn rejects_unparsable_override() {
        assert!(matches!(
            EndpointList::new(&["not a url"], "test-key"),
            Err(Error::InvalidBaseUrl(_))
        ));
    }
}
