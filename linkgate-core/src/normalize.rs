//! URL normalization.
//!
//! Trusted URLs are compared by a canonical key rather than by the raw
//! string an agent or a page hands us. Two URLs name the same trusted
//! resource iff their normalized keys are equal.
//!
//! The key has the shape `scheme://host[:port]path[?sorted-query]`:
//!
//! - the fragment is always dropped
//! - `utm_*` and known click-id parameters are stripped
//! - remaining query parameters are sorted by name
//! - the port is kept only when the parser reports one (default ports vanish)
//! - user info is never part of the key
//!
//! # Example
//!
//! ```rust
//! use linkgate_core::normalize::normalize_url;
//!
//! let a = normalize_url("https://Example.com/a?y=2&x=1&utm_source=feed#top", None).unwrap();
//! let b = normalize_url("https://example.com:443/a?x=1&y=2", None).unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.as_str(), "https://example.com/a?x=1&y=2");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

/// Query parameters removed during normalization, in addition to any
/// parameter whose name starts with `utm_`.
pub const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "msclkid", "mc_eid", "_ga"];

const TRACKING_PREFIX: &str = "utm_";

/// Reasons a string cannot be turned into a ledger key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// Input was empty or whitespace only.
    #[error("Empty URL")]
    Empty,

    /// Input (or the base it was resolved against) is not a parseable URL.
    #[error("Invalid URL format")]
    InvalidFormat,

    /// Only `http` and `https` URLs can be trusted.
    #[error("Unsupported scheme: {0}:")]
    UnsupportedScheme(String),
}

/// A canonical comparison key for a URL.
///
/// Only [`normalize_url`] produces these, so every value held by a ledger is
/// known to be a successfully normalized `http`/`https` URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    /// The normalized key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for NormalizedUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        normalize_url(&raw, None).map_err(serde::de::Error::custom)
    }
}

/// Returns true if a query parameter is a known tracking parameter.
pub fn is_tracking_param(name: &str) -> bool {
    name.starts_with(TRACKING_PREFIX) || TRACKING_PARAMS.contains(&name)
}

/// Normalize a URL into its ledger key.
///
/// Relative URLs are resolved against `base_url` when one is supplied.
/// This never panics; every failure is reported through [`NormalizeError`].
pub fn normalize_url(input: &str, base_url: Option<&str>) -> Result<NormalizedUrl, NormalizeError> {
    if input.trim().is_empty() {
        return Err(NormalizeError::Empty);
    }

    let url = parse(input, base_url).ok_or(NormalizeError::InvalidFormat)?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(NormalizeError::UnsupportedScheme(scheme.to_string()));
    }

    let host = url.host_str().ok_or(NormalizeError::InvalidFormat)?;

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    // Stable, so repeated names keep their relative order.
    params.sort_by(|a, b| a.0.cmp(&b.0));

    let mut key = format!("{}://{}", scheme, host);
    if let Some(port) = url.port() {
        key.push_str(&format!(":{}", port));
    }
    key.push_str(url.path());

    if !params.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        key.push('?');
        key.push_str(&query);
    }

    Ok(NormalizedUrl(key))
}

fn parse(input: &str, base_url: Option<&str>) -> Option<Url> {
    match base_url {
        Some(base) => Url::parse(base).ok()?.join(input).ok(),
        None => Url::parse(input).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(input: &str) -> String {
        normalize_url(input, None).unwrap().into_string()
    }

    // ===== Rejection Tests =====

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(normalize_url("", None), Err(NormalizeError::Empty));
        assert_eq!(normalize_url("   \t", None), Err(NormalizeError::Empty));
    }

    #[test]
    fn test_rejects_unparseable() {
        assert_eq!(
            normalize_url("not a url", None),
            Err(NormalizeError::InvalidFormat)
        );
        assert_eq!(
            normalize_url("/relative/only", None),
            Err(NormalizeError::InvalidFormat)
        );
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert_eq!(
            normalize_url("ftp://example.com/file", None),
            Err(NormalizeError::UnsupportedScheme("ftp".into()))
        );
        assert!(matches!(
            normalize_url("javascript:alert(1)", None),
            Err(NormalizeError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            normalize_url("file:///etc/passwd", None),
            Err(NormalizeError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(NormalizeError::Empty.to_string(), "Empty URL");
        assert_eq!(
            NormalizeError::UnsupportedScheme("data".into()).to_string(),
            "Unsupported scheme: data:"
        );
    }

    // ===== Canonical Form Tests =====

    #[test]
    fn test_drops_fragment() {
        assert_eq!(norm("https://example.com/page#section"), "https://example.com/page");
    }

    #[test]
    fn test_lowercases_host() {
        assert_eq!(norm("https://EXAMPLE.com/Path"), "https://example.com/Path");
    }

    #[test]
    fn test_default_port_dropped_custom_port_kept() {
        assert_eq!(norm("https://example.com:443/"), "https://example.com/");
        assert_eq!(norm("http://example.com:80/"), "http://example.com/");
        assert_eq!(norm("https://example.com:8443/x"), "https://example.com:8443/x");
    }

    #[test]
    fn test_root_path_is_explicit() {
        assert_eq!(norm("https://example.com"), "https://example.com/");
    }

    #[test]
    fn test_strips_tracking_params() {
        let out = norm("https://a.com/x?b=1&utm_source=y&utm_medium=z&fbclid=abc&gclid=1");
        assert_eq!(out, "https://a.com/x?b=1");
    }

    #[test]
    fn test_all_params_tracking_leaves_no_query() {
        assert_eq!(norm("https://a.com/x?utm_campaign=q&_ga=1"), "https://a.com/x");
    }

    #[test]
    fn test_sorts_query_params() {
        assert_eq!(
            norm("https://a.com?y=2&x=1"),
            norm("https://a.com?x=1&y=2")
        );
        assert_eq!(norm("https://a.com?y=2&x=1"), "https://a.com/?x=1&y=2");
    }

    #[test]
    fn test_repeated_params_keep_relative_order() {
        assert_eq!(norm("https://a.com/?b=2&a=9&b=1"), "https://a.com/?a=9&b=2&b=1");
    }

    #[test]
    fn test_drops_userinfo() {
        assert_eq!(norm("https://user:pw@example.com/a"), "https://example.com/a");
    }

    #[test]
    fn test_resolves_relative_against_base() {
        let out = normalize_url("../b?z=1", Some("https://example.com/dir/sub/page")).unwrap();
        assert_eq!(out.as_str(), "https://example.com/dir/b?z=1");
    }

    #[test]
    fn test_invalid_base_fails() {
        assert_eq!(
            normalize_url("/a", Some("not a base")),
            Err(NormalizeError::InvalidFormat)
        );
    }

    #[test]
    fn test_absolute_input_ignores_base() {
        let out = normalize_url("https://other.org/x", Some("https://example.com/")).unwrap();
        assert_eq!(out.as_str(), "https://other.org/x");
    }

    #[test]
    fn test_idempotent() {
        for input in [
            "https://a.com/x?b=1&utm_source=y",
            "https://example.com:8080/p/a t/h?q=hello world&a=%2F",
            "http://[::1]:3000/?z=&y=1#frag",
            "https://xn--nxasmq6b.com/ä?ü=1",
        ] {
            let once = normalize_url(input, None).unwrap();
            let twice = normalize_url(once.as_str(), None).unwrap();
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn test_is_tracking_param() {
        assert!(is_tracking_param("utm_content"));
        assert!(is_tracking_param("msclkid"));
        assert!(!is_tracking_param("utm"));
        assert!(!is_tracking_param("q"));
    }

    #[test]
    fn test_deserialize_normalizes() {
        let key: NormalizedUrl = serde_json::from_str("\"https://A.com/?b=1&a=2#x\"").unwrap();
        assert_eq!(key.as_str(), "https://a.com/?a=2&b=1");
        assert!(serde_json::from_str::<NormalizedUrl>("\"mailto:x@y.z\"").is_err());
    }
}
