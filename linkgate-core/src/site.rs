//! Same-site comparison.
//!
//! Used to check that metadata a page declares about itself (a canonical
//! link, an `og:url`) points at the same registrable domain as the page's
//! real URL before anything derived from it is trusted.

use url::Url;

/// Resolves a hostname to its registrable domain (eTLD+1).
///
/// The public suffix data lives outside this crate. Returning `None` means
/// the host has no registrable domain (an IP address, a bare suffix) and the
/// comparison fails closed.
///
/// Any `Fn(&str) -> Option<String>` is a resolver:
///
/// ```rust
/// use linkgate_core::site::same_site;
///
/// let last_two = |host: &str| {
///     let labels: Vec<&str> = host.rsplitn(3, '.').collect();
///     (labels.len() >= 2).then(|| format!("{}.{}", labels[1], labels[0]))
/// };
///
/// assert!(same_site("https://www.news.example/a", "https://news.example/b", &last_two));
/// assert!(!same_site("https://news.example/a", "https://evil.example/a", &last_two));
/// ```
pub trait DomainResolver {
    /// The registrable domain for `host`, if it has one.
    fn registrable_domain(&self, host: &str) -> Option<String>;
}

impl<F> DomainResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn registrable_domain(&self, host: &str) -> Option<String> {
        self(host)
    }
}

/// Returns true if both URLs resolve to the same registrable domain.
///
/// Fails closed: a parse failure, a missing host, or a host the resolver
/// cannot map all return `false`.
pub fn same_site(url_a: &str, url_b: &str, resolver: &dyn DomainResolver) -> bool {
    match (registrable_domain(url_a, resolver), registrable_domain(url_b, resolver)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn registrable_domain(raw: &str, resolver: &dyn DomainResolver) -> Option<String> {
    let parsed = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            log::error!("same_site: cannot parse {:?}: {}", raw, e);
            return None;
        }
    };
    let host = parsed.host_str()?;
    resolver.registrable_domain(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_two_labels(host: &str) -> Option<String> {
        if host.parse::<std::net::IpAddr>().is_ok() || host.starts_with('[') {
            return None;
        }
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() < 2 {
            return None;
        }
        Some(labels[labels.len() - 2..].join("."))
    }

    #[test]
    fn test_same_registrable_domain() {
        assert!(same_site(
            "https://www.example.com/article",
            "https://m.example.com/article?amp=1",
            &last_two_labels
        ));
    }

    #[test]
    fn test_scheme_and_port_ignored() {
        assert!(same_site(
            "http://example.com:8080/",
            "https://example.com/",
            &last_two_labels
        ));
    }

    #[test]
    fn test_different_domains() {
        assert!(!same_site(
            "https://example.com/",
            "https://example.org/",
            &last_two_labels
        ));
    }

    #[test]
    fn test_parse_failure_fails_closed() {
        assert!(!same_site("not a url", "https://example.com/", &last_two_labels));
        assert!(!same_site("https://example.com/", "", &last_two_labels));
    }

    #[test]
    fn test_unresolvable_host_fails_closed() {
        assert!(!same_site(
            "http://127.0.0.1/",
            "http://127.0.0.1/other",
            &last_two_labels
        ));
    }

    #[test]
    fn test_hostless_url_fails_closed() {
        assert!(!same_site("data:text/plain,hi", "data:text/plain,hi", &last_two_labels));
    }
}
