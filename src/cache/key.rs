//! Cache key derivation.
//!
//! A key is method + normalized path by default. The query string and a
//! whitelisted set of request headers can be folded in through [`KeyPolicy`].

use std::fmt;

use crate::config::CacheConfig;
use crate::http::Request;

/// Which parts of a request, beyond method and path, distinguish responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPolicy {
    include_query: bool,
    /// Lower-cased, sorted, de-duplicated header names.
    vary_headers: Vec<String>,
}

impl KeyPolicy {
    pub fn new(include_query: bool, vary_headers: &[String]) -> Self {
        let mut vary_headers: Vec<String> =
            vary_headers.iter().map(|h| h.to_ascii_lowercase()).collect();
        vary_headers.sort();
        vary_headers.dedup();
        Self {
            include_query,
            vary_headers,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.include_query, &config.vary_headers)
    }
}

/// Identity of a cacheable request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: String,
    path: String,
    query: Option<String>,
    vary: Vec<(String, Option<String>)>,
}

impl CacheKey {
    /// Derive the key for `request`. Total and deterministic.
    pub fn derive(request: &Request, policy: &KeyPolicy) -> Self {
        let query = if policy.include_query {
            request.query().map(str::to_string)
        } else {
            None
        };
        let vary = policy
            .vary_headers
            .iter()
            .map(|name| (name.clone(), request.header(name).map(str::to_string)))
            .collect();

        Self {
            method: request.method().to_string(),
            path: normalize_path(request.path()),
            query,
            vary,
        }
    }

}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        for (name, value) in &self.vary {
            write!(f, " [{}={}]", name, value.as_deref().unwrap_or("-"))?;
        }
        Ok(())
    }
}

/// Collapse repeated slashes and drop a trailing slash (root excepted).
///
/// Targets not in origin form (`*`, absolute URLs) are left untouched.
fn normalize_path(path: &str) -> String {
    if !path.starts_with('/') {
        return path.to_string();
    }
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        out.push(c);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}
