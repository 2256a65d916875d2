//! Ordered, case-insensitive header map shared by requests and responses.

use std::fmt;

/// Ordered header collection with case-insensitive name lookup.
///
/// Names are unique ignoring ASCII case. [`Headers::append`] folds a repeated
/// name into the existing entry (`"a, b"`), keeping the first spelling and
/// position; [`Headers::set`] replaces the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Add a value, combining with an existing field of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => {
                let existing = &mut self.entries[i].1;
                existing.push_str(", ");
                existing.push_str(&value);
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Set a value, replacing any existing field of the same name in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// RFC 9110 `tchar`: the bytes allowed in methods and header names.
pub fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// A header value is wire-safe when it holds no control characters other
/// than horizontal tab.
pub fn is_valid_value(value: &str) -> bool {
    value.bytes().all(|b| b == b'\t' || (b >= 0x20 && b != 0x7f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(headers.get("content-length").is_none());
    }

    #[test]
    fn append_combines_duplicates_in_first_position() {
        let headers: Headers = [("Accept", "a"), ("Host", "x"), ("accept", "b")]
            .into_iter()
            .collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Accept"), Some("a, b"));
        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Accept", "Host"]);
    }

    #[test]
    fn set_replaces_and_remove_deletes() {
        let mut headers = Headers::new();
        headers.set("X-Mode", "one");
        headers.set("x-mode", "two");
        assert_eq!(headers.get("X-Mode"), Some("two"));
        assert_eq!(headers.remove("X-MODE"), Some("two".to_string()));
        assert!(headers.is_empty());
    }

    #[test]
    fn token_and_value_checks() {
        assert!("Content-Type".bytes().all(is_token_byte));
        assert!(!"Bad Name".bytes().all(is_token_byte));
        assert!(is_valid_value("text/html; charset=utf-8"));
        assert!(!is_valid_value("evil\r\nSet-Cookie: x"));
    }
}
