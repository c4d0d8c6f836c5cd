//! Case-insensitive, multi-valued header storage.
//!
//! Request and response headers share one representation. Names keep the
//! casing they arrived (or were set) with, but every lookup ignores case.
//! Repeated names are allowed: `append` adds another entry, `insert`
//! replaces every existing entry of the same name.
//!
//! Storage is a `SmallVec` so the handful of headers a scoring request
//! typically carries never touches the heap.

use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

/// Number of headers stored inline before spilling to the heap.
pub const INLINE_HEADERS: usize = 12;

/// A header name-value pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    #[inline]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Check if name matches (case-insensitive)
    #[inline]
    pub fn name_eq(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Ordered header list with case-insensitive lookup.
///
/// # Example
///
/// ```rust
/// use scorehost_core::headers::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.append("Vary", "Accept");
/// headers.append("vary", "Origin");
/// headers.insert("Content-Type", "application/json");
///
/// assert_eq!(headers.get_all("VARY"), vec!["Accept", "Origin"]);
/// assert_eq!(headers.content_type(), Some("application/json"));
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    inner: SmallVec<[Header; INLINE_HEADERS]>,
}

impl HeaderMap {
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: SmallVec::new_const(),
        }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: SmallVec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// First value for `name` (case-insensitive).
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
    }

    /// Every value for `name`, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|h| h.name_eq(name))
            .map(|h| h.value.as_str())
            .collect()
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|h| h.name_eq(name))
    }

    /// Set a header, dropping every existing entry with the same name.
    ///
    /// The new entry takes the position of the first removed one so that
    /// replacing a header does not reorder the map.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.inner.iter().position(|h| h.name_eq(&name)) {
            Some(pos) => {
                self.inner[pos] = Header { name, value };
                let mut idx = pos + 1;
                while idx < self.inner.len() {
                    if self.inner[idx].name_eq(&self.inner[pos].name) {
                        self.inner.remove(idx);
                    } else {
                        idx += 1;
                    }
                }
            }
            None => self.inner.push(Header { name, value }),
        }
    }

    /// Add another entry, keeping any existing ones.
    #[inline]
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push(Header::new(name, value));
    }

    /// Remove all entries named `name`. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.inner.len();
        self.inner.retain(|h| !h.name_eq(name));
        before - self.inner.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    /// Collapse into one value per name, joining repeats with `", "`.
    ///
    /// Keys keep the casing of the first occurrence.
    pub fn to_flat_map(&self) -> HashMap<String, String> {
        let mut flat: HashMap<String, String> = HashMap::with_capacity(self.inner.len());
        let mut canonical: HashMap<String, String> = HashMap::new();

        for h in &self.inner {
            let key = canonical
                .entry(h.name.to_ascii_lowercase())
                .or_insert_with(|| h.name.clone())
                .clone();
            flat.entry(key)
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&h.value);
                })
                .or_insert_with(|| h.value.clone());
        }

        flat
    }

    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.get("Content-Type")
    }

    #[inline]
    pub fn set_content_type(&mut self, value: impl Into<String>) {
        self.insert("Content-Type", value);
    }
}

impl fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.inner.iter().map(|h| (&h.name, &h.value)))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: Into<String>,
    V: Into<String>,
{
    /// Collects with `append` semantics; repeated names are kept.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (min, _) = iter.size_hint();
        let mut map = HeaderMap::with_capacity(min);
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

impl IntoIterator for HeaderMap {
    type Item = (String, String);
    type IntoIter = std::iter::Map<
        smallvec::IntoIter<[Header; INLINE_HEADERS]>,
        fn(Header) -> (String, String),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter().map(|h| (h.name, h.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let mut headers = HeaderMap::new();
        headers.append("Content-Type", "application/json");

        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert!(headers.contains("Content-type"));
        assert_eq!(headers.get("Accept"), None);
    }

    #[test]
    fn test_append_keeps_duplicates() {
        let mut headers = HeaderMap::new();
        headers.append("Set-Cookie", "session=abc");
        headers.append("set-cookie", "user=123");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get_all("SET-COOKIE"), vec!["session=abc", "user=123"]);
    }

    #[test]
    fn test_insert_replaces_every_duplicate() {
        let mut headers = HeaderMap::new();
        headers.append("A", "1");
        headers.append("X-Run", "False");
        headers.append("B", "2");
        headers.append("x-run", "False");

        headers.insert("X-Run", "True");

        assert_eq!(headers.get_all("x-run"), vec!["True"]);
        let names: Vec<_> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["A", "X-Run", "B"]);
    }

    #[test]
    fn test_remove_counts() {
        let mut headers: HeaderMap = [("A", "1"), ("a", "2"), ("B", "3")].into_iter().collect();
        assert_eq!(headers.remove("A"), 2);
        assert_eq!(headers.remove("A"), 0);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_flat_map_joins_repeats() {
        let headers: HeaderMap = [
            ("Accept", "text/html"),
            ("X-Tag", "a"),
            ("x-tag", "b"),
        ]
        .into_iter()
        .collect();

        let flat = headers.to_flat_map();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat.get("X-Tag").map(String::as_str), Some("a, b"));
        assert_eq!(flat.get("Accept").map(String::as_str), Some("text/html"));
    }

    #[test]
    fn test_spills_past_inline_capacity() {
        let mut headers = HeaderMap::new();
        for i in 0..=INLINE_HEADERS {
            headers.append(format!("Header-{}", i), "v");
        }
        assert_eq!(headers.len(), INLINE_HEADERS + 1);
        assert!(headers.contains("header-12"));
    }
}
