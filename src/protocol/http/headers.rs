//! Ordered, case-insensitive HTTP header collection

/// Well-known header names
pub mod names {
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const CONNECTION: &str = "Connection";
    pub const HOST: &str = "Host";
}

/// Content types used by HAP
pub mod content_types {
    /// Pairing bodies
    pub const PAIRING_TLV8: &str = "application/pairing+tlv8";
    /// Accessory database and characteristic bodies
    pub const HAP_JSON: &str = "application/hap+json";
    /// Camera snapshots
    pub const IMAGE_JPEG: &str = "image/jpeg";
}

/// HTTP header collection
///
/// Keeps insertion order so encoded responses are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
}

impl Headers {
    /// Create empty headers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing value with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self
            .inner
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            *slot = (name, value);
        } else {
            self.inner.push((name, value));
        }
    }

    /// Get header value (case-insensitive)
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if header exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get Content-Length value
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.get(names::CONTENT_LENGTH)?.trim().parse().ok()
    }

    /// Get Content-Type value
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get(names::CONTENT_TYPE)
    }

    /// Iterate over all headers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
