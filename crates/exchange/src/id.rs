//! Exchange identification
//!
//! `ExchangeId` identifies one unit of work for logging and correlation.

use std::fmt;
use std::sync::Arc;

/// Unique exchange identifier
///
/// Backed by a shared string so clones are cheap: the id is copied into
/// log fields, correlation properties and sub-exchanges.
///
/// # Example
///
/// ```
/// use switchyard_exchange::ExchangeId;
///
/// let a = ExchangeId::generate();
/// let b = ExchangeId::generate();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeId(Arc<str>);

impl ExchangeId {
    /// Create an id from an existing string
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for ExchangeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let ids: std::collections::HashSet<_> = (0..100).map(|_| ExchangeId::generate()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_display_and_as_str() {
        let id = ExchangeId::new("ex-1");
        assert_eq!(id.as_str(), "ex-1");
        assert_eq!(id.to_string(), "ex-1");
    }
}
