//! Endpoint URI grammar
//!
//! `scheme:path?key1=val1&key2=val2`, with `scheme://path` accepted as an
//! alias. Parameter values are percent-decoded. The normalized form sorts
//! parameters so that equivalent URIs share one cached endpoint.

use std::collections::BTreeMap;
use std::fmt;

use crate::{EndpointError, EndpointParameters, Result};

#[cfg(test)]
#[path = "uri_test.rs"]
mod tests;

/// A parsed endpoint URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUri {
    raw: String,
    scheme: String,
    path: String,
    params: BTreeMap<String, String>,
}

impl EndpointUri {
    /// Parse an endpoint URI
    ///
    /// # Errors
    ///
    /// Returns `EndpointError::InvalidUri` for an empty URI, a missing or
    /// malformed scheme, an empty path, undecodable parameters or a
    /// parameter given twice.
    pub fn parse(uri: &str) -> Result<Self> {
        let raw = uri.trim();
        if raw.is_empty() {
            return Err(EndpointError::invalid_uri(uri, "empty uri"));
        }

        let (scheme, rest) = raw
            .split_once(':')
            .ok_or_else(|| EndpointError::invalid_uri(raw, "missing scheme"))?;
        if !is_valid_scheme(scheme) {
            return Err(EndpointError::invalid_uri(raw, format!("invalid scheme '{scheme}'")));
        }

        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        if path.is_empty() {
            return Err(EndpointError::invalid_uri(raw, "missing endpoint name"));
        }

        let mut params = BTreeMap::new();
        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode(raw, key)?;
            let value = decode(raw, value)?;
            if key.is_empty() {
                return Err(EndpointError::invalid_uri(raw, "empty parameter name"));
            }
            if params.insert(key.clone(), value).is_some() {
                return Err(EndpointError::invalid_uri(raw, format!("duplicate parameter '{key}'")));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme: scheme.to_ascii_lowercase(),
            path: path.to_string(),
            params,
        })
    }

    /// The URI as written
    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Lowercased scheme, used to pick the component
    #[inline]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Everything between the scheme and the query
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Decoded query parameters, sorted by name
    #[inline]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Look up one parameter
    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Canonical form: `scheme:path` plus sorted, re-encoded parameters
    pub fn normalized(&self) -> String {
        let mut out = format!("{}:{}", self.scheme, self.path);
        let mut sep = '?';
        for (key, value) in &self.params {
            out.push(sep);
            out.push_str(&urlencoding::encode(key));
            out.push('=');
            out.push_str(&urlencoding::encode(value));
            sep = '&';
        }
        out
    }

    /// Parameters as a consumable set for component configuration
    pub fn parameters(&self) -> EndpointParameters {
        EndpointParameters::new(self.normalized(), self.params.clone())
    }
}

impl fmt::Display for EndpointUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl std::str::FromStr for EndpointUri {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn decode(uri: &str, s: &str) -> Result<String> {
    urlencoding::decode(s)
        .map(|d| d.into_owned())
        .map_err(|_| EndpointError::invalid_uri(uri, format!("cannot decode '{s}'")))
}
