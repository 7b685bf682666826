//! Canonical serialization of connection parameters
//!
//! Identity strings must be deterministic, so parameters are kept sorted by
//! key. Secrets are replaced by a short digest so identities can be logged.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::{DbPoolError, Result};

/// Sorted key/value parameters of a backend connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalParams {
    params: BTreeMap<String, String>,
}

impl CanonicalParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a secret parameter as its fingerprint. Empty secrets are skipped.
    pub fn insert_secret(&mut self, key: impl Into<String>, secret: &str) -> &mut Self {
        if !secret.is_empty() {
            self.params.insert(key.into(), fingerprint(secret));
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `key=value` pairs joined by `sep`, in key order
    pub fn join(&self, sep: &str) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(sep)
    }

    /// libpq keyword/value form: backslashes and single quotes are
    /// backslash-escaped, and empty values or values containing whitespace
    /// are wrapped in single quotes.
    pub fn to_keyword_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={}", quote_keyword_value(v)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CanonicalParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn quote_keyword_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        format!("'{escaped}'")
    } else {
        escaped
    }
}

/// Digest of a secret, safe to log: `sha256:` followed by the first eight
/// bytes of the SHA-256 digest in hex.
pub fn fingerprint(secret: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, secret.as_bytes());
    format!("sha256:{}", hex::encode(&digest.as_ref()[..8]))
}

/// Percent-encode a URL userinfo component (user name or password)
pub fn encode_userinfo(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Parse a duration such as `90s`, `1m30s`, `250ms` or `2h`.
///
/// A bare integer is read as seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DbPoolError::Configuration("empty duration".into()));
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(input)
        .map_err(|e| DbPoolError::Configuration(format!("invalid duration {input:?}: {e}")))
}
