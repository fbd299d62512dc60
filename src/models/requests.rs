//! Request DTOs for the gateway's cache-control API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

use crate::cache::KeyPattern;

/// Request body for POST /cache/invalidate
///
/// Exactly one of the fields must be set.
///
/// # Fields
/// - `key`: A single cache key, e.g. `GET:/users/1`
/// - `prefix`: Every key starting with this prefix
/// - `pattern`: Every key matching this regular expression
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

impl InvalidateRequest {
    /// Converts the request into a key pattern.
    ///
    /// Returns an error message if validation fails.
    pub fn into_pattern(self) -> Result<KeyPattern, String> {
        match (self.key, self.prefix, self.pattern) {
            (Some(key), None, None) if !key.is_empty() => Ok(KeyPattern::Exact(key)),
            (None, Some(prefix), None) if !prefix.is_empty() => Ok(KeyPattern::Prefix(prefix)),
            (None, None, Some(pattern)) => {
                KeyPattern::regex(&pattern).map_err(|e| format!("Invalid pattern: {}", e))
            }
            (None, None, None) => Err("One of key, prefix or pattern is required".to_string()),
            _ => Err("Exactly one non-empty key, prefix or pattern is required".to_string()),
        }
    }
}
