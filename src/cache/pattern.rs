//! Key patterns used to invalidate a family of cache entries at once.

use regex::Regex;

// == Key Pattern ==
/// Selects cache keys for invalidation.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Exactly this key
    Exact(String),
    /// Every key starting with this prefix
    Prefix(String),
    /// Every key the expression matches anywhere
    Regex(Regex),
}

impl KeyPattern {
    /// Compiles `pattern` as a regular expression.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(KeyPattern::Regex)
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyPattern::Prefix(prefix.into())
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => key == exact,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(key: &str) -> Self {
        KeyPattern::Exact(key.to_string())
    }
}

impl From<String> for KeyPattern {
    fn from(key: String) -> Self {
        KeyPattern::Exact(key)
    }
}

impl From<Regex> for KeyPattern {
    fn from(re: Regex) -> Self {
        KeyPattern::Regex(re)
    }
}
