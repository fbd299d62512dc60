//! Per-request submission options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

// == Method ==
/// Request method; only read methods are eligible for caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// GET-like methods whose successful responses may be cached and shared.
    pub fn is_cacheable(self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

// == Submit Options ==
/// Options for one `Scheduler::submit` call.
///
/// Unset fields fall back to the scheduler's configuration.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub method: Method,
    /// Cache TTL for a successful result; `Some(ZERO)` disables caching
    pub ttl: Option<Duration>,
    pub max_retries: Option<u32>,
    /// Bound on the whole request measured from submission, queueing included
    pub deadline: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Never cache, whatever the scheduler default.
    pub fn no_cache(mut self) -> Self {
        self.ttl = Some(Duration::ZERO);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_and_display() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("PATCH".parse::<Method>(), Ok(Method::Patch));
        assert!("TRACE".parse::<Method>().is_err());
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_only_reads_are_cacheable() {
        assert!(Method::Get.is_cacheable());
        assert!(Method::Head.is_cacheable());
        assert!(!Method::Post.is_cacheable());
        assert!(!Method::Delete.is_cacheable());
    }

    #[test]
    fn test_builder() {
        let options = SubmitOptions::new()
            .method(Method::Put)
            .max_retries(0)
            .deadline(Duration::from_secs(3))
            .no_cache();
        assert_eq!(options.method, Method::Put);
        assert_eq!(options.max_retries, Some(0));
        assert_eq!(options.deadline, Some(Duration::from_secs(3)));
        assert_eq!(options.ttl, Some(Duration::ZERO));
        assert!(options.cancel.is_none());
    }
}
