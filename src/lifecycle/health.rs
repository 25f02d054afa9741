//! Health reporting

use serde::Serialize;
use std::fmt;

/// Outcome of a provider health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    /// Whether any backend configuration is active
    pub configured: bool,
    /// Name of the active configuration's link
    pub link: Option<String>,
    /// Whether the backend answered a ping
    pub reachable: bool,
    /// Failure detail when unreachable or unconfigured
    pub message: Option<String>,
}

impl HealthStatus {
    pub(crate) fn unconfigured() -> Self {
        Self {
            configured: false,
            link: None,
            reachable: false,
            message: Some("no backend configuration has been supplied".to_string()),
        }
    }

    pub(crate) fn healthy(link: &str) -> Self {
        Self {
            configured: true,
            link: Some(link.to_string()),
            reachable: true,
            message: None,
        }
    }

    pub(crate) fn unhealthy(link: &str, message: String) -> Self {
        Self {
            configured: true,
            link: Some(link.to_string()),
            reachable: false,
            message: Some(message),
        }
    }

    /// Configured and reachable
    pub fn is_healthy(&self) -> bool {
        self.configured && self.reachable
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.link, &self.message) {
            (Some(link), None) => write!(f, "provider healthy (link {})", link),
            (Some(link), Some(msg)) => write!(f, "provider unhealthy (link {}): {}", link, msg),
            (None, Some(msg)) => write!(f, "provider unconfigured: {}", msg),
            (None, None) => write!(f, "provider unconfigured"),
        }
    }
}
