//! Requester and replier configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How a replier schedules handler invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// One request at a time, in arrival order, on the subscription task.
    #[default]
    Sequential,
    /// Every request on its own task. Replies may go out of order.
    Concurrent,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(format!("unknown dispatch mode: {other}")),
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Concurrent => f.write_str("concurrent"),
        }
    }
}

/// Configuration for a requester.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterConfig {
    /// Deadline applied when a caller passes no cancellation token.
    /// `None` waits for the reply indefinitely.
    pub request_timeout: Option<Duration>,
}

impl RequesterConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REQREP_REQUEST_TIMEOUT_MS`: default deadline in milliseconds
    ///   (default: unset, `0` also disables it)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            request_timeout: lookup("REQREP_REQUEST_TIMEOUT_MS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }

    /// Set the default deadline.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Configuration for a replier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplierConfig {
    /// Handler scheduling.
    pub dispatch: DispatchMode,
}

impl ReplierConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REQREP_DISPATCH`: `sequential` or `concurrent` (default: sequential)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            dispatch: lookup("REQREP_DISPATCH")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }

    /// Set the dispatch mode.
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }
}
