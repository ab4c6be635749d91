use std::borrow::Cow;
use std::time::Duration;

use thiserror::Error;

use crate::types::Side;

/// Boxed driver error attached to connectivity failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type returned by index comparisons.
#[derive(Debug, Error)]
pub enum CompareError {
    /// A required endpoint or setting is missing or malformed.
    #[error("configuration error: {message}")]
    Configuration { message: Cow<'static, str> },

    /// Opening a connection or one of the enumeration round trips failed.
    #[error("{side} database unreachable while {operation}: {message}")]
    Connectivity {
        side: Side,
        operation: Cow<'static, str>,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The run was interrupted before both snapshots were collected.
    #[error("comparison cancelled")]
    Cancelled,
}

impl CompareError {
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wrap an underlying driver error as a connectivity failure.
    pub fn connectivity<E>(side: Side, operation: impl Into<Cow<'static, str>>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connectivity {
            side,
            operation: operation.into(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn timeout(side: Side, operation: impl Into<Cow<'static, str>>, limit: Duration) -> Self {
        Self::Connectivity {
            side,
            operation: operation.into(),
            message: format!("timed out after {}ms", limit.as_millis()),
            source: None,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Side the failure originated from, when it belongs to one.
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Connectivity { side, .. } => Some(*side),
            _ => None,
        }
    }
}

pub type CompareResult<T> = Result<T, CompareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_connectivity() {
        let err = CompareError::timeout(Side::Target, "listing indexes on users", Duration::from_secs(2));
        assert!(err.is_connectivity());
        assert_eq!(err.side(), Some(Side::Target));
        assert_eq!(
            err.to_string(),
            "target database unreachable while listing indexes on users: timed out after 2000ms"
        );
    }

    #[test]
    fn test_connectivity_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = CompareError::connectivity(Side::Source, "connecting", io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_configuration_message() {
        let err = CompareError::configuration("source url is not set");
        assert!(err.is_configuration());
        assert_eq!(err.side(), None);
        assert_eq!(err.to_string(), "configuration error: source url is not set");
    }
}
