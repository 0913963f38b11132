//! Error types for fabric API calls
//!
//! The API reports failures as `{"error": <status>, "message": ...}`
//! bodies. "Not found" is a distinguished outcome: delete and read
//! paths translate it into "resource absent" instead of failing.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (connection, TLS, body decode)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Error reported by the fabric API
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A remote task reached the failed state
    #[error("task {id} failed: {message}")]
    TaskFailed { id: String, message: String },

    /// A resource is still transitioning toward its target state.
    /// Always transient; only ever surfaced wrapped in [`Error::Timeout`].
    #[error("not ready: {0}")]
    Pending(String),

    /// The overall deadline for an operation elapsed
    #[error("timed out after {waited:?}: {last}")]
    Timeout { waited: Duration, last: String },
}

impl Error {
    /// Whether this is the API's 404 shape, i.e. "resource absent"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { status: 404, .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_detection() {
        let err = Error::Api {
            status: 404,
            message: "no such pool".to_string(),
        };
        assert!(err.is_not_found());

        let err = Error::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn task_failure_carries_message() {
        let err = Error::TaskFailed {
            id: "t1".to_string(),
            message: "disk allocation error".to_string(),
        };
        assert!(err.to_string().contains("disk allocation error"));
    }
}
