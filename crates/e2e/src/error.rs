//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Browser failed to launch: {0}")]
    BrowserLaunch(String),

    #[error("Browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("Browser session error: {0}")]
    Session(String),

    #[error("Application not reachable at {url} after {attempts} attempts")]
    AppUnreachable { url: String, attempts: usize },

    #[error("Login failed: {0}")]
    LoginFailed(Box<E2eError>),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No element matched {0}")]
    SelectorUnresolved(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Scenario panicked: {0}")]
    ScenarioPanicked(String),

    #[error("Scenario not found: {0}")]
    ScenarioNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl E2eError {
    /// True for failures caused by a bounded wait running out.
    pub fn is_timeout(&self) -> bool {
        match self {
            E2eError::Timeout(_) => true,
            E2eError::LoginFailed(inner) => inner.is_timeout(),
            _ => false,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_failure_reports_underlying_timeout() {
        let err = E2eError::LoginFailed(Box::new(E2eError::Timeout("text=Dashboard".into())));
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "Login failed: Timeout waiting for: text=Dashboard"
        );
    }

    #[test]
    fn assertion_failure_is_not_a_timeout() {
        assert!(!E2eError::AssertionFailed("row count".into()).is_timeout());
    }
}
