//! Assertions that fail a scenario with `E2eError::AssertionFailed`

use std::time::Duration;

use crate::error::{E2eError, E2eResult};
use crate::locator::{Locator, WaitState};

/// Return `AssertionFailed` from the enclosing function unless `cond` holds.
#[macro_export]
macro_rules! ensure_that {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::error::E2eError::AssertionFailed(format!($($arg)+)));
        }
    };
}

/// Auto-waiting visibility assertion. A wait timeout becomes an assertion
/// failure naming `what`; other errors pass through.
pub async fn to_be_visible(locator: &Locator, what: &str, timeout: Duration) -> E2eResult<()> {
    to_be(locator, what, WaitState::Visible, timeout).await
}

pub async fn to_be_hidden(locator: &Locator, what: &str, timeout: Duration) -> E2eResult<()> {
    to_be(locator, what, WaitState::Hidden, timeout).await
}

async fn to_be(
    locator: &Locator,
    what: &str,
    state: WaitState,
    timeout: Duration,
) -> E2eResult<()> {
    locator
        .wait_for(state, timeout)
        .await
        .map_err(|e| as_assertion(e, what, state))
}

fn as_assertion(err: E2eError, what: &str, state: WaitState) -> E2eError {
    if err.is_timeout() {
        E2eError::AssertionFailed(format!("expected {} to be {}: {}", what, state, err))
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive(n: usize) -> E2eResult<()> {
        ensure_that!(n > 0, "expected rows, got {}", n);
        Ok(())
    }

    #[test]
    fn ensure_that_returns_assertion_failure() {
        assert!(positive(3).is_ok());
        match positive(0) {
            Err(E2eError::AssertionFailed(msg)) => assert_eq!(msg, "expected rows, got 0"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn timeouts_become_assertions_other_errors_pass_through() {
        let err = as_assertion(
            E2eError::Timeout("table to be visible".into()),
            "employee table",
            WaitState::Visible,
        );
        assert!(matches!(err, E2eError::AssertionFailed(ref m) if m.starts_with("expected employee table to be visible")));

        let err = as_assertion(E2eError::Session("gone".into()), "x", WaitState::Visible);
        assert!(matches!(err, E2eError::Session(_)));
    }
}
