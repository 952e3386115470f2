use async_trait::async_trait;
use tracing::warn;

use crate::error::AuthError;

/// Surfaces a failed login attempt to the user. The login loop retries only
/// after this resolves, so the implementation decides how long to hold off.
#[async_trait]
pub trait FailureNotifier: Send + Sync {
    /// Returns `true` when the user acknowledged the failure and the login
    /// should be attempted again; `false` ends the login with `err`.
    async fn authentication_failed(&self, err: &AuthError) -> bool;
}

/// Logs the failure and acknowledges immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl FailureNotifier for TracingNotifier {
    async fn authentication_failed(&self, err: &AuthError) -> bool {
        warn!(target: "gallery_auth::session", "Authentication failed: {}", err);
        true
    }
}

/// Prints the failure on stderr and waits for the user to press Enter.
/// Closed or unreadable stdin counts as no acknowledgment.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinNotifier;

/// Whether a `read_line` outcome is an acknowledgment. `Ok(0)` is end of input.
fn acknowledged(read: &std::io::Result<usize>) -> bool { matches!(read, Ok(n) if *n > 0) }

#[async_trait]
impl FailureNotifier for StdinNotifier {
    async fn authentication_failed(&self, err: &AuthError) -> bool {
        eprintln!("Authentication failed ({}). Press Enter to retry.", err.message());
        let read = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)
        })
        .await;
        match read {
            Ok(read) if acknowledged(&read) => true,
            _ => {
                warn!(target: "gallery_auth::session", "no acknowledgment on stdin; giving up login");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn end_of_input_is_not_an_acknowledgment() {
        assert!(acknowledged(&Ok(1)));
        assert!(!acknowledged(&Ok(0)));
        assert!(!acknowledged(&Err(Error::new(ErrorKind::Other, "closed"))));
    }

    #[tokio::test]
    async fn tracing_notifier_always_retries() {
        assert!(TracingNotifier.authentication_failed(&AuthError::malformed("m", "x")).await);
    }
}
