//! Per-call context: resolved metadata plus caller deadline and cancellation

use crate::ArgoError;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::fmt;
use std::time::{Duration, Instant};

/// Receiving side of a cancellation signal.
///
/// Cancellation is signalled by disconnection: once the paired [`Canceller`]
/// is consumed or dropped, every clone of the signal observes it.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Receiver<()>,
}

/// Triggers the paired [`CancelSignal`]. Dropping it cancels as well.
#[derive(Debug)]
pub struct Canceller {
    _tx: Sender<()>,
}

impl Canceller {
    pub fn cancel(self) {}
}

/// Create a linked canceller / signal pair
pub fn cancel_pair() -> (Canceller, CancelSignal) {
    let (tx, rx) = crossbeam_channel::bounded(0);
    (Canceller { _tx: tx }, CancelSignal { rx })
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self {
            rx: crossbeam_channel::never(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Channel that becomes ready (disconnected) on cancellation, for `select!`
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

/// Bearer credential attached to live calls.
///
/// An empty token is treated as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthToken(Option<String>);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.is_empty() {
            Self(None)
        } else {
            Self(Some(raw))
        }
    }

    pub fn none() -> Self {
        Self(None)
    }

    /// Token from `ARGO_TOKEN`, absent when unset or empty
    pub fn resolve() -> Self {
        Self::new(std::env::var(crate::config::env::TOKEN).unwrap_or_default())
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Value for the `Authorization` header.
    ///
    /// Tokens that already name a scheme are sent as-is.
    pub fn header_value(&self) -> Option<String> {
        let token = self.0.as_deref()?;
        if token.starts_with("Bearer ") || token.starts_with("Basic ") {
            Some(token.to_string())
        } else {
            Some(format!("Bearer {}", token))
        }
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("AuthToken(<redacted>)"),
            None => f.write_str("AuthToken(None)"),
        }
    }
}

/// Context handed back by the client factory and passed to every
/// sub-service call, so calls never re-resolve credentials or namespace.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancelSignal,
    auth_token: AuthToken,
    namespace: String,
    instance_id: Option<String>,
}

impl CallContext {
    /// Empty context with no deadline and no cancellation
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_auth_token(mut self, token: AuthToken) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_instance_id(mut self, instance_id: Option<String>) -> Self {
        self.instance_id = instance_id;
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    pub fn auth_token(&self) -> &AuthToken {
        &self.auth_token
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    /// Time left before the deadline; zero once it has passed
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail fast if the caller already gave up
    pub fn check(&self) -> crate::Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ArgoError::Cancelled);
        }
        if self.remaining() == Some(Duration::ZERO) {
            return Err(ArgoError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_live() {
        let ctx = CallContext::background();
        assert!(ctx.check().is_ok());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_cancel_reaches_clones() {
        let (canceller, signal) = cancel_pair();
        let ctx = CallContext::background().with_cancel(signal);
        let copy = ctx.clone();
        assert!(ctx.check().is_ok());

        canceller.cancel();
        assert!(matches!(ctx.check(), Err(ArgoError::Cancelled)));
        assert!(matches!(copy.check(), Err(ArgoError::Cancelled)));
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = CallContext::background().with_deadline(Instant::now());
        assert!(matches!(ctx.check(), Err(ArgoError::DeadlineExceeded)));
    }

    #[test]
    fn test_deadline_only_tightens() {
        let soon = Instant::now() + Duration::from_secs(1);
        let later = soon + Duration::from_secs(60);
        let ctx = CallContext::background()
            .with_deadline(soon)
            .with_deadline(later);
        assert_eq!(ctx.deadline(), Some(soon));
    }

    #[test]
    fn test_auth_header_value() {
        assert_eq!(AuthToken::new("").header_value(), None);
        assert_eq!(
            AuthToken::new("abc123").header_value().as_deref(),
            Some("Bearer abc123")
        );
        assert_eq!(
            AuthToken::new("Bearer abc123").header_value().as_deref(),
            Some("Bearer abc123")
        );
        assert_eq!(
            format!("{:?}", AuthToken::new("secret")),
            "AuthToken(<redacted>)"
        );
    }
}
