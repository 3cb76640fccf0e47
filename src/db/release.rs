//! Closing handles without letting cleanup fail.
//!
//! [`release`] reports what happened; [`release_quietly`] logs failures and
//! moves on, which is what unwind paths want.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::cursor::Cursor;
use super::driver::{DatabaseConnection, Statement};
use super::error::{ReleaseError, ResourceKind};

/// A handle that can be closed once, consuming it
#[async_trait]
pub trait Release: Send + Sized {
    fn kind(&self) -> ResourceKind;

    async fn release(self) -> Result<(), ReleaseError>;
}

#[async_trait]
impl Release for Box<dyn DatabaseConnection> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Connection
    }

    async fn release(self) -> Result<(), ReleaseError> {
        let id = self.id();
        let result = self.close().await;
        debug!(connection = %id, ok = result.is_ok(), "connection closed");
        result
    }
}

#[async_trait]
impl Release for Box<dyn Statement> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Statement
    }

    async fn release(self) -> Result<(), ReleaseError> {
        self.close().await
    }
}

#[async_trait]
impl Release for Cursor {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Cursor
    }

    async fn release(self) -> Result<(), ReleaseError> {
        self.close();
        Ok(())
    }
}

/// What a release attempt did
#[derive(Debug)]
#[must_use]
pub enum ReleaseOutcome {
    /// There was no handle to close
    Skipped,
    Released(ResourceKind),
    Failed(ReleaseError),
}

impl ReleaseOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ReleaseOutcome::Failed(_))
    }

    /// Logs a failure and discards the outcome
    pub fn log(self) {
        if let ReleaseOutcome::Failed(err) = self {
            warn!(kind = %err.kind, "{}", err);
        }
    }
}

/// Closes the handle if there is one. Never panics and never returns an error.
pub async fn release<R: Release>(handle: Option<R>) -> ReleaseOutcome {
    let Some(handle) = handle else {
        return ReleaseOutcome::Skipped;
    };
    let kind = handle.kind();
    match handle.release().await {
        Ok(()) => ReleaseOutcome::Released(kind),
        Err(err) => ReleaseOutcome::Failed(err),
    }
}

/// Best-effort release: failures go to the log only.
pub async fn release_quietly<R: Release>(handle: Option<R>) {
    release(handle).await.log();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Flaky {
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Release for Flaky {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Statement
        }

        async fn release(self) -> Result<(), ReleaseError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ReleaseError::new(ResourceKind::Statement, "socket gone"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn none_is_skipped() {
        assert!(matches!(release(None::<Cursor>).await, ReleaseOutcome::Skipped));
    }

    #[tokio::test]
    async fn failure_is_reported_not_raised() {
        let closes = Arc::new(AtomicUsize::new(0));
        let outcome = release(Some(Flaky {
            closes: closes.clone(),
            fail: true,
        }))
        .await;
        assert!(outcome.is_failed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        outcome.log();
    }

    #[tokio::test]
    async fn success_closes_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let outcome = release(Some(Flaky {
            closes: closes.clone(),
            fail: false,
        }))
        .await;
        assert!(matches!(outcome, ReleaseOutcome::Released(ResourceKind::Statement)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
