//! Cooperative cancellation for long-running scans.

use crate::error::KvError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// The caller's execution context: a shared cancellation flag and an optional deadline.
///
/// Scans consult [`Context::err`] between successive steps; an in-flight engine call is never
/// interrupted. Clones observe the same cancellation flags, and a derived context is done
/// whenever any of its ancestors is.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Vec<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

/// Cancels every [`Context`] derived from the same [`Context::with_cancel`] call.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Returns a cancellable copy of this context and the handle that cancels it.
    #[must_use]
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut flags = self.cancelled.clone();
        flags.push(Arc::clone(&cancelled));
        (Self { cancelled: flags, deadline: self.deadline }, CancelHandle { cancelled })
    }

    /// Returns a copy of this context that expires after `timeout`.
    ///
    /// An earlier deadline already present on `self` is kept.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = self.deadline.map_or(deadline, |current| current.min(deadline));
        Self { cancelled: self.cancelled.clone(), deadline: Some(deadline) }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reports why the context is done, if it is.
    ///
    /// # Errors
    /// Returns [`KvError::Cancelled`] after [`CancelHandle::cancel`], or
    /// [`KvError::DeadlineExceeded`] once the deadline has passed.
    pub fn err(&self) -> Result<(), KvError> {
        if self.cancelled.iter().any(|flag| flag.load(Ordering::SeqCst)) {
            return Err(KvError::Cancelled { context: None });
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(KvError::DeadlineExceeded { context: None });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_never_expires() {
        assert!(Context::background().err().is_ok());
    }

    #[test]
    fn cancel_is_shared_by_clones() {
        let (ctx, handle) = Context::background().with_cancel();
        let clone = ctx.clone();
        assert!(ctx.err().is_ok());

        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(matches!(ctx.err(), Err(KvError::Cancelled { .. })));
        assert!(matches!(clone.err(), Err(KvError::Cancelled { .. })));
    }

    #[test]
    fn parent_cancel_reaches_children() {
        let (parent, handle) = Context::background().with_cancel();
        let (child, _child_handle) = parent.with_cancel();
        let timed = child.with_timeout(Duration::from_secs(60));

        handle.cancel();
        assert!(child.err().is_err());
        assert!(timed.err().is_err());
    }

    #[test]
    fn child_cancel_leaves_parent_running() {
        let (parent, _handle) = Context::background().with_cancel();
        let (child, child_handle) = parent.with_cancel();

        child_handle.cancel();
        assert!(child.err().is_err());
        assert!(parent.err().is_ok());
    }

    #[test]
    fn elapsed_deadline_reports_exceeded() {
        let ctx = Context::background().with_deadline(Instant::now());
        assert!(matches!(ctx.err(), Err(KvError::DeadlineExceeded { .. })));
    }

    #[test]
    fn earlier_deadline_wins() {
        let early = Instant::now() + Duration::from_secs(1);
        let ctx = Context::background().with_deadline(early).with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(early));
    }
}
