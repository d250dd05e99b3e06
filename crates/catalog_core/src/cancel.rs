//! Cooperative cancellation for blocking core calls.
//!
//! # Responsibility
//! - Let callers abort an in-flight call or bound it with a deadline.
//!
//! # Invariants
//! - Once fired, a signal stays fired.
//! - Core operations only observe the signal between steps; a step already
//!   handed to SQLite or the filesystem runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Clonable cancellation signal shared between a caller and core calls.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    flag: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    /// A signal that fires when [`CancelSignal::cancel`] is called on any clone.
    pub fn new() -> Self {
        Self {
            flag: Some(Arc::new(AtomicBool::new(false))),
            deadline: None,
        }
    }

    /// A signal that also fires once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_at(Instant::now() + timeout)
    }

    /// Adds (or tightens) a deadline on this signal.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn cancel(&self) {
        if let Some(flag) = &self.flag {
            flag.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        let flagged = self
            .flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst));
        flagged || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Returns `Err(Cancelled)` naming `operation` when the signal has fired.
    pub fn check(&self, operation: &'static str) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled { operation });
        }
        Ok(())
    }
}

/// Marker error produced by [`CancelSignal::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled {
    pub operation: &'static str,
}

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} cancelled by caller", self.operation)
    }
}

impl std::error::Error for Cancelled {}
