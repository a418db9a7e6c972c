//! Cooperative cancellation (spec.md §5): an opaque token operations can
//! observe at a checkpoint (a header-walk iteration, a write-loop entry
//! boundary, a file open) and trip from another thread or call site.
//!
//! Same shared-flag shape as `source.rs`'s busy latch: an `Arc<AtomicBool>`
//! rather than a channel or a `std::sync::atomic`-wrapped enum, since the
//! only two states that matter are "keep going" and "stop at the next
//! checkpoint".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable handle that can be tripped to request cancellation of any
/// operation observing it. Cloning shares the same underlying flag; the
/// default token is never cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Reports whether `cancel` has been called on this token or any clone
    /// of it.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_observable_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
