// ============================================================
// Layer 6 — Shutdown Token
// ============================================================
// Explicit cancellation handle passed into the training loop and
// observed at batch/epoch boundaries. Cloning shares the flag, so
// a signal handler can hold one clone while the loop holds
// another. No process-wide mutable state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    stop: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the holder of this token to stop after its current step.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let token = ShutdownToken::new();
        let observer = token.clone();
        assert!(!observer.is_stop_requested());
        token.request_stop();
        assert!(observer.is_stop_requested());
    }
}
