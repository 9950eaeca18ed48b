//! Cooperative process-wide shutdown
//!
//! A single write-once-visible flag. Loops check it with an acquire
//! load between events; no in-flight tick is ever preempted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle on the shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    flag: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Checked between events by every loop.
    #[inline(always)]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Route Ctrl-C to this flag. Failure to install the handler is
    /// logged, not fatal; shutdown then works via code only.
    pub fn install_ctrlc_handler(&self) {
        let flag = self.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            tracing::warn!("received interrupt, requesting shutdown");
            flag.request();
        }) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_clear() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_requested());
    }

    #[test]
    fn test_request_is_visible_to_clones() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        flag.request();
        assert!(clone.is_requested());
        // Idempotent.
        flag.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn test_visible_across_threads() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();
        let handle = std::thread::spawn(move || {
            while !clone.is_requested() {
                std::hint::spin_loop();
            }
            true
        });
        flag.request();
        assert!(handle.join().unwrap());
    }
}
