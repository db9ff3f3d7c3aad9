//! Single-flight guard for vehicle-facing operations
//!
//! The vehicle backend rejects overlapping requests, so at most one command
//! or status refresh may be in flight at a time. Acquisition never waits: a
//! second caller is turned away and should report "busy, try later".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide try-acquire lock
#[derive(Debug, Clone, Default)]
pub struct CommandGuard {
    busy: Arc<AtomicBool>,
}

impl CommandGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard if it is free
    ///
    /// Returns `None` when another operation holds it. The returned permit
    /// releases the guard when dropped.
    pub fn try_acquire(&self) -> Option<CommandPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CommandPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of holding the [`CommandGuard`]
#[derive(Debug)]
#[must_use = "the guard is released as soon as the permit is dropped"]
pub struct CommandPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for CommandPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_second_acquire_is_rejected() {
        let guard = CommandGuard::new();
        let permit = guard.try_acquire();
        assert!(permit.is_some());
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());
    }

    #[test]
    fn test_release_on_drop() {
        let guard = CommandGuard::new();
        {
            let _permit = guard.try_acquire().unwrap();
        }
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_release_on_error_path() {
        fn failing(guard: &CommandGuard) -> Result<(), String> {
            let _permit = guard.try_acquire().ok_or("busy")?;
            Err("vehicle said no".to_string())
        }

        let guard = CommandGuard::new();
        assert_eq!(failing(&guard), Err("vehicle said no".to_string()));
        assert!(!guard.is_busy());
    }

    #[test]
    fn test_clones_share_state() {
        let guard = CommandGuard::new();
        let other = guard.clone();
        let _permit = guard.try_acquire().unwrap();
        assert!(other.is_busy());
        assert!(other.try_acquire().is_none());
    }

    #[test]
    fn test_concurrent_acquire_exactly_one_wins() {
        for _ in 0..50 {
            let guard = CommandGuard::new();
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let guard = guard.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        guard.try_acquire()
                    })
                })
                .collect();

            let permits: Vec<Option<CommandPermit>> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(permits.iter().filter(|p| p.is_some()).count(), 1);

            drop(permits);
            assert!(guard.try_acquire().is_some());
        }
    }
}
