use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
    deadline: Option<Instant>,
}

/// Shared cancellation flag for a run.
///
/// Clones observe the same flag. A token may also carry a wall-clock
/// deadline, after which it reads as cancelled without an explicit
/// [`cancel`](Self::cancel).
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_deadline(after: Duration) -> Self {
        Self::build(Instant::now().checked_add(after))
    }

    fn build(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: Mutex::new(false),
                wake: Condvar::new(),
                deadline,
            }),
        }
    }

    /// Set the flag and wake every waiter.
    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let flagged = *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        flagged || self.deadline_passed()
    }

    fn deadline_passed(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Block for up to `timeout`. Returns `true` if the token was cancelled
    /// before or during the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let now = Instant::now();
        let mut until = now.checked_add(timeout).unwrap_or(now);
        if let Some(deadline) = self.inner.deadline {
            until = until.min(deadline);
        }

        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*cancelled {
            let now = Instant::now();
            if now >= until {
                break;
            }
            cancelled = self
                .inner
                .wake
                .wait_timeout(cancelled, until - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        let flagged = *cancelled;
        drop(cancelled);
        flagged || self.deadline_passed()
    }
}

/// Route Ctrl-C to `token`. A second Ctrl-C exits the process.
pub fn install_signal_handler(token: CancelToken) {
    let result = ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(1);
        }
        token.cancel();
        eprintln!("\ncancellation requested, stopping validations...");
    });
    if let Err(e) = result {
        warn!("failed to install signal handler: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn wait_times_out_without_cancel() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancel_wakes_a_waiter_early() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let cancelled = token.wait_timeout(Duration::from_secs(30));
                (cancelled, start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        let (cancelled, waited) = waiter.join().unwrap();
        assert!(cancelled);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn deadline_reads_as_cancelled() {
        let token = CancelToken::with_deadline(Duration::from_millis(10));
        assert!(token.wait_timeout(Duration::from_secs(30)));
        assert!(token.is_cancelled());
    }
}
