//! Progress reporting and cancellation for long-running stages.
//!
//! # Example
//!
//! ```
//! use pointmesh::progress::{Progress, ProgressCallback};
//!
//! let callback: ProgressCallback = Box::new(|progress: &Progress| {
//!     eprintln!("{}% {}", progress.percent(), progress.message);
//!     true // return false to cancel
//! });
//! # let _ = callback;
//! ```

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Progress information passed to callbacks.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Current step (0-based).
    pub current: u64,

    /// Total number of steps.
    pub total: u64,

    /// Human-readable message describing current operation.
    pub message: String,

    /// Elapsed time since operation started.
    pub elapsed: Duration,

    /// Estimated time remaining (if available).
    pub estimated_remaining: Option<Duration>,
}

impl Progress {
    /// Create a new progress report.
    pub fn new(current: u64, total: u64, message: impl Into<String>) -> Self {
        Self {
            current,
            total,
            message: message.into(),
            elapsed: Duration::ZERO,
            estimated_remaining: None,
        }
    }

    /// Get progress as a fraction (0.0 to 1.0).
    #[inline]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64) / (self.total as f64)
        }
    }

    /// Get progress as a percentage (0 to 100).
    #[inline]
    pub fn percent(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }

    /// Check if the operation is complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

/// Callback function for progress reporting.
///
/// Returns `true` to continue, `false` to request cancellation.
pub type ProgressCallback = Box<dyn Fn(&Progress) -> bool + Send + Sync>;

/// Progress and cancellation state for one triangulation run.
///
/// The triangulator sets the count of settled points before each expansion
/// and asks [`maybe_callback`](Self::maybe_callback) whether to go on. The
/// callback is throttled to at most once per `callback_interval`, and a
/// cancellation it requests is remembered for the rest of the run.
#[derive(Debug)]
pub struct ProgressTracker {
    current: AtomicU64,
    total: u64,
    cancelled: AtomicBool,
    start_time: Instant,
    last_callback_time: Mutex<Option<Instant>>,
    callback_interval: Duration,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new(total: u64) -> Self {
        Self::with_interval(total, Duration::from_millis(100))
    }

    /// Create a tracker with custom callback interval.
    pub fn with_interval(total: u64, interval: Duration) -> Self {
        Self {
            current: AtomicU64::new(0),
            total,
            cancelled: AtomicBool::new(false),
            start_time: Instant::now(),
            last_callback_time: Mutex::new(None),
            callback_interval: interval,
        }
    }

    /// Set the current progress value.
    #[inline]
    pub fn set(&self, value: u64) {
        self.current.store(value, Ordering::Relaxed);
    }

    /// Get the current progress value.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    /// Check if cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Get elapsed time.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Estimate remaining time based on current progress.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let current = self.current();
        if current == 0 {
            return None;
        }

        let rate = current as f64 / self.elapsed().as_secs_f64();
        if rate > 0.0 && rate.is_finite() {
            let remaining = self.total.saturating_sub(current) as f64 / rate;
            Some(Duration::from_secs_f64(remaining))
        } else {
            None
        }
    }

    /// Create a Progress snapshot.
    pub fn snapshot(&self, message: impl Into<String>) -> Progress {
        Progress {
            current: self.current(),
            total: self.total,
            message: message.into(),
            elapsed: self.elapsed(),
            estimated_remaining: self.estimated_remaining(),
        }
    }

    /// Call the callback if enough time has passed since the last call.
    /// The first call always goes through.
    ///
    /// Returns `false` if the callback requested cancellation.
    pub fn maybe_callback(
        &self,
        callback: Option<&ProgressCallback>,
        message: impl Into<String>,
    ) -> bool {
        if self.is_cancelled() {
            return false;
        }

        let Some(callback) = callback else {
            return true;
        };

        let now = Instant::now();
        {
            let mut last = self
                .last_callback_time
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(previous) = *last {
                if now.duration_since(previous) < self.callback_interval {
                    return true;
                }
            }
            *last = Some(now);
        }

        let should_continue = callback(&self.snapshot(message));
        if !should_continue {
            self.cancel();
        }
        should_continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_progress_fraction() {
        let p = Progress::new(25, 100, "test");
        assert!((p.fraction() - 0.25).abs() < 1e-10);
        assert_eq!(p.percent(), 25);
    }

    #[test]
    fn test_progress_zero_total() {
        let p = Progress::new(0, 0, "empty");
        assert_eq!(p.fraction(), 0.0);
        assert!(p.is_complete());
    }

    #[test]
    fn test_progress_tracker() {
        let tracker = ProgressTracker::new(10);
        assert_eq!(tracker.current(), 0);
        tracker.set(7);
        let snap = tracker.snapshot("halfway");
        assert_eq!(snap.current, 7);
        assert_eq!(snap.total, 10);
        assert_eq!(snap.message, "halfway");
    }

    #[test]
    fn test_first_callback_always_fires() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let callback: ProgressCallback = Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        });

        let tracker = ProgressTracker::with_interval(5, Duration::from_secs(3600));
        assert!(tracker.maybe_callback(Some(&callback), "first"));
        assert!(tracker.maybe_callback(Some(&callback), "throttled"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_cancellation_sticks() {
        let callback: ProgressCallback = Box::new(|_| false);
        let tracker = ProgressTracker::with_interval(5, Duration::ZERO);
        assert!(!tracker.maybe_callback(Some(&callback), "stop"));
        assert!(tracker.is_cancelled());
        assert!(!tracker.maybe_callback(None, "after"));
    }

    #[test]
    fn test_no_callback_continues() {
        let tracker = ProgressTracker::new(1);
        assert!(tracker.maybe_callback(None, "nothing"));
    }
}
