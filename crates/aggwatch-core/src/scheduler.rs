//! Repeating task registry.
//!
//! Connector monitor ticks, keep-alive pings and the windowed alert check are
//! all "run this again later" loops. Rather than each one re-arming itself, they
//! are registered here as explicit tokio tasks so that a single
//! [`Scheduler::cancel_all`] stops every loop owned by a component.
//!
//! Registration spawns onto the current Tokio runtime, so it must be called from
//! within one.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Shortest period [`Scheduler::every`] runs at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Owns a set of repeating tasks that are cancelled together.
pub struct Scheduler {
    label: String,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancelled: AtomicBool,
}

impl Scheduler {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), tasks: Mutex::new(Vec::new()), cancelled: AtomicBool::new(false) }
    }

    /// Run `task` every `period`, first run one full period from now.
    ///
    /// A run that overruns the period delays the next one instead of bursting.
    /// A zero period is raised to [`MIN_PERIOD`].
    pub fn every<F, Fut>(&self, period: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        self.register(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task().await;
            }
        });
    }

    /// Run `task` repeatedly, sleeping a uniformly random delay in `[min, max]`
    /// before each run.
    pub fn every_jittered<F, Fut>(&self, min: Duration, max: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(async move {
            loop {
                tokio::time::sleep(jittered(min, max)).await;
                task().await;
            }
        });
    }

    /// Abort every registered task. Later registrations are ignored.
    pub fn cancel_all(&self) {
        self.cancelled.store(true, Ordering::Release);
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        if !tasks.is_empty() {
            debug!("[{}] cancelling {} task(s)", self.label, tasks.len());
        }
        for task in tasks {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Number of registered tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    fn register<Fut>(&self, fut: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        // Checked under the lock so a concurrent cancel_all cannot miss this task.
        if self.is_cancelled() {
            debug!("[{}] scheduler cancelled, task not registered", self.label);
            return;
        }
        tasks.retain(|t| !t.is_finished());
        tasks.push(tokio::spawn(fut));
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Uniform random duration in `[min, max]` at millisecond resolution.
fn jittered(min: Duration, max: Duration) -> Duration {
    let lo = min.as_millis() as u64;
    let hi = (max.as_millis() as u64).max(lo);
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn jitter_stays_in_range() {
        for _ in 0..100 {
            let d = jittered(Duration::from_secs(5), Duration::from_secs(10));
            assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(10));
        }
        assert_eq!(jittered(Duration::from_secs(3), Duration::from_secs(1)), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn every_repeats_until_cancelled() {
        let sched = Scheduler::new("test");
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        sched.every(Duration::from_millis(100), move || {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0, "first run waits one period");

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        sched.cancel_all();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(sched.active_tasks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_runs_at_min_period() {
        let sched = Scheduler::new("test");
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        sched.every(Duration::ZERO, move || {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let n = runs.load(Ordering::SeqCst);
        assert!((9..=10).contains(&n), "ran {n} times");
        sched.cancel_all();
    }

    #[tokio::test(start_paused = true)]
    async fn registration_after_cancel_is_ignored() {
        let sched = Scheduler::new("test");
        sched.cancel_all();
        sched.every_jittered(Duration::from_millis(1), Duration::from_millis(2), || async {});
        assert_eq!(sched.active_tasks(), 0);
        assert!(sched.is_cancelled());
    }
}
