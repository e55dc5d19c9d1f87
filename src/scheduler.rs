//! Timer scheduling for reconnect backoff.
//!
//! The registry never sleeps inline; it hands delayed work to a
//! [`ReconnectScheduler`] and keeps the returned [`TimerHandle`] so the
//! timer can be cancelled when the channel is torn down. Production
//! uses [`ThreadScheduler`]; tests use [`ManualScheduler`] to fire
//! timers deterministically and to assert on scheduled delays.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A delayed task, boxed so schedulers can store it.
pub type TimerTask = Box<dyn FnOnce() + Send>;

/// Handle to a scheduled timer. Cancellation is best-effort: a
/// cancelled timer's task never runs, even if the deadline has passed.
#[derive(Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn new() -> Self {
        TimerHandle {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Schedules a task to run once after a delay.
pub trait ReconnectScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Thread-backed scheduler: one short-lived thread per pending timer.
///
/// Reconnect timers are rare (one per failing channel, bounded by the
/// attempt cap), so a thread per timer is acceptable.
pub struct ThreadScheduler;

impl ReconnectScheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let handle = TimerHandle::new();
        let guard = handle.clone();
        std::thread::spawn(move || {
            // crossbeam `after` rather than sleep so the wait shares the
            // channel machinery used elsewhere in the crate.
            let _ = crossbeam_channel::after(delay).recv();
            if !guard.is_cancelled() {
                task();
            }
        });
        handle
    }
}

/// Deterministic scheduler for tests: tasks are queued, never run until
/// explicitly fired, and scheduled delays are recorded.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<(Duration, TimerTask, TimerHandle)>>,
    delays: Mutex<Vec<Duration>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks still eligible to fire. Cancelled tasks
    /// are not counted even before they are discarded.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .iter()
            .filter(|(_, _, handle)| !handle.is_cancelled())
            .count()
    }

    /// Delays of all tasks scheduled so far, in scheduling order,
    /// including ones already fired.
    pub fn scheduled_delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Fire the oldest queued task. Cancelled tasks are discarded
    /// without running. Returns true if a task ran.
    pub fn fire_next(&self) -> bool {
        loop {
            let entry = {
                let mut pending = self.pending.lock();
                if pending.is_empty() {
                    return false;
                }
                pending.remove(0)
            };
            let (_, task, handle) = entry;
            if handle.is_cancelled() {
                continue;
            }
            task();
            return true;
        }
    }

    /// Fire every queued task in order (including tasks queued while
    /// firing). Returns the number of tasks that ran.
    pub fn fire_all(&self) -> usize {
        let mut fired = 0;
        while self.fire_next() {
            fired += 1;
        }
        fired
    }
}

impl ReconnectScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let handle = TimerHandle::new();
        self.delays.lock().push(delay);
        self.pending.lock().push((delay, task, handle.clone()));
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn manual_scheduler_fires_in_order() {
        let sched = ManualScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            sched.schedule(
                Duration::from_secs(i),
                Box::new(move || order.lock().push(i)),
            );
        }

        assert_eq!(sched.fire_all(), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let sched = ManualScheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran2 = ran.clone();

        let handle = sched.schedule(
            Duration::from_secs(1),
            Box::new(move || {
                ran2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.cancel();

        assert_eq!(sched.fire_all(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_task_is_not_pending() {
        let sched = ManualScheduler::new();
        let handle = sched.schedule(Duration::from_secs(1), Box::new(|| {}));
        sched.schedule(Duration::from_secs(2), Box::new(|| {}));

        assert_eq!(sched.pending_count(), 2);
        handle.cancel();
        assert_eq!(sched.pending_count(), 1);
    }

    #[test]
    fn thread_scheduler_runs_task() {
        let sched = ThreadScheduler;
        let (tx, rx) = crossbeam_channel::bounded(1);
        sched.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }
}
