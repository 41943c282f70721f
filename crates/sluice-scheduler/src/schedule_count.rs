use std::sync::atomic::{AtomicUsize, Ordering};

/// Manages the rescheduling logic for a [`crate::Task`].
///
/// Ensures a task is only scheduled once at a time, which is required to
/// prevent multiple threads from working on the same task at once.
///
/// A count is required, rather than just a flag indicating whether the task
/// is scheduled, because of the race where:
/// 1. (thread 1) Doing work, sees input queue is empty.
/// 2. (thread 2) Add input to input queue.
/// 3. (thread 2) Set flag.
/// 4. (thread 1) Unset flag.
/// -> Task is not scheduled, even though it should be.
///
/// The count indicates whether the task was scheduled during execution, in
/// which case it is re-added to the queue after the work completes.
#[repr(transparent)]
#[derive(Debug, Default)]
pub(crate) struct ScheduleCount(AtomicUsize);

impl ScheduleCount {
    /// Record a request for scheduling.
    ///
    /// Returns true if this task wasn't previously scheduled.
    pub fn schedule(&self) -> bool {
        self.0.fetch_add(1, Ordering::SeqCst) == 0
    }

    /// Returns a guard which resets the count when the task finishes.
    pub fn guard(&self) -> ScheduleGuard<'_> {
        let entry_count = self.0.load(Ordering::SeqCst);
        debug_assert!(entry_count > 0, "Running task with entry count 0");
        ScheduleGuard {
            count: self,
            entry_count,
        }
    }
}

#[must_use]
pub(crate) struct ScheduleGuard<'a> {
    count: &'a ScheduleCount,
    entry_count: usize,
}

impl<'a> ScheduleGuard<'a> {
    /// Finish executing the task.
    ///
    /// Resets the entry count. If the count has been increased during
    /// execution this returns `true` to indicate the task should be
    /// re-scheduled.
    pub fn finish(self) -> bool {
        self.count.0.fetch_sub(self.entry_count, Ordering::SeqCst) != self.entry_count
    }
}
