use std::sync::Arc;

use error_stack::ResultExt;

use crate::pending::PendingPartition;
use crate::schedule_count::ScheduleCount;
use crate::{Error, Partition, Pipeline, Scheduler};

/// The unit of work executed by the scheduler.
///
/// A task processes a single unit of input (typically a batch), applies a
/// single [`Pipeline`] partition and produces a single unit of output
/// (typically a batch).
pub struct Task {
    /// Name of the pipeline implementation.
    name: &'static str,
    /// The pipeline to execute.
    ///
    /// This is a weak reference to avoid cycles.
    pipeline: std::sync::Weak<dyn Pipeline>,
    /// Entry tracking this partition in the pending set.
    pending: PendingPartition,
    /// An atomic counter tracking how many times the task has been submitted.
    ///
    /// This is reset after the task is executed.
    schedule_count: ScheduleCount,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "partition {} of pipeline '{}' ({})",
            self.pending.partition, self.name, self.pending.pipeline_index
        )
    }
}

impl Task {
    pub(crate) fn new(
        name: &'static str,
        pipeline: std::sync::Weak<dyn Pipeline>,
        pending: PendingPartition,
    ) -> Self {
        Self {
            name,
            pipeline,
            pending,
            schedule_count: ScheduleCount::default(),
        }
    }

    /// The partition this task executes.
    pub fn partition(&self) -> Partition {
        self.pending.partition
    }

    /// Mark this task's partition as completed.
    ///
    /// Workers shut down once every partition of every pipeline completes.
    pub fn complete(&self) {
        self.pending.complete()
    }

    /// Return true if this task's partition has completed.
    pub fn is_complete(&self) -> bool {
        self.pending.is_complete()
    }

    /// Record a request for scheduling.
    ///
    /// Returns true if this task wasn't previously scheduled.
    ///
    /// Generally should only be called by the worker.
    pub(crate) fn schedule(&self) -> bool {
        self.schedule_count.schedule()
    }

    fn pipeline(&self) -> error_stack::Result<Arc<dyn Pipeline>, Error> {
        Ok(self.pipeline.upgrade().ok_or(Error::PipelineDropped {
            index: self.pending.pipeline_index,
            name: self.name,
            partition: self.pending.partition,
        })?)
    }

    fn error(&self, method: &'static str) -> Error {
        Error::Pipeline {
            method,
            index: self.pending.pipeline_index,
            name: self.name,
            partition: self.pending.partition,
        }
    }

    #[inline]
    pub(crate) fn do_work(
        &self,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<bool, Error> {
        let guard = self.schedule_count.guard();
        self.pipeline()?
            .do_work(self.pending.partition, scheduler)
            .change_context_lazy(|| self.error("do_work"))?;
        Ok(guard.finish())
    }
}

pub type TaskRef = Arc<Task>;
