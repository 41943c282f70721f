use std::borrow::Cow;

use sluice_batch::Batch;

use crate::{Partition, Partitioned, Scheduler, TaskRef};

#[derive(derive_more::Display, Debug)]
pub enum PipelineError {
    #[display(fmt = "invalid input index {input} for pipeline with {input_len} inputs")]
    InvalidInput { input: usize, input_len: usize },
    #[display(fmt = "input {input} for partition {input_partition} is already closed")]
    InputClosed {
        input: usize,
        input_partition: Partition,
    },
    #[display(fmt = "illegal state: {_0}")]
    IllegalState(Cow<'static, str>),
    #[display(fmt = "error executing pipeline")]
    Execution,
}

impl PipelineError {
    pub fn illegal_state(state: impl Into<Cow<'static, str>>) -> Self {
        Self::IllegalState(state.into())
    }
}

impl error_stack::Context for PipelineError {}

/// A push-based interface used by the scheduler to drive query execution.
///
/// A pipeline processes data from one or more input partitions, producing
/// output to one or more consuming pipelines. As a [`Pipeline`] may draw on
/// input from more than one upstream [`Pipeline`], input partitions are
/// identified by both an input index and a partition index.
///
/// Whether computation is eagerly done on push, or deferred to a scheduled
/// task, is intentionally left as an implementation detail of the pipeline.
/// A cheap operation (sending to a channel, appending to a shared buffer)
/// may happen directly in [`Pipeline::push`]; anything heavier should be
/// queued and performed in [`Pipeline::do_work`] on a worker thread.
pub trait Pipeline: Send + Sync + std::fmt::Debug {
    /// Provide the tasks for executing this pipeline's partitions.
    ///
    /// Called exactly once, before execution starts.
    fn initialize(&mut self, tasks: Partitioned<TaskRef>);

    /// Push a [`Batch`] to the given input partition.
    ///
    /// This is called from outside the pipeline -- either the driving thread
    /// feeding a source or a producing pipeline. It may be invoked
    /// concurrently by however many worker threads service the upstream.
    fn push(
        &self,
        input_partition: Partition,
        input: usize,
        batch: Batch,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError>;

    /// Mark an input partition as exhausted.
    ///
    /// The scheduler guarantees this is called exactly once per input
    /// partition, after every push to that partition has returned.
    fn close(
        &self,
        input_partition: Partition,
        input: usize,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError>;

    /// Run the pipeline on the data that has been pushed in.
    ///
    /// Generally this should return after processing / producing a single
    /// batch, rescheduling itself if additional work remains.
    fn do_work(
        &self,
        partition: Partition,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError>;
}
