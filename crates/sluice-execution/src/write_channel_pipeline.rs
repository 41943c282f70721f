use std::sync::atomic::{AtomicUsize, Ordering};

use arrow_array::RecordBatch;
use error_stack::{IntoReport, ResultExt};
use parking_lot::Mutex;
use sluice_batch::Batch;
use sluice_scheduler::{Partition, Partitioned, Pipeline, PipelineError, Scheduler, TaskRef};

/// Pipeline writing the query output to a Tokio channel.
///
/// The sender is unbounded, so writes never block a worker thread. The
/// channel is dropped (ending the receiving stream) once every input
/// partition has closed.
#[derive(Debug)]
pub(super) struct WriteChannelPipeline {
    channel: Mutex<Option<tokio::sync::mpsc::UnboundedSender<RecordBatch>>>,
    open_inputs: AtomicUsize,
    tasks: Partitioned<TaskRef>,
}

impl WriteChannelPipeline {
    pub fn new(channel: tokio::sync::mpsc::UnboundedSender<RecordBatch>) -> Self {
        Self {
            channel: Mutex::new(Some(channel)),
            open_inputs: AtomicUsize::new(0),
            tasks: Partitioned::default(),
        }
    }
}

impl Pipeline for WriteChannelPipeline {
    fn initialize(&mut self, tasks: Partitioned<TaskRef>) {
        self.open_inputs.store(tasks.len(), Ordering::Release);
        self.tasks = tasks;
    }

    fn push(
        &self,
        input_partition: Partition,
        input: usize,
        batch: Batch,
        _scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        let channel = self.channel.lock();
        channel
            .as_ref()
            .ok_or(PipelineError::InputClosed {
                input,
                input_partition,
            })?
            .send(batch.into_record_batch())
            .into_report()
            .change_context(PipelineError::Execution)
    }

    fn close(
        &self,
        input_partition: Partition,
        input: usize,
        _scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        let open = self.open_inputs.fetch_sub(1, Ordering::AcqRel);
        error_stack::ensure!(
            open > 0,
            PipelineError::InputClosed {
                input,
                input_partition,
            },
        );
        self.tasks[input_partition].complete();
        if open == 1 {
            *self.channel.lock() = None;
        }
        Ok(())
    }

    fn do_work(
        &self,
        _partition: Partition,
        _scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        Ok(())
    }
}
