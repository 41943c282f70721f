use std::sync::Arc;

use sluice_batch::Batch;

use crate::{Partition, Pipeline, PipelineError, Scheduler};

/// A struct used for sending batches to a specific input port of a down-stream pipeline.
#[derive(Debug)]
struct InputHandle {
    pipeline: Arc<dyn Pipeline>,
    input: usize,
}

/// The consumers a producing pipeline pushes its output to.
///
/// Most steps have a single consumer, but a step's output may be referenced
/// by multiple down-stream steps, in which case each batch is pushed (by
/// reference-counted clone) to every registered consumer.
#[derive(Debug, Default)]
pub struct InputHandles(smallvec::SmallVec<[InputHandle; 1]>);

impl InputHandles {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn add_consumer(&mut self, pipeline: Arc<dyn Pipeline>, input: usize) {
        self.0.push(InputHandle::new(pipeline, input));
    }

    pub fn push(
        &self,
        input_partition: Partition,
        batch: Batch,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        debug_assert!(!self.0.is_empty(), "Inputs should be non-empty when used.");

        for input in self.0.iter() {
            input.push(input_partition, batch.clone(), scheduler)?;
        }
        Ok(())
    }

    pub fn close(
        &self,
        input_partition: Partition,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        debug_assert!(!self.0.is_empty(), "Inputs should be non-empty when used.");

        for input in self.0.iter() {
            input.close(input_partition, scheduler)?;
        }
        Ok(())
    }
}

impl InputHandle {
    fn new(pipeline: Arc<dyn Pipeline>, input: usize) -> Self {
        Self { pipeline, input }
    }

    fn push(
        &self,
        input_partition: Partition,
        batch: Batch,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        self.pipeline
            .push(input_partition, self.input, batch, scheduler)
    }

    fn close(
        &self,
        input_partition: Partition,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        self.pipeline.close(input_partition, self.input, scheduler)
    }
}
