use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use error_stack::ResultExt;
use itertools::Itertools;
use parking_lot::Mutex;
use sluice_batch::Batch;
use sluice_physical::{Step, StepId, StepKind};
use sluice_scheduler::{
    InputHandles, Partition, Partitioned, Pipeline, PipelineError, Scheduler, TaskRef,
};

use crate::transform::Transform;

/// Runs a linear sequence of transforms as a pipeline.
pub struct TransformPipeline {
    /// The state for each partition.
    partitions: Partitioned<TransformPartition>,
    transforms: Vec<Box<dyn Transform>>,
    /// Consumers for the down-stream computation.
    consumers: InputHandles,
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field(
                "transforms",
                &self.transforms.iter().map(|t| t.name()).format(","),
            )
            .finish()
    }
}

struct TransformPartition {
    /// Whether this partition is closed.
    is_closed: AtomicBool,
    /// Inputs for this partition.
    inputs: Mutex<VecDeque<Batch>>,
    /// Task for this partition.
    task: TaskRef,
}

impl TransformPartition {
    fn close_input(&self) {
        self.is_closed.store(true, Ordering::Release);
    }

    fn is_input_closed(&self) -> bool {
        self.is_closed.load(Ordering::Acquire)
    }

    fn is_input_empty(&self) -> bool {
        self.inputs.lock().is_empty()
    }

    fn add_input(&self, batch: Batch) {
        self.inputs.lock().push_back(batch);
    }

    fn pop_input(&self) -> Option<Batch> {
        self.inputs.lock().pop_front()
    }
}

#[derive(derive_more::Display, Debug)]
pub enum Error {
    #[display(fmt = "transforms should accept exactly 1 input, but length for '{kind}' was {len}")]
    TooManyInputs { kind: &'static str, len: usize },
    #[display(fmt = "invalid transform: expected input {expected} but was {actual}")]
    UnexpectedInput { expected: StepId, actual: StepId },
    #[display(fmt = "step '{kind}' is not supported as a transform")]
    UnsupportedStepKind { kind: &'static str },
    #[display(fmt = "failed to create transform for step '{kind}'")]
    CreatingTransform { kind: &'static str },
}

impl error_stack::Context for Error {}

impl TransformPipeline {
    pub fn try_new<'a>(
        input_step: &Step,
        steps: impl Iterator<Item = &'a Step> + ExactSizeIterator,
        consumers: InputHandles,
    ) -> error_stack::Result<Self, Error> {
        let mut input_step = input_step;
        let mut transforms = Vec::with_capacity(steps.len());
        for step in steps {
            error_stack::ensure!(
                step.inputs.len() == 1,
                Error::TooManyInputs {
                    kind: step.kind.label(),
                    len: step.inputs.len()
                }
            );
            error_stack::ensure!(
                step.inputs[0] == input_step.id,
                Error::UnexpectedInput {
                    expected: input_step.id,
                    actual: step.inputs[0]
                }
            );

            let transform: Box<dyn Transform> = match &step.kind {
                StepKind::Project { columns } => Box::new(
                    crate::project::Project::try_new(&input_step.schema, columns, step.schema.clone())
                        .change_context_lazy(|| Error::CreatingTransform {
                            kind: step.kind.label(),
                        })?,
                ),
                unsupported => {
                    error_stack::bail!(Error::UnsupportedStepKind {
                        kind: unsupported.label()
                    })
                }
            };
            transforms.push(transform);
            input_step = step;
        }
        Ok(Self {
            partitions: Partitioned::default(),
            transforms,
            consumers,
        })
    }
}

impl Pipeline for TransformPipeline {
    fn initialize(&mut self, tasks: Partitioned<TaskRef>) {
        self.partitions = tasks
            .into_iter()
            .map(|task| TransformPartition {
                is_closed: AtomicBool::new(false),
                inputs: Mutex::new(VecDeque::new()),
                task,
            })
            .collect();
    }

    fn push(
        &self,
        input_partition: Partition,
        input: usize,
        batch: Batch,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        error_stack::ensure!(
            input == 0,
            PipelineError::InvalidInput {
                input,
                input_len: 1
            }
        );
        let partition = &self.partitions[input_partition];
        error_stack::ensure!(
            !partition.is_input_closed(),
            PipelineError::InputClosed {
                input,
                input_partition
            }
        );

        partition.add_input(batch);
        scheduler.schedule(partition.task.clone());
        Ok(())
    }

    fn close(
        &self,
        input_partition: Partition,
        input: usize,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        error_stack::ensure!(
            input == 0,
            PipelineError::InvalidInput {
                input,
                input_len: 1
            }
        );
        let partition = &self.partitions[input_partition];
        error_stack::ensure!(
            !partition.is_input_closed(),
            PipelineError::InputClosed {
                input,
                input_partition
            }
        );

        // Don't close the consumers here. We may be currently executing a
        // `do_work` loop, in which case we need to allow it to output before
        // the close propagates.
        partition.close_input();
        scheduler.schedule(partition.task.clone());

        Ok(())
    }

    fn do_work(
        &self,
        input_partition: Partition,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        let partition = &self.partitions[input_partition];

        if let Some(batch) = partition.pop_input() {
            tracing::trace!(
                "Performing work for partition {input_partition} on {} rows",
                batch.num_rows()
            );

            if !batch.is_empty() {
                let mut batch = batch;
                for transform in self.transforms.iter() {
                    batch = transform
                        .apply(batch)
                        .change_context(PipelineError::Execution)?;

                    // Exit the sequence of transforms early if the batch is
                    // empty. Transforms don't add rows.
                    if batch.is_empty() {
                        break;
                    }
                }

                if !batch.is_empty() {
                    self.consumers
                        .push(input_partition, batch, scheduler)
                        .change_context(PipelineError::Execution)?;
                }
            }
        } else {
            error_stack::ensure!(
                partition.is_input_closed(),
                PipelineError::illegal_state("scheduled without work")
            );
        }

        // If the input is closed and drained, propagate the close and finish
        // this partition. The task may be rescheduled once more by a close
        // racing with this execution; `is_complete` keeps the close from
        // propagating twice.
        if partition.is_input_closed() && partition.is_input_empty() && !partition.task.is_complete()
        {
            self.consumers
                .close(input_partition, scheduler)
                .change_context(PipelineError::Execution)?;
            partition.task.complete();
        }

        // Note: We don't re-schedule the transform if there is input
        // remaining. This is handled by the fact that we scheduled the
        // transform when we added the batch, which triggers the "scheduled
        // during execution" -> "re-schedule" logic (see ScheduleCount).

        Ok(())
    }
}
