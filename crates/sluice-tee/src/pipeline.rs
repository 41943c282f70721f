use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use arrow_schema::SchemaRef;
use error_stack::ResultExt;
use parking_lot::Mutex;
use sluice_batch::Batch;
use sluice_physical::TeeSettings;
use sluice_scheduler::{
    InputHandles, Partition, Partitioned, Pipeline, PipelineError, Scheduler, TaskRef,
};

use crate::{dispatch, SpoolBuffer, SpoolCursor, TableStore};

/// The partition whose task runs the dispatch and the re-emission.
const EMIT_PARTITION: usize = 0;

/// The buffering tee pipeline.
///
/// Plays both pipeline roles: it is the terminal sink of its upstream, and
/// the source of everything downstream of the tee step. Every pushed batch
/// is appended to the spool -- the append is the only sink-side work, so it
/// happens directly in [`Pipeline::push`]. Once the scheduler has closed
/// every input partition the side effects run exactly once against the
/// complete spool, and the pipeline re-emits the buffered batches to its
/// consumers at its own pace.
///
/// If the query is torn down before the final close, the pipeline (and its
/// spool) are simply dropped: dispatch is gated on the close-driven
/// finalize, never on destruction.
pub struct TeePipeline {
    spool: SpoolBuffer,
    settings: TeeSettings,
    store: Option<Arc<dyn TableStore>>,
    /// Consumers of the re-emitted output.
    consumers: InputHandles,
    /// One task per input partition; the task for [`EMIT_PARTITION`] doubles
    /// as the emitting task and completes only after re-emission finishes.
    tasks: Partitioned<TaskRef>,
    /// Whether each input partition has been closed.
    closed: Partitioned<AtomicBool>,
    /// Number of input partitions still open. Seeded at `initialize`; the
    /// scheduler closes each partition exactly once, so this reaches zero
    /// exactly once.
    open_inputs: AtomicUsize,
    /// Single-use latch for the side-effect dispatch. Even if the emitting
    /// task were woken twice, the effects run at most once.
    dispatched: AtomicBool,
    /// State of the emitting (source) side.
    emit: Mutex<EmitState>,
}

enum EmitState {
    /// Input partitions are still open; the spool is growing.
    Accumulating,
    /// Replaying the spool to the consumers, carrying any failure the
    /// dispatch collected so it can be surfaced after the rows are out.
    Emitting {
        cursor: SpoolCursor,
        failure: Option<error_stack::Report<crate::Error>>,
    },
    /// All batches re-emitted and the consumers closed.
    Done,
}

impl std::fmt::Debug for TeePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeePipeline")
            .field("settings", &self.settings)
            .field("buffered_batches", &self.spool.num_batches())
            .finish_non_exhaustive()
    }
}

impl TeePipeline {
    /// Create a tee pipeline buffering batches of the given schema.
    ///
    /// `store` is required only when the settings materialize into a table;
    /// without one that effect fails (and is reported) at dispatch.
    pub fn new(
        schema: SchemaRef,
        settings: TeeSettings,
        store: Option<Arc<dyn TableStore>>,
        consumers: InputHandles,
    ) -> Self {
        Self {
            spool: SpoolBuffer::new(schema),
            settings,
            store,
            consumers,
            tasks: Partitioned::default(),
            closed: Partitioned::default(),
            open_inputs: AtomicUsize::new(0),
            dispatched: AtomicBool::new(false),
            emit: Mutex::new(EmitState::Accumulating),
        }
    }
}

impl Pipeline for TeePipeline {
    fn initialize(&mut self, tasks: Partitioned<TaskRef>) {
        self.open_inputs.store(tasks.len(), Ordering::Release);
        self.closed = tasks.iter().map(|_| AtomicBool::new(false)).collect();
        self.tasks = tasks;
    }

    fn push(
        &self,
        input_partition: Partition,
        input: usize,
        batch: Batch,
        _scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        error_stack::ensure!(
            input == 0,
            PipelineError::InvalidInput {
                input,
                input_len: 1
            }
        );
        error_stack::ensure!(
            !self.closed[input_partition].load(Ordering::Acquire),
            PipelineError::InputClosed {
                input,
                input_partition
            }
        );

        // The append is the sink-side work; nothing is scheduled for it.
        self.spool
            .append(batch)
            .change_context(PipelineError::Execution)
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
        let was_closed = self.closed[input_partition].fetch_or(true, Ordering::AcqRel);
        error_stack::ensure!(
            !was_closed,
            PipelineError::InputClosed {
                input,
                input_partition
            }
        );

        // Non-emitting partitions have no further work once closed.
        if input_partition != Partition::from(EMIT_PARTITION) {
            self.tasks[input_partition].complete();
        }

        let remaining = self.open_inputs.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::trace!("Closed tee input partition {input_partition}. {remaining} remaining.");
        if remaining == 0 {
            // All producer lanes have finished; wake the emitting task to
            // run the side effects and start re-emission.
            scheduler.schedule(self.tasks[Partition::from(EMIT_PARTITION)].clone());
        }
        Ok(())
    }

    fn do_work(
        &self,
        partition: Partition,
        scheduler: &mut dyn Scheduler,
    ) -> error_stack::Result<(), PipelineError> {
        debug_assert_eq!(
            partition,
            Partition::from(EMIT_PARTITION),
            "only the emitting partition is ever scheduled"
        );

        if !self.dispatched.swap(true, Ordering::AcqRel) {
            // Every input partition has closed, so the spool is complete and
            // immutable from here on.
            tracing::info!(
                "Tee input drained: {} rows in {} batches. Dispatching side effects.",
                self.spool.num_rows(),
                self.spool.num_batches()
            );
            let failure = dispatch(&self.spool, &self.settings, self.store.as_deref()).err();
            *self.emit.lock() = EmitState::Emitting {
                cursor: self.spool.cursor(),
                failure,
            };
        }

        let mut emit = self.emit.lock();
        match &mut *emit {
            EmitState::Accumulating => {
                error_stack::bail!(PipelineError::illegal_state(
                    "tee emitting before inputs closed"
                ))
            }
            EmitState::Emitting { cursor, .. } => {
                if let Some(batch) = self.spool.scan(cursor) {
                    self.consumers
                        .push(Partition::from(EMIT_PARTITION), batch, scheduler)
                        .change_context(PipelineError::Execution)?;
                    // One batch per wakeup; reschedule for the rest.
                    scheduler.schedule(self.tasks[partition].clone());
                } else {
                    let failure = match std::mem::replace(&mut *emit, EmitState::Done) {
                        EmitState::Emitting { failure, .. } => failure,
                        _ => None,
                    };
                    self.consumers
                        .close(Partition::from(EMIT_PARTITION), scheduler)
                        .change_context(PipelineError::Execution)?;
                    self.tasks[partition].complete();

                    // Surface collected dispatch failures only after the
                    // buffered rows have been made available downstream.
                    if let Some(failure) = failure {
                        return Err(failure.change_context(PipelineError::Execution));
                    }
                }
                Ok(())
            }
            // A wakeup racing with completion; nothing left to do.
            EmitState::Done => Ok(()),
        }
    }
}
