#![warn(
    rust_2018_idioms,
    nonstandard_style,
    future_incompatible,
    clippy::mod_module_files,
    clippy::print_stdout,
    clippy::print_stderr
)]

//! Execution of sluice physical plans.
//!
//! Converts a [`sluice_physical::Plan`] into scheduler pipelines and drives
//! them to completion on the worker pool.

use std::sync::Arc;

use arrow_array::RecordBatch;
use error_stack::ResultExt;
use hashbrown::HashMap;
use index_vec::IndexVec;
use itertools::Itertools;
use sluice_batch::Batch;
use sluice_physical::{Plan, StepId, StepKind};
use sluice_scheduler::{InputHandles, WorkerPoolBuilder};
use sluice_tee::{TableStore, TeePipeline};
use sluice_transforms::TransformPipeline;

mod error;
mod source_feeds;
mod write_channel_pipeline;

#[cfg(test)]
mod tests;

pub use error::*;

use crate::source_feeds::SourceFeeds;
use crate::write_channel_pipeline::WriteChannelPipeline;

/// Options controlling execution of a plan.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of parallel partitions feeding each table scan.
    pub partitions: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self { partitions: 1 }
    }
}

pub struct PlanExecutor {
    worker_pool: WorkerPoolBuilder,
    source_feeds: SourceFeeds,
}

impl PlanExecutor {
    /// Create the plan executor for the given plan.
    ///
    /// This creates the worker threads but does not feed any input, meaning
    /// the threads won't have anything to do until [`PlanExecutor::execute`]
    /// is called.
    ///
    /// Pipelines are created by walking the steps in reverse, so each step's
    /// consumers exist before the step producing their input. A tee step is
    /// registered in both roles as it is visited: as a consumer (sink) of
    /// its input step's pipeline and as the producer (source) feeding the
    /// handles of everything downstream of it.
    pub fn try_new(
        query_id: String,
        plan: &Plan,
        sources: &HashMap<String, Vec<Batch>>,
        store: Option<Arc<dyn TableStore>>,
        output: tokio::sync::mpsc::UnboundedSender<RecordBatch>,
        options: &ExecutionOptions,
    ) -> error_stack::Result<Self, Error> {
        let mut executor = PlanExecutor {
            worker_pool: WorkerPoolBuilder::new(query_id).change_context(Error::Creating)?,
            source_feeds: SourceFeeds::default(),
        };

        // Forward pass: the partition count each step's output carries.
        // Scans fan out over the configured partitions; transforms preserve
        // their input's partitioning; the tee re-emits on a single partition.
        let mut out_partitions: IndexVec<StepId, usize> = IndexVec::with_capacity(plan.steps.len());
        for step in plan.steps.iter() {
            let partitions = match &step.kind {
                StepKind::Scan { .. } => options.partitions.max(1),
                StepKind::Project { .. } => out_partitions[step.inputs[0]],
                StepKind::Tee { .. } => 1,
            };
            out_partitions.push(partitions);
        }

        let last_step_id = plan.last_step_id();
        let sink_pipeline = executor.worker_pool.add_pipeline(
            out_partitions[last_step_id],
            WriteChannelPipeline::new(output),
        );

        // Map from the producing step ID to the consumers of its output.
        let mut step_consumers: HashMap<StepId, InputHandles> = HashMap::new();
        step_consumers
            .entry(last_step_id)
            .or_default()
            .add_consumer(sink_pipeline, 0);

        // Iterate in reverse so the receivers (consumers) are created before
        // the senders (producers). Steps fused into a transform pipeline are
        // marked handled and skipped when the reverse walk reaches them.
        let mut handled: IndexVec<StepId, bool> =
            plan.steps.iter().map(|_| false).collect();
        for step_id in (0..plan.steps.len()).rev().map(StepId::from_usize) {
            if handled[step_id] {
                continue;
            }
            let step = &plan.steps[step_id];
            let consumers = step_consumers
                .remove(&step_id)
                .expect("at least one consumer for step");

            match &step.kind {
                StepKind::Scan { table_name } => {
                    let batches = sources.get(table_name).ok_or_else(|| {
                        error_stack::report!(Error::NoSuchTable {
                            table_name: table_name.clone(),
                        })
                    })?;
                    executor.source_feeds.add_feed(
                        table_name.clone(),
                        batches.clone(),
                        consumers,
                        out_partitions[step_id],
                    );
                }
                StepKind::Tee { settings } => {
                    let input = step.inputs[0];
                    let pipeline = executor.worker_pool.add_pipeline(
                        out_partitions[input],
                        TeePipeline::new(
                            step.schema.clone(),
                            settings.clone(),
                            store.clone(),
                            consumers,
                        ),
                    );
                    step_consumers
                        .entry(input)
                        .or_default()
                        .add_consumer(pipeline, 0);
                }
                StepKind::Project { .. } => {
                    // Fuse the maximal run of transform steps ending here
                    // into a single transform pipeline.
                    let mut run = vec![step_id];
                    let mut first = step_id;
                    loop {
                        let input = plan.steps[first].inputs[0];
                        if !plan.steps[input].kind.is_transform()
                            || step_consumers.contains_key(&input)
                        {
                            break;
                        }
                        handled[input] = true;
                        run.push(input);
                        first = input;
                    }
                    run.reverse();

                    let input = plan.steps[first].inputs[0];
                    tracing::trace!(
                        "Creating transform pipeline: {}",
                        run.iter().format_with(",", |step_id, f| {
                            f(&format_args!("{}", plan.steps[*step_id]))
                        })
                    );
                    let pipeline = TransformPipeline::try_new(
                        &plan.steps[input],
                        run.iter().map(|id| &plan.steps[*id]),
                        consumers,
                    )
                    .change_context(Error::Creating)?;
                    let pipeline = executor
                        .worker_pool
                        .add_pipeline(out_partitions[input], pipeline);
                    step_consumers
                        .entry(input)
                        .or_default()
                        .add_consumer(pipeline, 0);
                }
            }
        }

        Ok(executor)
    }

    /// Start the workers, feed the sources and wait for completion.
    ///
    /// The first worker error is propagated after all workers stop.
    pub fn execute(self) -> error_stack::Result<(), Error> {
        let Self {
            worker_pool,
            source_feeds,
        } = self;

        let injector = worker_pool.injector().clone();

        let workers = worker_pool.start().change_context(Error::Starting)?;
        source_feeds.feed_all(injector)?;

        workers.join().change_context(Error::Stopping)?;

        Ok(())
    }
}
