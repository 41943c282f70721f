use error_stack::ResultExt;
use sluice_batch::Batch;
use sluice_scheduler::{InputHandles, Injector};

use crate::Error;

/// The table scans feeding a plan's pipelines.
///
/// Scan steps have no pipeline of their own; the driving thread pushes their
/// batches through the injector, spread round-robin over the consumer's
/// input partitions, then closes every partition.
#[derive(Default)]
pub(super) struct SourceFeeds {
    feeds: Vec<SourceFeed>,
}

struct SourceFeed {
    table_name: String,
    batches: Vec<Batch>,
    consumers: InputHandles,
    partitions: usize,
}

impl SourceFeeds {
    pub fn add_feed(
        &mut self,
        table_name: String,
        batches: Vec<Batch>,
        consumers: InputHandles,
        partitions: usize,
    ) {
        debug_assert!(partitions > 0);
        self.feeds.push(SourceFeed {
            table_name,
            batches,
            consumers,
            partitions,
        });
    }

    /// Push every feed's batches to its consumers and close the partitions.
    pub fn feed_all(self, mut injector: Injector) -> error_stack::Result<(), Error> {
        for feed in self.feeds {
            let SourceFeed {
                table_name,
                batches,
                consumers,
                partitions,
            } = feed;
            let _span = tracing::info_span!("source feed", %table_name, partitions).entered();

            tracing::info!("Feeding {} batches", batches.len());
            for (index, batch) in batches.into_iter().enumerate() {
                consumers
                    .push((index % partitions).into(), batch, &mut injector)
                    .change_context(Error::FeedingSource)?;
            }
            for partition in 0..partitions {
                consumers
                    .close(partition.into(), &mut injector)
                    .change_context(Error::FeedingSource)?;
            }
            tracing::info!("Source drained and closed");
        }
        Ok(())
    }
}
