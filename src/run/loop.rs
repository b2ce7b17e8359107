use super::{CancelToken, CycleReport, Processor};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{DeliveryError, ProcessingError};
use crate::events::QueryOptions;
use crate::events::reader::EventSource;
use crate::sink::DeliverySink;
use chrono::Utc;
use tracing::{debug, error, info, warn};

impl<R, C, D> Processor<R, C, D>
where
    R: EventSource,
    C: CheckpointStore,
    D: DeliverySink,
{
    /// Runs one cycle: resume from the stored checkpoint (or the lookback
    /// window), then fetch, deliver and commit batches until a short batch
    /// shows the backlog is drained.
    ///
    /// Any failure leaves the stored checkpoint at the last committed batch.
    pub fn run_cycle(&mut self, cancel: &CancelToken) -> Result<CycleReport, ProcessingError> {
        let consumer_id = self.settings.consumer_id.clone();
        let node = self.settings.node_name.clone();
        let batch_size = self.settings.batch_size;

        let stored = self.store.load(&consumer_id).map_err(|source| {
            ProcessingError::LoadCheckpoint {
                consumer_id: consumer_id.clone(),
                source,
            }
        })?;

        let mut opts = QueryOptions {
            limit: batch_size,
            ascending: true,
            sort_key: self.settings.sort_key,
            ..QueryOptions::default()
        };

        let mut checkpoint = match stored {
            Some(cp) => {
                info!(
                    consumer_id = %consumer_id,
                    last_event_id = cp.last_event_id,
                    total_events_processed = cp.total_events_processed,
                    "resuming from checkpoint"
                );
                opts.min_event_id = Some(cp.last_event_id);
                cp
            }
            None => {
                let start = self
                    .settings
                    .lookback
                    .map(|window| Utc::now().checked_sub_signed(window));
                match start {
                    Some(Some(start)) => {
                        info!(
                            consumer_id = %consumer_id,
                            start_time = %start,
                            "no checkpoint found, starting from lookback window"
                        );
                        opts.start_time = Some(start);
                    }
                    Some(None) => warn!(
                        consumer_id = %consumer_id,
                        "lookback window reaches before the earliest representable time, \
                         processing all history"
                    ),
                    None => info!(
                        consumer_id = %consumer_id,
                        "no checkpoint found, processing all history"
                    ),
                }
                Checkpoint::initial(&consumer_id, &node)
            }
        };

        let mut report = CycleReport {
            batches: 0,
            events_delivered: 0,
            skipped_event_ids: Vec::new(),
            checkpoint: checkpoint.clone(),
        };

        loop {
            if cancel.is_cancelled() {
                info!(consumer_id = %consumer_id, "cancelled between batches");
                return Err(ProcessingError::Cancelled);
            }

            let batch = self
                .source
                .fetch(&opts)
                .map_err(|source| ProcessingError::Fetch {
                    consumer_id: consumer_id.clone(),
                    after: opts.min_event_id,
                    source,
                })?;

            let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
                debug!(consumer_id = %consumer_id, "no new events");
                break;
            };
            let (first_id, last_id) = (first.id, last.id);

            match self.sink.deliver(&batch) {
                Ok(()) => {}
                Err(DeliveryError::RecordsSkipped { event_ids }) => {
                    warn!(
                        consumer_id = %consumer_id,
                        skipped = event_ids.len(),
                        event_ids = ?event_ids,
                        "events dropped during delivery, advancing past them"
                    );
                    report.skipped_event_ids.extend(event_ids);
                }
                Err(source) => {
                    error!(
                        consumer_id = %consumer_id,
                        first_event_id = first_id,
                        last_event_id = last_id,
                        error = %source,
                        "delivery failed, checkpoint not advanced"
                    );
                    return Err(ProcessingError::Deliver {
                        consumer_id,
                        first: first_id,
                        last: last_id,
                        source,
                    });
                }
            }

            checkpoint.advance(last, batch.len(), &node);
            self.store
                .save(&checkpoint)
                .map_err(|source| ProcessingError::SaveCheckpoint {
                    consumer_id: consumer_id.clone(),
                    last_event_id: last_id,
                    source,
                })?;

            report.batches += 1;
            report.events_delivered += batch.len();
            info!(
                consumer_id = %consumer_id,
                batch_size = batch.len(),
                last_event_id = last_id,
                total_events_processed = checkpoint.total_events_processed,
                "batch committed"
            );

            if batch.len() < batch_size {
                break;
            }
            opts.min_event_id = Some(last_id);
            opts.offset = 0;
        }

        report.checkpoint = checkpoint;
        Ok(report)
    }
}
