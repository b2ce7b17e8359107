use super::{CancelToken, Processor};
use crate::checkpoint::CheckpointStore;
use crate::error::ProcessingError;
use crate::events::reader::EventSource;
use crate::sink::DeliverySink;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Runs a cycle immediately and then once per `interval` until cancelled.
///
/// A zero interval runs exactly one cycle and returns its error, if any.
/// With an interval, failed cycles are logged and retried on the next tick.
/// Ticks missed while a cycle overruns are skipped, never queued.
pub fn run_scheduled<R, C, D>(
    processor: &mut Processor<R, C, D>,
    interval: Duration,
    cancel: &CancelToken,
) -> Result<(), ProcessingError>
where
    R: EventSource,
    C: CheckpointStore,
    D: DeliverySink,
{
    if interval.is_zero() {
        return match processor.run_cycle(cancel) {
            Ok(report) => {
                info!(
                    events_delivered = report.events_delivered,
                    batches = report.batches,
                    "single run complete"
                );
                Ok(())
            }
            Err(ProcessingError::Cancelled) => Ok(()),
            Err(err) => Err(err),
        };
    }

    let mut next_tick = Instant::now();
    loop {
        match processor.run_cycle(cancel) {
            Ok(report) => info!(
                events_delivered = report.events_delivered,
                batches = report.batches,
                "cycle complete"
            ),
            Err(ProcessingError::Cancelled) => return Ok(()),
            Err(err) => error!(error = %err, "cycle failed, retrying on next tick"),
        }

        next_tick = next_deadline(next_tick, interval, Instant::now());
        let wait = next_tick.saturating_duration_since(Instant::now());
        if cancel.wait_timeout(wait) {
            info!("shutdown requested, stopping scheduler");
            return Ok(());
        }
    }
}

/// First tick after `now` on the grid `previous + k * interval`.
fn next_deadline(previous: Instant, interval: Duration, now: Instant) -> Instant {
    let mut next = previous + interval;
    if next <= now {
        let behind = now.duration_since(previous).as_nanos() / interval.as_nanos();
        next = previous + interval * (behind as u32 + 1);
    }
    next
}
