pub mod ndjson;

use crate::error::DeliveryError;
use crate::events::EventRecord;

pub use ndjson::NdjsonSink;

/// Downstream destination for event batches.
///
/// A batch is either accepted as a whole or rejected; on rejection the
/// processor does not advance the checkpoint, so the same window is fetched
/// again next cycle. [`DeliveryError::RecordsSkipped`] is the one error that
/// still counts as accepted.
pub trait DeliverySink {
    fn deliver(&mut self, batch: &[EventRecord]) -> Result<(), DeliveryError>;
}
