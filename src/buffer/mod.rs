pub mod batch;
pub mod error;
pub mod queue;

pub use batch::{Batch, FlushTrigger, PendingBatch};
pub use error::SubmitError;
pub use queue::{IngressQueue, IngressWriter};
