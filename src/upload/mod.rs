//! Upload of the unconfirmed records.
//!
//! Upload attempts run on a single task. Each attempt creates a fresh
//! [`Uploader`] and presents it every unconfirmed record present when
//! the attempt started, in sequence number order.

mod scheduler;
mod trigger;
mod uploader;

pub(crate) use self::scheduler::{upload_records, UploadScheduler};
pub(crate) use self::trigger::TriggerDriver;
pub use self::uploader::{BlobAck, Uploader, UploaderFactory};
