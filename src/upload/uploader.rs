use async_trait::async_trait;

use crate::error::Result;

/// Answer of an uploader to a record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlobAck {
    /// The record was processed. The attempt moves on to the next record.
    Accepted,
    /// The record could not be processed this time. The attempt stops, and the
    /// record is presented again by the next attempt.
    Failed,
    /// The uploader refuses the record. The attempt stops.
    Rejected(String),
}

/// Consumer of the queue records.
///
/// An uploader is created for a single upload attempt. It receives the
/// unconfirmed records in increasing sequence number order, one at a time,
/// and then `completed` exactly once.
///
/// Uploading a record does not confirm it: the owner of the queue is expected
/// to call `StorageQueue::confirm` once records are safely stored downstream.
#[async_trait]
pub trait Uploader: Send {
    async fn process_blob(&mut self, seq: u64, blob: &[u8]) -> BlobAck;

    async fn completed(&mut self, status: Result<()>);
}

/// Creates a fresh uploader for every upload attempt.
pub trait UploaderFactory: Send + Sync + 'static {
    fn create_uploader(&self) -> Box<dyn Uploader>;
}

impl<F> UploaderFactory for F
where F: Fn() -> Box<dyn Uploader> + Send + Sync + 'static
{
    fn create_uploader(&self) -> Box<dyn Uploader> {
        (self)()
    }
}
