use std::io;

use thiserror::Error;

use crate::record::ReadRecordError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Io error: {0}")]
    Io(#[from] io::Error),
    /// The sequence number was never assigned to a record.
    #[error("Invalid sequence number {seq}: next sequence number is {next}")]
    InvalidSequenceNumber { seq: u64, next: u64 },
    /// The uploader failed to process the record. It will be retried.
    #[error("Upload of record {seq} failed")]
    UploadFailed { seq: u64 },
    /// The uploader explicitly refused the record.
    #[error("Record {seq} rejected by uploader: {reason}")]
    UploadRejected { seq: u64, reason: String },
    #[error("Queue is not initialized")]
    QueueNotInitialized,
    #[error("Corruption")]
    Corruption,
    #[error("Upload cancelled")]
    Cancelled,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ReadRecordError> for QueueError {
    fn from(read_record_error: ReadRecordError) -> Self {
        match read_record_error {
            ReadRecordError::IoError(io_err) => QueueError::Io(io_err),
            ReadRecordError::Corruption => QueueError::Corruption,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
