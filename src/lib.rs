//! A durable, disk-backed queue of records, uploaded in order.
//!
//! Records written to a [`StorageQueue`] get consecutive sequence numbers and
//! are appended to backing files in a directory. Upload attempts present the
//! unconfirmed records, in sequence number order, to an [`Uploader`]. Once the
//! owner of the queue [confirms](StorageQueue::confirm) a sequence number,
//! every record up to it is retired, and backing files holding only retired
//! records are deleted.
//!
//! Backing files use a log format strongly inspired by leveldb and rocksdb.
//! They are a sequence of blocks of `2^15 = 32_768 bytes`, and records may
//! span over several blocks. The integrity of the log is protected by a
//! checksum at the frame level. In case of corruption, some punctual record
//! can be lost, while later records are ok.
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use storagequeue::{BlobAck, QueueOptions, StorageQueue, Uploader};
//!
//! struct PrintUploader;
//!
//! #[async_trait]
//! impl Uploader for PrintUploader {
//!     async fn process_blob(&mut self, seq: u64, blob: &[u8]) -> BlobAck {
//!         println!("{seq}: {} bytes", blob.len());
//!         BlobAck::Accepted
//!     }
//!
//!     async fn completed(&mut self, status: storagequeue::Result<()>) {
//!         println!("upload completed: {status:?}");
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> storagequeue::Result<()> {
//! let options = QueueOptions::new("/var/lib/myapp/queue", "events_")
//!     .upload_period(Duration::from_secs(10));
//! let queue = StorageQueue::create(options, || {
//!     Box::new(PrintUploader) as Box<dyn Uploader>
//! })
//! .await?;
//! let seq = queue.write(b"hello").await?;
//! // Once the record is safely stored downstream.
//! queue.confirm(seq).await?;
//! queue.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod frame;
mod queue;
mod record;
mod sequence;
mod store;
mod upload;

pub use config::{FlushMode, QueueOptions, UploadTrigger, DEFAULT_TOTAL_SIZE_THRESHOLD};
pub use error::{QueueError, Result};
pub use queue::StorageQueue;
pub use record::{ReadRecordError, RecordReader, RecordWriter, Serializable};
pub use sequence::SequenceTracker;
pub use store::{FileRange, QueueMeta, RecordStore, Recovered, StoreReader, StoreRecord};
pub use upload::{BlobAck, Uploader, UploaderFactory};
