use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{QueueError, Result};
use crate::store::StoreReader;
use crate::upload::{BlobAck, Uploader};

/// Keeps track of the upload attempt in flight.
///
/// There is at most one attempt in flight at any time. Upload requests made
/// while an attempt is running are dropped.
#[derive(Default)]
pub(crate) struct UploadScheduler {
    inflight: AtomicBool,
    notify: Notify,
}

impl UploadScheduler {
    pub fn is_uploading(&self) -> bool {
        self.inflight.load(Ordering::Acquire)
    }

    pub fn notify(&self) -> &Notify {
        &self.notify
    }

    /// Asks for an upload attempt to start.
    ///
    /// Returns false if the request was dropped because an attempt is in flight.
    pub fn request_upload(&self) -> bool {
        if self.is_uploading() {
            debug!("upload attempt in flight, dropping upload request");
            return false;
        }
        self.notify.notify_one();
        true
    }

    /// Transitions to uploading. Returns false if an attempt is already in flight.
    pub fn try_begin(&self) -> bool {
        self.inflight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish(&self) {
        self.inflight.store(false, Ordering::Release);
    }
}

async fn feed_uploader(
    reader: &mut StoreReader,
    uploader: &mut dyn Uploader,
    shutdown: &CancellationToken,
    num_accepted: &mut u64,
) -> Result<()> {
    loop {
        if shutdown.is_cancelled() {
            return Err(QueueError::Cancelled);
        }
        let (seq, blob) = match reader.next().await? {
            Some(seq_blob) => seq_blob,
            None => return Ok(()),
        };
        match uploader.process_blob(seq, &blob).await {
            BlobAck::Accepted => {
                *num_accepted += 1;
            }
            BlobAck::Failed => return Err(QueueError::UploadFailed { seq }),
            BlobAck::Rejected(reason) => return Err(QueueError::UploadRejected { seq, reason }),
        }
    }
}

/// Presents the records of `reader` to `uploader`, then reports the outcome
/// through `Uploader::completed`.
///
/// Returns the number of records accepted by the uploader.
pub(crate) async fn upload_records(
    mut reader: StoreReader,
    mut uploader: Box<dyn Uploader>,
    shutdown: &CancellationToken,
) -> u64 {
    let mut num_accepted = 0u64;
    let status = feed_uploader(&mut reader, uploader.as_mut(), shutdown, &mut num_accepted).await;
    match &status {
        Ok(()) => debug!(num_accepted, "upload attempt succeeded"),
        Err(err) => warn!(num_accepted, error = %err, "upload attempt failed"),
    }
    uploader.completed(status).await;
    num_accepted
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::config::QueueOptions;
    use crate::store::RecordStore;

    #[derive(Default)]
    struct Recorded {
        blobs: Vec<(u64, Vec<u8>)>,
        completed: Vec<Result<()>>,
    }

    struct RecordingUploader {
        recorded: Arc<Mutex<Recorded>>,
        ack_for: Box<dyn Fn(u64) -> BlobAck + Send>,
        shutdown_on_blob: Option<CancellationToken>,
    }

    impl RecordingUploader {
        fn new(recorded: &Arc<Mutex<Recorded>>) -> RecordingUploader {
            RecordingUploader {
                recorded: recorded.clone(),
                ack_for: Box::new(|_| BlobAck::Accepted),
                shutdown_on_blob: None,
            }
        }
    }

    #[async_trait]
    impl Uploader for RecordingUploader {
        async fn process_blob(&mut self, seq: u64, blob: &[u8]) -> BlobAck {
            self.recorded
                .lock()
                .unwrap()
                .blobs
                .push((seq, blob.to_vec()));
            if let Some(shutdown) = self.shutdown_on_blob.as_ref() {
                shutdown.cancel();
            }
            (self.ack_for)(seq)
        }

        async fn completed(&mut self, status: Result<()>) {
            self.recorded.lock().unwrap().completed.push(status);
        }
    }

    async fn store_with_records(dir: &std::path::Path, num_records: u64) -> RecordStore {
        let options = QueueOptions::new(dir, "P_").total_size_threshold(64);
        let (mut store, _) = RecordStore::open(&options).await.unwrap();
        for seq in 0..num_records {
            store
                .append(seq, format!("Rec{seq}").as_bytes())
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn test_scheduler_single_inflight() {
        let scheduler = UploadScheduler::default();
        assert!(!scheduler.is_uploading());
        assert!(scheduler.request_upload());
        assert!(scheduler.try_begin());
        assert!(scheduler.is_uploading());
        assert!(!scheduler.try_begin());
        assert!(!scheduler.request_upload());
        scheduler.finish();
        assert!(!scheduler.is_uploading());
        assert!(scheduler.request_upload());
    }

    #[tokio::test]
    async fn test_upload_records_all_accepted() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = store_with_records(tempdir.path(), 5).await;
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let uploader = RecordingUploader::new(&recorded);
        let shutdown = CancellationToken::new();
        let num_accepted =
            upload_records(store.read_range(1, Some(4)), Box::new(uploader), &shutdown).await;
        assert_eq!(num_accepted, 3);
        let recorded = recorded.lock().unwrap();
        let seqs: Vec<u64> = recorded.blobs.iter().map(|(seq, _)| *seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(recorded.blobs[0].1, b"Rec1".to_vec());
        assert_eq!(recorded.completed.len(), 1);
        assert!(recorded.completed[0].is_ok());
    }

    #[tokio::test]
    async fn test_upload_records_failure_stops_attempt() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = store_with_records(tempdir.path(), 5).await;
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut uploader = RecordingUploader::new(&recorded);
        uploader.ack_for = Box::new(|seq| {
            if seq == 2 {
                BlobAck::Failed
            } else {
                BlobAck::Accepted
            }
        });
        let shutdown = CancellationToken::new();
        let num_accepted =
            upload_records(store.read_from(0), Box::new(uploader), &shutdown).await;
        assert_eq!(num_accepted, 2);
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.blobs.len(), 3);
        assert_eq!(recorded.completed.len(), 1);
        assert!(matches!(
            recorded.completed[0],
            Err(QueueError::UploadFailed { seq: 2 })
        ));
    }

    #[tokio::test]
    async fn test_upload_records_rejection_stops_attempt() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = store_with_records(tempdir.path(), 3).await;
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut uploader = RecordingUploader::new(&recorded);
        uploader.ack_for = Box::new(|_| BlobAck::Rejected("too large".to_string()));
        let shutdown = CancellationToken::new();
        let num_accepted =
            upload_records(store.read_from(0), Box::new(uploader), &shutdown).await;
        assert_eq!(num_accepted, 0);
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.blobs.len(), 1);
        match &recorded.completed[..] {
            [Err(QueueError::UploadRejected { seq, reason })] => {
                assert_eq!(*seq, 0);
                assert_eq!(reason, "too large");
            }
            _ => panic!("expected a single rejection"),
        }
    }

    #[tokio::test]
    async fn test_upload_records_empty() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = store_with_records(tempdir.path(), 2).await;
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let uploader = RecordingUploader::new(&recorded);
        let shutdown = CancellationToken::new();
        let num_accepted =
            upload_records(store.read_from(2), Box::new(uploader), &shutdown).await;
        assert_eq!(num_accepted, 0);
        let recorded = recorded.lock().unwrap();
        assert!(recorded.blobs.is_empty());
        assert_eq!(recorded.completed.len(), 1);
        assert!(recorded.completed[0].is_ok());
    }

    #[tokio::test]
    async fn test_upload_records_cancelled_between_records() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = store_with_records(tempdir.path(), 3).await;
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let shutdown = CancellationToken::new();
        let mut uploader = RecordingUploader::new(&recorded);
        uploader.shutdown_on_blob = Some(shutdown.clone());
        let num_accepted =
            upload_records(store.read_from(0), Box::new(uploader), &shutdown).await;
        assert_eq!(num_accepted, 1);
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.blobs.len(), 1);
        assert!(matches!(recorded.completed[..], [Err(QueueError::Cancelled)]));
    }
}
