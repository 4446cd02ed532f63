use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::config::{QueueOptions, UploadTrigger};
use crate::error::{QueueError, Result};
use crate::sequence::SequenceTracker;
use crate::store::RecordStore;
use crate::upload::{upload_records, TriggerDriver, UploadScheduler, UploaderFactory};

struct QueueState {
    store: RecordStore,
    tracker: SequenceTracker,
}

struct QueueInner {
    // `None` once the queue is closed.
    state: Mutex<Option<QueueState>>,
    scheduler: UploadScheduler,
    upload_trigger: UploadTrigger,
    uploader_factory: Box<dyn UploaderFactory>,
    shutdown: CancellationToken,
}

/// A durable queue of records, uploaded in order and deleted once confirmed.
///
/// Records written to the queue get consecutive sequence numbers. They are
/// presented to the uploaders created by the `UploaderFactory` until they get
/// confirmed, including across restarts.
///
/// `StorageQueue` is a cheap handle: clones share the same queue. Uploads stop
/// when the queue is closed, or when the last handle is dropped.
#[derive(Clone)]
pub struct StorageQueue {
    inner: Arc<QueueInner>,
    _shutdown_guard: Arc<DropGuard>,
}

impl StorageQueue {
    /// Opens the queue stored in `options.directory`, and starts the upload task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn create(
        options: QueueOptions,
        uploader_factory: impl UploaderFactory,
    ) -> Result<StorageQueue> {
        options.validate()?;
        let (store, recovered) = RecordStore::open(&options).await?;
        let tracker =
            SequenceTracker::new(recovered.next_sequence_number, recovered.low_water_mark);
        let upload_trigger = options.upload_trigger();
        info!(
            directory = %options.directory.display(),
            next_sequence_number = tracker.next_sequence_number(),
            low_water_mark = tracker.low_water_mark(),
            upload_trigger = ?upload_trigger,
            "storage queue created"
        );
        let shutdown = CancellationToken::new();
        let inner = Arc::new(QueueInner {
            state: Mutex::new(Some(QueueState { store, tracker })),
            scheduler: UploadScheduler::default(),
            upload_trigger,
            uploader_factory: Box::new(uploader_factory),
            shutdown: shutdown.clone(),
        });
        tokio::spawn(run_upload_loop(inner.clone()));
        Ok(StorageQueue {
            inner,
            _shutdown_guard: Arc::new(shutdown.drop_guard()),
        })
    }

    /// Appends a record to the queue, and returns its sequence number.
    ///
    /// Once this returns, the record survives a restart. If it fails, no
    /// sequence number is consumed.
    pub async fn write(&self, blob: &[u8]) -> Result<u64> {
        let seq = {
            let mut state_guard = self.inner.state.lock().await;
            let state = state_guard.as_mut().ok_or(QueueError::QueueNotInitialized)?;
            let seq = state.tracker.next_sequence_number();
            state.store.append(seq, blob).await?;
            state.tracker.assign()
        };
        if self.inner.upload_trigger == UploadTrigger::Immediate {
            self.inner.scheduler.request_upload();
        }
        Ok(seq)
    }

    /// Confirms every record up to and including `seq`.
    ///
    /// Confirmed records are never uploaded again, and the backing files
    /// holding only confirmed records are deleted.
    /// Confirming a sequence number below the low water mark does not move it.
    ///
    /// If this returns an error, the low water mark is left unchanged or already
    /// persisted, and confirming again completes the deletion of files.
    pub async fn confirm(&self, seq: u64) -> Result<()> {
        let mut state_guard = self.inner.state.lock().await;
        let state = state_guard.as_mut().ok_or(QueueError::QueueNotInitialized)?;
        let low_water_mark = state.tracker.low_water_mark_after(seq)?;
        if low_water_mark > state.tracker.low_water_mark() {
            // The mark only moves in memory once it is on disk.
            state
                .store
                .persist_marks(state.tracker.next_sequence_number(), low_water_mark)
                .await?;
            state.tracker.advance(seq)?;
        }
        let num_deleted_files = state.store.reclaim(low_water_mark).await?;
        debug!(low_water_mark, num_deleted_files, "records confirmed");
        Ok(())
    }

    /// Requests an upload attempt right away, whatever the upload trigger.
    ///
    /// Returns false if the request was dropped, because an attempt is
    /// in flight or the queue is closed.
    pub fn trigger_upload(&self) -> bool {
        if self.inner.shutdown.is_cancelled() {
            return false;
        }
        self.inner.scheduler.request_upload()
    }

    pub fn is_uploading(&self) -> bool {
        self.inner.scheduler.is_uploading()
    }

    pub async fn low_water_mark(&self) -> Result<u64> {
        self.with_state(|state| state.tracker.low_water_mark()).await
    }

    pub async fn next_sequence_number(&self) -> Result<u64> {
        self.with_state(|state| state.tracker.next_sequence_number())
            .await
    }

    /// Number of backing files on disk.
    pub async fn num_files(&self) -> Result<usize> {
        self.with_state(|state| state.store.num_files()).await
    }

    async fn with_state<T>(&self, read: impl FnOnce(&QueueState) -> T) -> Result<T> {
        let state_guard = self.inner.state.lock().await;
        let state = state_guard.as_ref().ok_or(QueueError::QueueNotInitialized)?;
        Ok(read(state))
    }

    /// Stops uploads and flushes the queue to disk.
    ///
    /// An attempt in flight stops before its next record, and completes with
    /// `QueueError::Cancelled`. Other handles on the queue get
    /// `QueueError::QueueNotInitialized` from then on.
    pub async fn close(self) -> Result<()> {
        self.inner.shutdown.cancel();
        let state_opt = self.inner.state.lock().await.take();
        let mut state = state_opt.ok_or(QueueError::QueueNotInitialized)?;
        state.store.close().await?;
        info!(
            directory = %state.store.directory_path().display(),
            next_sequence_number = state.tracker.next_sequence_number(),
            low_water_mark = state.tracker.low_water_mark(),
            "storage queue closed"
        );
        Ok(())
    }
}

impl QueueInner {
    async fn upload_attempt(&self) -> Result<()> {
        let reader = {
            let state_guard = self.state.lock().await;
            let state = state_guard.as_ref().ok_or(QueueError::QueueNotInitialized)?;
            if !state.tracker.has_unconfirmed() {
                debug!("no unconfirmed record, skipping upload attempt");
                return Ok(());
            }
            debug!(
                low_water_mark = state.tracker.low_water_mark(),
                next_sequence_number = state.tracker.next_sequence_number(),
                "starting upload attempt"
            );
            // Records written from now on wait for the next attempt.
            state.store.read_range(
                state.tracker.low_water_mark(),
                Some(state.tracker.next_sequence_number()),
            )
        };
        let uploader = self.uploader_factory.create_uploader();
        upload_records(reader, uploader, &self.shutdown).await;
        Ok(())
    }
}

async fn run_upload_loop(inner: Arc<QueueInner>) {
    let mut trigger_driver = TriggerDriver::new(inner.upload_trigger);
    while trigger_driver
        .wait_next(inner.scheduler.notify(), &inner.shutdown)
        .await
    {
        if !inner.scheduler.try_begin() {
            continue;
        }
        if let Err(err) = inner.upload_attempt().await {
            warn!(error = %err, "failed to start upload attempt");
        }
        inner.scheduler.finish();
    }
    debug!("upload task stopped");
}
