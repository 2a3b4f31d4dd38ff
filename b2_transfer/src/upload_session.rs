use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use b2_client::{B2File, CancelledFile, FileRegionSource, LargeFileClient, PartSource, PartsCursor, UploadedPart};
use b2_config::b2_config;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info_span, instrument, Instrument};

use crate::errors::{Result, TransferError};

/// Lifecycle of a transfer. Finished and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Started,
    PartsUploading,
    Finished,
    Cancelled,
}

/// One multi-part large-file transfer: start it, upload numbered parts at
/// any concurrency the caller chooses, then finish with the ordered
/// checksum list, or cancel.
///
/// The session spawns no pool of its own. `upload_part` is invoked by the
/// caller at whatever degree of parallelism it wants; each invocation
/// acquires its own single-use upload lease, and the accumulated part
/// records are the only shared state. `upload_parts` is a convenience
/// driver that fans a batch out bounded by a caller-supplied width.
///
/// Dropping any returned future cancels the underlying network call,
/// including a pending retry backoff.
pub struct LargeFileUploadSession {
    client: Arc<dyn LargeFileClient>,
    file: B2File,
    state: Mutex<SessionState>,
    parts: Mutex<BTreeMap<u16, UploadedPart>>,
}

impl std::fmt::Debug for LargeFileUploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeFileUploadSession")
            .field("file", &self.file)
            .field("state", &self.state)
            .field("parts", &self.parts)
            .finish_non_exhaustive()
    }
}

impl LargeFileUploadSession {
    /// Begin a new transfer. The user info entry cap is validated before
    /// any round trip happens.
    #[instrument(skip_all, name = "LargeFileUploadSession::start", fields(file.name = file_name))]
    pub async fn start(
        client: Arc<dyn LargeFileClient>,
        bucket_id: &str,
        file_name: &str,
        content_type: Option<&str>,
        file_info: Option<HashMap<String, String>>,
    ) -> Result<Arc<Self>> {
        let info = file_info.unwrap_or_default();
        let file = client.start_large_file(bucket_id, file_name, content_type, &info).await?;

        Ok(Arc::new(Self {
            client,
            file,
            state: Mutex::new(SessionState::Started),
            parts: Mutex::new(BTreeMap::new()),
        }))
    }

    /// Pick up an interrupted transfer: re-list the parts the service
    /// already holds for `file_id` and resume in the uploading state.
    /// Upload the missing part numbers, then finish as usual.
    #[instrument(skip_all, name = "LargeFileUploadSession::resume", fields(file.id = file_id))]
    pub async fn resume(client: Arc<dyn LargeFileClient>, file_id: &str) -> Result<Arc<Self>> {
        let uploaded = PartsCursor::new(client.clone(), file_id).collect_all().await?;

        let mut parts = BTreeMap::new();
        for part in uploaded {
            parts.insert(part.part_number, part);
        }

        // Only the id is known here; the full record arrives with finish.
        let file = B2File {
            file_id: file_id.to_string(),
            ..Default::default()
        };

        Ok(Arc::new(Self {
            client,
            file,
            state: Mutex::new(SessionState::PartsUploading),
            parts: Mutex::new(parts),
        }))
    }

    pub fn file(&self) -> &B2File {
        &self.file
    }

    pub fn file_id(&self) -> &str {
        &self.file.file_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Part numbers recorded so far, ascending.
    pub fn uploaded_part_numbers(&self) -> Vec<u16> {
        self.parts.lock().unwrap().keys().copied().collect()
    }

    /// Part numbers in `1..=total_parts` that still need uploading.
    pub fn missing_part_numbers(&self, total_parts: u16) -> Vec<u16> {
        let parts = self.parts.lock().unwrap();
        (1..=total_parts).filter(|n| !parts.contains_key(n)).collect()
    }

    fn ensure_uploading(&self, operation: &'static str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match *state {
            SessionState::Started | SessionState::PartsUploading => {
                *state = SessionState::PartsUploading;
                Ok(())
            },
            other => Err(TransferError::InvalidState { operation, state: other }),
        }
    }

    /// Upload one numbered part under a fresh lease and record the
    /// server-confirmed result. Safe to call concurrently; every concurrent
    /// call holds its own lease.
    pub async fn upload_part(self: &Arc<Self>, part_number: u16, source: &dyn PartSource) -> Result<UploadedPart> {
        self.ensure_uploading("upload_part")?;

        let lease = self.client.get_upload_part_url(self.file_id()).await?;
        let part = self.client.upload_part(&lease, part_number, source, true).await?;

        self.parts.lock().unwrap().insert(part.part_number, part.clone());
        Ok(part)
    }

    /// Upload a batch of sources as parts `1..=N` with at most
    /// `max_concurrent` in flight at a time. Parts already recorded (a
    /// resumed transfer) are skipped. Completion order does not matter;
    /// `finish` orders the checksums by part number.
    pub async fn upload_parts(self: &Arc<Self>, sources: Vec<Box<dyn PartSource>>, max_concurrent: usize) -> Result<()> {
        self.ensure_uploading("upload_parts")?;

        if sources.len() > usize::from(u16::MAX) {
            return Err(TransferError::ClientError(b2_client::B2ClientError::Validation(format!(
                "{} parts exceed the largest expressible part number",
                sources.len()
            ))));
        }

        let limiter = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut upload_tasks: JoinSet<Result<()>> = JoinSet::new();

        for (index, source) in sources.into_iter().enumerate() {
            let part_number = (index + 1) as u16;
            if self.parts.lock().unwrap().contains_key(&part_number) {
                continue;
            }

            // Acquiring before spawning keeps the fan-out bounded by the
            // caller's width rather than by the batch size.
            let permit = limiter.clone().acquire_owned().await?;
            let session = self.clone();

            upload_tasks.spawn(
                async move {
                    let _permit = permit;
                    session.upload_part(part_number, source.as_ref()).await?;
                    Ok(())
                }
                .instrument(info_span!("LargeFileUploadSession::upload_part_task", part.number = part_number)),
            );
        }

        while let Some(result) = upload_tasks.join_next().await {
            result??;
        }

        Ok(())
    }

    /// Upload a local file as this transfer's parts: split it into
    /// `part_size` regions (the configured minimum part size when `None`),
    /// then drive `upload_parts` at the configured default width. Parts a
    /// resumed transfer already holds are skipped, so this also completes an
    /// interrupted file.
    pub async fn upload_file_in_parts(self: &Arc<Self>, path: impl AsRef<Path>, part_size: Option<u64>) -> Result<()> {
        let part_size = part_size.unwrap_or(b2_config().transfer.min_part_size);
        let regions = FileRegionSource::split_file(path.as_ref(), part_size)?;

        let sources: Vec<Box<dyn PartSource>> =
            regions.into_iter().map(|region| Box::new(region) as Box<dyn PartSource>).collect();

        self.upload_parts(sources, b2_config().transfer.default_part_concurrency).await
    }

    fn ordered_part_checksums(&self) -> Result<Vec<String>> {
        let parts = self.parts.lock().unwrap();

        let Some(&highest) = parts.keys().next_back() else {
            return Err(TransferError::NoParts);
        };

        let missing: Vec<u16> = (1..=highest).filter(|n| !parts.contains_key(n)).collect();
        if !missing.is_empty() {
            return Err(TransferError::MissingParts { missing });
        }

        Ok(parts.values().map(|p| p.content_sha1.clone()).collect())
    }

    /// Assemble the file. Unless the recorded parts form the contiguous
    /// range `1..=N`, this fails client-side without a round trip; the
    /// checksum array goes out in ascending part order no matter what order
    /// the uploads completed in.
    pub async fn finish(self: &Arc<Self>) -> Result<B2File> {
        {
            let state = self.state.lock().unwrap();
            match *state {
                SessionState::Started | SessionState::PartsUploading => {},
                other => {
                    return Err(TransferError::InvalidState {
                        operation: "finish",
                        state: other,
                    })
                },
            }
        }

        let part_sha1_array = self.ordered_part_checksums()?;
        let file = self.client.finish_large_file(self.file_id(), &part_sha1_array).await?;

        *self.state.lock().unwrap() = SessionState::Finished;
        Ok(file)
    }

    /// Abandon the transfer, discarding its uploaded parts. A finished
    /// transfer cannot be cancelled: when this session observed the finish
    /// the conflict is raised locally without a round trip, otherwise it
    /// surfaces verbatim from the service.
    pub async fn cancel(self: &Arc<Self>) -> Result<CancelledFile> {
        {
            let state = self.state.lock().unwrap();
            if *state == SessionState::Finished {
                return Err(TransferError::InvalidState {
                    operation: "cancel",
                    state: SessionState::Finished,
                });
            }
        }

        let cancelled = self.client.cancel_large_file(self.file_id()).await?;

        *self.state.lock().unwrap() = SessionState::Cancelled;
        Ok(cancelled)
    }
}
