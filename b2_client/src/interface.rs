use std::collections::HashMap;

use crate::error::Result;
use crate::part_source::PartSource;
use crate::types::{B2File, CancelledFile, PartsPage, UnfinishedFilesPage, UploadPartLease, UploadUrlLease, UploadedPart};

/// A client to the large-file storage service. The service provides for
/// 1. starting, finishing, and cancelling multi-part file transfers
/// 2. leasing single-use upload URLs
/// 3. uploading checksummed file parts against a lease
/// 4. listing unfinished transfers and their uploaded parts
///
/// Every method is an await point; dropping a returned future cancels the
/// underlying network call, including any pending retry backoff.
#[async_trait::async_trait]
pub trait LargeFileClient: Send + Sync {
    /// Begin a multi-part transfer, returning the file record whose id all
    /// later calls reference. Fails without a round trip when `file_info`
    /// carries more than [`MAX_FILE_INFO_ENTRIES`](crate::types::MAX_FILE_INFO_ENTRIES) entries.
    async fn start_large_file(
        &self,
        bucket_id: &str,
        file_name: &str,
        content_type: Option<&str>,
        file_info: &HashMap<String, String>,
    ) -> Result<B2File>;

    /// Lease a single-use upload URL scoped to a bucket, for whole-file
    /// uploads. Every call issues a fresh lease; nothing is cached.
    async fn get_upload_url(&self, bucket_id: &str) -> Result<UploadUrlLease>;

    /// Lease a single-use upload URL scoped to one in-progress large file.
    /// Each concurrent part uploader must hold its own lease.
    async fn get_upload_part_url(&self, file_id: &str) -> Result<UploadPartLease>;

    /// Upload one numbered part against a lease and verify the
    /// server-confirmed checksum against the locally computed one. With
    /// `auto_retry`, a transient failure is retried once after a fixed
    /// delay, so at most two transmissions happen per call.
    async fn upload_part(
        &self,
        lease: &UploadPartLease,
        part_number: u16,
        source: &dyn PartSource,
        auto_retry: bool,
    ) -> Result<UploadedPart>;

    /// Upload a whole file in one shot against a bucket-level lease. The
    /// file name and info values ride URL-encoded in headers.
    async fn upload_file(
        &self,
        lease: &UploadUrlLease,
        file_name: &str,
        source: &dyn PartSource,
        file_info: &HashMap<String, String>,
        auto_retry: bool,
    ) -> Result<B2File>;

    /// Assemble an uploaded large file from its parts. `part_sha1_array`
    /// must hold the part checksums ordered by ascending part number with no
    /// gaps; the service rejects anything else as an integrity failure.
    async fn finish_large_file(&self, file_id: &str, part_sha1_array: &[String]) -> Result<B2File>;

    /// Abandon an in-progress transfer, discarding its uploaded parts.
    /// Cancelling an already-finished file is a conflict, surfaced verbatim
    /// from the service.
    async fn cancel_large_file(&self, file_id: &str) -> Result<CancelledFile>;

    /// One page of the unfinished large files in a bucket, starting at
    /// `start_file_id` when given. The page's `next_file_id` seeds the next
    /// call.
    async fn list_unfinished_large_files(
        &self,
        bucket_id: &str,
        start_file_id: Option<&str>,
        max_file_count: Option<u32>,
    ) -> Result<UnfinishedFilesPage>;

    /// One page of the already-uploaded parts of an unfinished large file,
    /// starting at `start_part_number` when given. The page's
    /// `next_part_number` seeds the next call.
    async fn list_parts(
        &self,
        file_id: &str,
        start_part_number: Option<u16>,
        max_part_count: Option<u32>,
    ) -> Result<PartsPage>;
}
