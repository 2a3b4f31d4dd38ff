//! Pagination over unfinished large files and their uploaded parts.
//!
//! Both cursors are lazy and restartable: each `next_page` call performs one
//! server-bounded fetch, and the cursor value observed after any page can
//! seed a fresh cursor later. That restartability is what lets an
//! interrupted transfer re-list its uploaded parts and resume.

use std::sync::Arc;

use crate::error::Result;
use crate::interface::LargeFileClient;
use crate::types::{B2File, UploadedPart};

/// Lazy iteration over the unfinished large files of a bucket.
pub struct UnfinishedFilesCursor {
    client: Arc<dyn LargeFileClient>,
    bucket_id: String,
    page_size: Option<u32>,
    next_file_id: Option<String>,
    exhausted: bool,
}

impl UnfinishedFilesCursor {
    pub fn new(client: Arc<dyn LargeFileClient>, bucket_id: impl Into<String>) -> Self {
        Self {
            client,
            bucket_id: bucket_id.into(),
            page_size: None,
            next_file_id: None,
            exhausted: false,
        }
    }

    /// Bound each page to at most `page_size` entries.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Restart iteration from a previously observed cursor value.
    pub fn starting_at(mut self, file_id: impl Into<String>) -> Self {
        self.next_file_id = Some(file_id.into());
        self
    }

    /// The file id the next page would be fetched from.
    pub fn cursor(&self) -> Option<&str> {
        self.next_file_id.as_deref()
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<B2File>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .client
            .list_unfinished_large_files(&self.bucket_id, self.next_file_id.as_deref(), self.page_size)
            .await?;

        self.next_file_id = page.next_file_id;
        if self.next_file_id.is_none() {
            self.exhausted = true;
        }

        Ok(Some(page.files))
    }
}

/// Lazy iteration over the already-uploaded parts of an unfinished large
/// file.
pub struct PartsCursor {
    client: Arc<dyn LargeFileClient>,
    file_id: String,
    page_size: Option<u32>,
    next_part_number: Option<u16>,
    exhausted: bool,
}

impl PartsCursor {
    pub fn new(client: Arc<dyn LargeFileClient>, file_id: impl Into<String>) -> Self {
        Self {
            client,
            file_id: file_id.into(),
            page_size: None,
            next_part_number: None,
            exhausted: false,
        }
    }

    /// Bound each page to at most `page_size` entries.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Restart iteration from a previously observed cursor value.
    pub fn starting_at(mut self, part_number: u16) -> Self {
        self.next_part_number = Some(part_number);
        self
    }

    /// The part number the next page would be fetched from.
    pub fn cursor(&self) -> Option<u16> {
        self.next_part_number
    }

    /// Fetch the next page, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<UploadedPart>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .client
            .list_parts(&self.file_id, self.next_part_number, self.page_size)
            .await?;

        self.next_part_number = page.next_part_number;
        if self.next_part_number.is_none() {
            self.exhausted = true;
        }

        Ok(Some(page.parts))
    }

    /// Drain every remaining page into one list, in part-number order.
    pub async fn collect_all(mut self) -> Result<Vec<UploadedPart>> {
        let mut parts = Vec::new();
        while let Some(page) = self.next_page().await? {
            parts.extend(page);
        }
        parts.sort_by_key(|p| p.part_number);
        Ok(parts)
    }
}
