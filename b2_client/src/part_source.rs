//! Replayable upload bodies with a length known up front.

use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use bytes::Bytes;

use crate::error::{B2ClientError, Result};

/// A sized, single-pass readable source of upload bytes.
///
/// The length must be known before transmission (it becomes the
/// Content-Length header), and `read` may be called more than once: a part
/// that failed with a transient condition is retransmitted, and a caller
/// that re-leases after a checksum mismatch re-reads the same source. Each
/// `read` call performs at most one pass over the underlying source; the
/// checksum is computed from the bytes it returns, never from a second pass.
#[async_trait::async_trait]
pub trait PartSource: Send + Sync {
    /// Number of bytes `read` will produce.
    fn content_length(&self) -> u64;

    /// Produce the bytes for transmission.
    async fn read(&self) -> Result<Bytes>;
}

/// An in-memory source; replays are free.
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl From<Vec<u8>> for BytesSource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<Bytes> for BytesSource {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

#[async_trait::async_trait]
impl PartSource for BytesSource {
    fn content_length(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read(&self) -> Result<Bytes> {
        Ok(self.data.clone())
    }
}

/// A byte range of a file on disk; every `read` reopens the file and reads
/// exactly the range, so replays see the same bytes as long as the file is
/// left untouched.
pub struct FileRegionSource {
    path: PathBuf,
    offset: u64,
    len: u64,
}

impl FileRegionSource {
    pub fn new(path: impl Into<PathBuf>, offset: u64, len: u64) -> Self {
        Self {
            path: path.into(),
            offset,
            len,
        }
    }

    /// Split a file into consecutive `part_size` regions, in part order; the
    /// final region holds the remainder.
    pub fn split_file(path: impl Into<PathBuf>, part_size: u64) -> Result<Vec<FileRegionSource>> {
        let path = path.into();
        if part_size == 0 {
            return Err(B2ClientError::Validation("part size must be positive".to_string()));
        }

        let total = std::fs::metadata(&path)?.len();

        let mut regions = Vec::new();
        let mut offset = 0;
        while offset < total {
            let len = part_size.min(total - offset);
            regions.push(FileRegionSource::new(path.clone(), offset, len));
            offset += len;
        }

        Ok(regions)
    }
}

#[async_trait::async_trait]
impl PartSource for FileRegionSource {
    fn content_length(&self) -> u64 {
        self.len
    }

    async fn read(&self) -> Result<Bytes> {
        let path = self.path.clone();
        let offset = self.offset;
        let len = self.len;

        let buffer = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
            let mut file = std::fs::File::open(&path)?;
            file.seek(SeekFrom::Start(offset))?;

            let mut buffer = vec![0u8; len as usize];
            file.read_exact(&mut buffer)?;
            Ok(buffer)
        })
        .await??;

        Ok(Bytes::from(buffer))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn file_regions_cover_the_file_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::File::create(&path).unwrap().write_all(&data).unwrap();

        let regions = FileRegionSource::split_file(&path, 4096).unwrap();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions.iter().map(|r| r.content_length()).collect::<Vec<_>>(), vec![4096, 4096, 1808]);

        let mut reassembled = Vec::new();
        for region in &regions {
            reassembled.extend_from_slice(&region.read().await.unwrap());
        }
        assert_eq!(reassembled, data);
    }

    #[tokio::test]
    async fn file_region_reads_are_replayable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::File::create(&path).unwrap().write_all(b"0123456789").unwrap();

        let region = FileRegionSource::new(&path, 2, 5);
        let first = region.read().await.unwrap();
        let second = region.read().await.unwrap();
        assert_eq!(&first[..], b"23456");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn zero_part_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::File::create(&path).unwrap().write_all(b"x").unwrap();

        assert!(FileRegionSource::split_file(&path, 0).is_err());
    }
}
