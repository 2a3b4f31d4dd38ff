use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Hard cap on user-supplied file info entries, enforced by the service and
/// validated client-side before any round trip.
pub const MAX_FILE_INFO_ENTRIES: usize = 10;

/// A stored file record as returned by the start, finish, and listing calls.
/// Fields outside the id/name pair are filled in only where the originating
/// call reports them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct B2File {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub bucket_id: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub content_sha1: Option<String>,
    #[serde(default)]
    pub file_info: HashMap<String, String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub upload_timestamp: Option<u64>,
}

/// A single-use upload authorization scoped to one bucket, for whole-file
/// uploads. Expiry is implicit: the service answers 401 once the token has
/// lapsed, and a fresh lease must be obtained.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlLease {
    pub bucket_id: String,
    pub upload_url: String,
    pub authorization_token: String,
}

/// A single-use upload authorization scoped to one in-progress large file.
/// A lease must never back two in-flight requests at once; concurrent part
/// uploaders each hold their own.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPartLease {
    pub file_id: String,
    pub upload_url: String,
    pub authorization_token: String,
}

/// One uploaded part of a large file, as confirmed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPart {
    #[serde(default)]
    pub file_id: Option<String>,
    pub part_number: u16,
    pub content_sha1: String,
    pub content_length: u64,
    #[serde(default)]
    pub upload_timestamp: Option<u64>,
}

/// One page of unfinished large files. `next_file_id` is the cursor for the
/// following page; `None` means the listing is exhausted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfinishedFilesPage {
    pub files: Vec<B2File>,
    #[serde(default)]
    pub next_file_id: Option<String>,
}

/// One page of uploaded parts. `next_part_number` is the cursor for the
/// following page; `None` means the listing is exhausted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartsPage {
    pub parts: Vec<UploadedPart>,
    #[serde(default)]
    pub next_part_number: Option<u16>,
}

/// Confirmation returned when an in-progress large file is cancelled.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledFile {
    pub file_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub bucket_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Error body returned by the service on failed calls.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub status: u16,
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_record_parses_from_wire_json() {
        let raw = r#"{
            "fileId": "4_za71f544e781e6891531b001a_f200ec353a2184825_d20160409_m004829_c000_v0001016_t0028",
            "fileName": "books/war_and_peace.txt",
            "bucketId": "e73ede9c9c8412db49f60715",
            "contentType": "b2/x-auto",
            "contentLength": 46741,
            "contentSha1": "7ad60358a6f8d1f163a7b32f4f8e9d8b92e0c2a3",
            "fileInfo": {"author": "tolstoy"},
            "uploadTimestamp": 1460162909000
        }"#;

        let file: B2File = serde_json::from_str(raw).unwrap();
        assert_eq!(file.file_name, "books/war_and_peace.txt");
        assert_eq!(file.content_length, Some(46741));
        assert_eq!(file.file_info.get("author").map(String::as_str), Some("tolstoy"));
        assert!(file.action.is_none());
    }

    #[test]
    fn part_lease_and_page_parse_from_wire_json() {
        let lease: UploadPartLease = serde_json::from_str(
            r#"{"fileId": "f1", "uploadUrl": "https://pod.example/upload/f1", "authorizationToken": "token"}"#,
        )
        .unwrap();
        assert_eq!(lease.file_id, "f1");

        let page: PartsPage = serde_json::from_str(
            r#"{"parts": [{"fileId": "f1", "partNumber": 1, "contentSha1": "da39a3ee5e6b4b0d3255bfef95601890afd80709", "contentLength": 5242880}], "nextPartNumber": 2}"#,
        )
        .unwrap();
        assert_eq!(page.parts.len(), 1);
        assert_eq!(page.parts[0].part_number, 1);
        assert_eq!(page.next_part_number, Some(2));
    }

    #[test]
    fn exhausted_pages_have_null_cursors() {
        let page: UnfinishedFilesPage = serde_json::from_str(r#"{"files": [], "nextFileId": null}"#).unwrap();
        assert!(page.files.is_empty());
        assert!(page.next_file_id.is_none());
    }
}
