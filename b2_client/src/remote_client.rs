use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use b2_config::b2_config;
use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use lazy_static::lazy_static;
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::json;
use tracing::{event, instrument};

use crate::auth::AuthConfig;
use crate::checksum::sha1_hex;
use crate::encoding::{encode_file_name, encode_info_value};
use crate::error::{B2ClientError, Result};
use crate::http_client;
use crate::interface::LargeFileClient;
use crate::part_source::PartSource;
use crate::retry_wrapper::RetryWrapper;
use crate::types::{
    B2File, CancelledFile, PartsPage, UnfinishedFilesPage, UploadPartLease, UploadUrlLease, UploadedPart,
    MAX_FILE_INFO_ENTRIES,
};
use crate::INFORMATION_LOG_LEVEL;

/// Path prefix of the JSON API endpoints, relative to the API base URL.
pub const API_PATH_PREFIX: &str = "b2api/v2";

/// Header carrying the 1-indexed part number on part uploads.
pub const PART_NUMBER_HEADER: &str = "X-Bz-Part-Number";
/// Header carrying the SHA-1 digest of the transmitted body.
pub const CONTENT_SHA1_HEADER: &str = "X-Bz-Content-Sha1";
/// Header carrying the URL-encoded file name on whole-file uploads.
pub const FILE_NAME_HEADER: &str = "X-Bz-File-Name";
/// Header name prefix for user metadata entries on whole-file uploads.
pub const FILE_INFO_HEADER_PREFIX: &str = "X-Bz-Info-";

/// Content type asking the service to sniff the stored type.
const AUTO_CONTENT_TYPE: &str = "b2/x-auto";
const OCTET_STREAM_CONTENT_TYPE: &str = "application/octet-stream";

lazy_static! {
    static ref FN_CALL_ID: AtomicU64 = AtomicU64::new(1);
}

/// The HTTP implementation of [`LargeFileClient`].
///
/// One instance owns its connection pools: an account-authorized client for
/// the JSON API and a bare client for upload URLs, whose requests carry
/// per-lease tokens instead.
pub struct RemoteClient {
    api_url: String,
    api_client: Arc<ClientWithMiddleware>,
    upload_client: Arc<ClientWithMiddleware>,
}

impl RemoteClient {
    pub fn new(auth: &AuthConfig, user_agent: &str) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            api_url: auth.api_url.trim_end_matches('/').to_string(),
            api_client: Arc::new(http_client::build_api_client(auth, user_agent)?),
            upload_client: Arc::new(http_client::build_upload_client(user_agent)?),
        }))
    }

    /// Get the API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}/{}/{}", self.api_url, API_PATH_PREFIX, endpoint))?)
    }

    fn validate_file_info(file_info: &HashMap<String, String>) -> Result<()> {
        if file_info.len() > MAX_FILE_INFO_ENTRIES {
            return Err(B2ClientError::Validation(format!(
                "file info holds {} entries; the service accepts at most {MAX_FILE_INFO_ENTRIES}",
                file_info.len()
            )));
        }
        Ok(())
    }

    fn validate_part_number(part_number: u16) -> Result<()> {
        let max_part_number = b2_config().transfer.max_part_number;
        if part_number == 0 || part_number > max_part_number {
            return Err(B2ClientError::Validation(format!(
                "part number {part_number} is outside the accepted range 1..={max_part_number}"
            )));
        }
        Ok(())
    }

    fn lease_token_header(token: &str) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(token)
            .map_err(|_| B2ClientError::Validation("lease token is not a valid header value".to_string()))?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn file_info_headers(file_info: &HashMap<String, String>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in file_info {
            let name = HeaderName::try_from(format!("{FILE_INFO_HEADER_PREFIX}{key}"))
                .map_err(|_| B2ClientError::Validation(format!("file info key {key:?} is not a valid header name")))?;
            let value = HeaderValue::from_str(&encode_info_value(value))
                .map_err(|_| B2ClientError::Validation(format!("file info value for {key:?} is not encodable")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// Read a source once and pair the bytes with their digest. The same
    /// buffer backs every transmission attempt, so the source is never read
    /// twice within one call.
    async fn read_and_digest(source: &dyn PartSource) -> Result<(bytes::Bytes, String)> {
        let data = source.read().await?;
        if data.len() as u64 != source.content_length() {
            return Err(B2ClientError::Validation(format!(
                "part source produced {} bytes but declared {}",
                data.len(),
                source.content_length()
            )));
        }
        let digest = sha1_hex(&data);
        Ok((data, digest))
    }

    fn upload_retry_wrapper(api_tag: &'static str, auto_retry: bool) -> RetryWrapper {
        if auto_retry {
            RetryWrapper::new(api_tag)
                .with_fixed_delay(b2_config().client.part_retry_delay)
                .with_max_attempts(1)
        } else {
            RetryWrapper::new(api_tag).no_retries()
        }
    }
}

#[async_trait::async_trait]
impl LargeFileClient for RemoteClient {
    #[instrument(skip_all, name = "RemoteClient::start_large_file", fields(file.name = file_name))]
    async fn start_large_file(
        &self,
        bucket_id: &str,
        file_name: &str,
        content_type: Option<&str>,
        file_info: &HashMap<String, String>,
    ) -> Result<B2File> {
        Self::validate_file_info(file_info)?;

        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let url = self.endpoint_url("b2_start_large_file")?;
        event!(INFORMATION_LOG_LEVEL, call_id, bucket_id, file_name, "Starting start_large_file API call");

        let body = json!({
            "bucketId": bucket_id,
            "fileName": file_name,
            "contentType": content_type.unwrap_or(AUTO_CONTENT_TYPE),
            "fileInfo": file_info,
        });

        let client = self.api_client.clone();
        let file: B2File = RetryWrapper::new("b2_start_large_file")
            .run_and_extract_json(move || client.post(url.clone()).json(&body).send())
            .await?;

        event!(INFORMATION_LOG_LEVEL, call_id, file_id = %file.file_id, "Completed start_large_file API call");
        Ok(file)
    }

    async fn get_upload_url(&self, bucket_id: &str) -> Result<UploadUrlLease> {
        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let url = self.endpoint_url("b2_get_upload_url")?;
        event!(INFORMATION_LOG_LEVEL, call_id, bucket_id, "Starting get_upload_url API call");

        let body = json!({ "bucketId": bucket_id });

        let client = self.api_client.clone();
        let lease: UploadUrlLease = RetryWrapper::new("b2_get_upload_url")
            .run_and_extract_json(move || client.post(url.clone()).json(&body).send())
            .await?;

        event!(INFORMATION_LOG_LEVEL, call_id, bucket_id, "Completed get_upload_url API call");
        Ok(lease)
    }

    async fn get_upload_part_url(&self, file_id: &str) -> Result<UploadPartLease> {
        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let url = self.endpoint_url("b2_get_upload_part_url")?;
        event!(INFORMATION_LOG_LEVEL, call_id, file_id, "Starting get_upload_part_url API call");

        let body = json!({ "fileId": file_id });

        let client = self.api_client.clone();
        let lease: UploadPartLease = RetryWrapper::new("b2_get_upload_part_url")
            .run_and_extract_json(move || client.post(url.clone()).json(&body).send())
            .await?;

        event!(INFORMATION_LOG_LEVEL, call_id, file_id, "Completed get_upload_part_url API call");
        Ok(lease)
    }

    #[instrument(skip_all, name = "RemoteClient::upload_part", fields(part.number = part_number, part.len = source.content_length()))]
    async fn upload_part(
        &self,
        lease: &UploadPartLease,
        part_number: u16,
        source: &dyn PartSource,
        auto_retry: bool,
    ) -> Result<UploadedPart> {
        Self::validate_part_number(part_number)?;

        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let url = Url::parse(&lease.upload_url)?;
        let auth_token = Self::lease_token_header(&lease.authorization_token)?;

        let (data, local_sha1) = Self::read_and_digest(source).await?;
        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            part_number,
            size = data.len(),
            sha1 = %local_sha1,
            "Starting upload_part API call",
        );

        let content_length = data.len() as u64;
        let client = self.upload_client.clone();
        let sha = local_sha1.clone();

        let confirmed: UploadedPart = Self::upload_retry_wrapper("b2_upload_part", auto_retry)
            .run_and_extract_json(move || {
                client
                    .post(url.clone())
                    .header(AUTHORIZATION, auth_token.clone())
                    .header(PART_NUMBER_HEADER, part_number)
                    .header(CONTENT_SHA1_HEADER, sha.clone())
                    .header(CONTENT_LENGTH, content_length)
                    .header(CONTENT_TYPE, OCTET_STREAM_CONTENT_TYPE)
                    .body(data.clone())
                    .send()
            })
            .await?;

        // A confirmed checksum that differs from the one computed here means
        // the transmission was corrupted; the part must be re-uploaded under
        // a fresh lease.
        if confirmed.content_sha1 != local_sha1 {
            return Err(B2ClientError::ChecksumMismatch {
                part_number,
                local: local_sha1,
                remote: confirmed.content_sha1,
            });
        }

        event!(INFORMATION_LOG_LEVEL, call_id, part_number, "Completed upload_part API call");
        Ok(confirmed)
    }

    #[instrument(skip_all, name = "RemoteClient::upload_file", fields(file.name = file_name, file.len = source.content_length()))]
    async fn upload_file(
        &self,
        lease: &UploadUrlLease,
        file_name: &str,
        source: &dyn PartSource,
        file_info: &HashMap<String, String>,
        auto_retry: bool,
    ) -> Result<B2File> {
        Self::validate_file_info(file_info)?;

        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let url = Url::parse(&lease.upload_url)?;
        let auth_token = Self::lease_token_header(&lease.authorization_token)?;
        let info_headers = Self::file_info_headers(file_info)?;
        let encoded_name = HeaderValue::from_str(&encode_file_name(file_name))
            .map_err(|_| B2ClientError::Validation(format!("file name {file_name:?} is not encodable")))?;

        let (data, local_sha1) = Self::read_and_digest(source).await?;
        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            file_name,
            size = data.len(),
            "Starting upload_file API call",
        );

        let content_length = data.len() as u64;
        let client = self.upload_client.clone();
        let sha = local_sha1.clone();

        let file: B2File = Self::upload_retry_wrapper("b2_upload_file", auto_retry)
            .run_and_extract_json(move || {
                client
                    .post(url.clone())
                    .header(AUTHORIZATION, auth_token.clone())
                    .header(FILE_NAME_HEADER, encoded_name.clone())
                    .header(CONTENT_SHA1_HEADER, sha.clone())
                    .header(CONTENT_LENGTH, content_length)
                    .header(CONTENT_TYPE, AUTO_CONTENT_TYPE)
                    .headers(info_headers.clone())
                    .body(data.clone())
                    .send()
            })
            .await?;

        if let Some(remote_sha1) = &file.content_sha1 {
            if *remote_sha1 != local_sha1 {
                return Err(B2ClientError::ChecksumMismatch {
                    part_number: 1,
                    local: local_sha1,
                    remote: remote_sha1.clone(),
                });
            }
        }

        event!(INFORMATION_LOG_LEVEL, call_id, file_id = %file.file_id, "Completed upload_file API call");
        Ok(file)
    }

    #[instrument(skip_all, name = "RemoteClient::finish_large_file", fields(file.id = file_id, part.count = part_sha1_array.len()))]
    async fn finish_large_file(&self, file_id: &str, part_sha1_array: &[String]) -> Result<B2File> {
        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let url = self.endpoint_url("b2_finish_large_file")?;
        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            file_id,
            part_count = part_sha1_array.len(),
            "Starting finish_large_file API call",
        );

        let body = json!({
            "fileId": file_id,
            "partSha1Array": part_sha1_array,
        });

        let client = self.api_client.clone();
        let file: B2File = RetryWrapper::new("b2_finish_large_file")
            .run_and_extract_json(move || client.post(url.clone()).json(&body).send())
            .await?;

        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            file_id,
            content_length = file.content_length,
            "Completed finish_large_file API call",
        );
        Ok(file)
    }

    #[instrument(skip_all, name = "RemoteClient::cancel_large_file", fields(file.id = file_id))]
    async fn cancel_large_file(&self, file_id: &str) -> Result<CancelledFile> {
        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let url = self.endpoint_url("b2_cancel_large_file")?;
        event!(INFORMATION_LOG_LEVEL, call_id, file_id, "Starting cancel_large_file API call");

        let body = json!({ "fileId": file_id });

        let client = self.api_client.clone();
        let cancelled: CancelledFile = RetryWrapper::new("b2_cancel_large_file")
            .run_and_extract_json(move || client.post(url.clone()).json(&body).send())
            .await?;

        event!(INFORMATION_LOG_LEVEL, call_id, file_id, "Completed cancel_large_file API call");
        Ok(cancelled)
    }

    async fn list_unfinished_large_files(
        &self,
        bucket_id: &str,
        start_file_id: Option<&str>,
        max_file_count: Option<u32>,
    ) -> Result<UnfinishedFilesPage> {
        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let url = self.endpoint_url("b2_list_unfinished_large_files")?;
        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            bucket_id,
            start_file_id,
            "Starting list_unfinished_large_files API call",
        );

        let mut body = serde_json::Map::new();
        body.insert("bucketId".to_string(), json!(bucket_id));
        if let Some(start) = start_file_id {
            body.insert("startFileId".to_string(), json!(start));
        }
        if let Some(count) = max_file_count {
            body.insert("maxFileCount".to_string(), json!(count));
        }
        let body = serde_json::Value::Object(body);

        let client = self.api_client.clone();
        let page: UnfinishedFilesPage = RetryWrapper::new("b2_list_unfinished_large_files")
            .run_and_extract_json(move || client.post(url.clone()).json(&body).send())
            .await?;

        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            bucket_id,
            file_count = page.files.len(),
            next_file_id = page.next_file_id.as_deref(),
            "Completed list_unfinished_large_files API call",
        );
        Ok(page)
    }

    async fn list_parts(
        &self,
        file_id: &str,
        start_part_number: Option<u16>,
        max_part_count: Option<u32>,
    ) -> Result<PartsPage> {
        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let url = self.endpoint_url("b2_list_parts")?;
        event!(INFORMATION_LOG_LEVEL, call_id, file_id, start_part_number, "Starting list_parts API call");

        let mut body = serde_json::Map::new();
        body.insert("fileId".to_string(), json!(file_id));
        if let Some(start) = start_part_number {
            body.insert("startPartNumber".to_string(), json!(start));
        }
        if let Some(count) = max_part_count {
            body.insert("maxPartCount".to_string(), json!(count));
        }
        let body = serde_json::Value::Object(body);

        let client = self.api_client.clone();
        let page: PartsPage = RetryWrapper::new("b2_list_parts")
            .run_and_extract_json(move || client.post(url.clone()).json(&body).send())
            .await?;

        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            file_id,
            part_count = page.parts.len(),
            next_part_number = page.next_part_number,
            "Completed list_parts API call",
        );
        Ok(page)
    }
}
