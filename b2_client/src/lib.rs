pub use auth::AuthConfig;
pub use checksum::{sha1_hex, sha1_hex_from_reader};
pub use error::{B2ClientError, Result};
pub use file_listing::{PartsCursor, UnfinishedFilesCursor};
pub use interface::LargeFileClient;
pub use part_source::{BytesSource, FileRegionSource, PartSource};
pub use remote_client::RemoteClient;
use tracing::Level;
pub use types::{
    B2File, CancelledFile, PartsPage, UnfinishedFilesPage, UploadPartLease, UploadUrlLease, UploadedPart,
    MAX_FILE_INFO_ENTRIES,
};

pub mod auth;
pub mod checksum;
pub mod encoding;
mod error;
pub mod file_listing;
pub mod http_client;
mod interface;
pub mod part_source;
pub mod remote_client;
pub mod retry_wrapper;
pub mod types;

#[cfg(not(feature = "elevated_information_level"))]
pub const INFORMATION_LOG_LEVEL: Level = Level::DEBUG;

#[cfg(feature = "elevated_information_level")]
pub const INFORMATION_LOG_LEVEL: Level = Level::INFO;
