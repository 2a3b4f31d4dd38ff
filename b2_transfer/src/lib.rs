pub mod errors;
mod upload_session;

pub use errors::TransferError;
pub use upload_session::{LargeFileUploadSession, SessionState};
