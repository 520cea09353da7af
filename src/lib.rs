pub mod config;
pub mod credentials;
pub mod error;
pub mod hash;
pub mod manifest;
mod retry_policies;
pub mod session;
pub mod sync_client;

pub use credentials::Credential;
pub use error::SyncError;
pub use manifest::{Manifest, ManifestEntry};
pub use session::{FailureReason, FileOutcome, SyncSession};
pub use sync_client::{SyncClient, SyncClientBuilder};
