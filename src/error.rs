use thiserror::Error;

use crate::manifest::ManifestError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("no API credential found in the environment")]
    MissingCredential,
    #[error("target directory is missing or not a directory: {path}")]
    TargetDirUnavailable { path: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Standard I/O error: {0}")]
    StdIoError(#[from] std::io::Error),
    #[error("server ignored range request, responded with status {status}")]
    RangeIgnored { status: reqwest::StatusCode },
    #[error("CLI argument error: {message:?}")]
    CliError { message: String },
    #[error("Other error: {message:?}")]
    Other {
        message: String,
        #[source]
        origin: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SyncError {
    /// Process exit code for fatal/structural errors. Per-file transfer
    /// failures never reach this; they only appear in the session summary.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::MissingCredential => 1,
            SyncError::Manifest(_) => 2,
            _ => 1,
        }
    }
}

impl From<reqwest_middleware::Error> for SyncError {
    fn from(value: reqwest_middleware::Error) -> Self {
        match value {
            reqwest_middleware::Error::Middleware(error) => Self::Other {
                message: error.to_string(),
                origin: error.into_boxed_dyn_error(),
            },
            reqwest_middleware::Error::Reqwest(error) => SyncError::from(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_exits_with_1() {
        assert_eq!(SyncError::MissingCredential.exit_code(), 1);
    }

    #[test]
    fn manifest_errors_exit_with_2() {
        let e = SyncError::Manifest(ManifestError::Empty);
        assert_eq!(e.exit_code(), 2);
        let e = SyncError::Manifest(ManifestError::MissingChecksum {
            filename: "a.bin".to_string(),
        });
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn other_fatal_errors_exit_with_1() {
        let e = SyncError::TargetDirUnavailable {
            path: "/nope".to_string(),
        };
        assert_eq!(e.exit_code(), 1);
    }
}
