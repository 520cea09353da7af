use std::path::Path;
use std::time::Duration;

use derive_builder::Builder;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, RANGE, USER_AGENT};
use reqwest::{Proxy, StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::credentials::Credential;
use crate::error::SyncError;
use crate::hash::{self, StreamingMd5};
use crate::manifest::{Manifest, ManifestEntry, ManifestError};
use crate::retry_policies::FixedThenExponentialRetry;
use crate::session::{FailureReason, FileOutcome, SyncSession};

/// Fixed client-identifying User-Agent attached to every request.
pub const CLIENT_USER_AGENT: &str = concat!("bulksync/", env!("CARGO_PKG_VERSION"));

/// Bulk synchronization client: given a manifest of (URL, checksum) pairs and
/// a target directory, ensures each remote file exists locally, is complete,
/// and matches its expected checksum — resuming partial downloads and
/// re-fetching corrupted ones.
///
/// Entries are processed strictly sequentially; one file is fully resolved
/// before the next begins, and transfers stream to disk in constant-size
/// chunks.
#[derive(Builder, Debug)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct SyncClient {
    /// Number of retries for a transient network error on a single request.
    #[builder(default = 3)]
    max_retries: u32,
    /// Amount of time to wait between retries.
    #[builder(default = Duration::from_millis(500))]
    wait_between_retries: Duration,
    /// Custom request proxy to use for transfers.
    #[builder(default = None)]
    proxy: Option<Proxy>,
    /// Connection timeout, if any.
    #[builder(default = None)]
    connect_timeout: Option<Duration>,
    /// User-Agent sent with every request.
    #[builder(default = CLIENT_USER_AGENT.to_string())]
    user_agent: String,
}

impl SyncClient {
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn set_max_retries(&mut self, value: u32) {
        self.max_retries = value;
    }

    pub fn wait_between_retries(&self) -> Duration {
        self.wait_between_retries
    }

    pub fn set_wait_between_retries(&mut self, value: Duration) {
        self.wait_between_retries = value;
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Synchronizes every manifest entry into `target_dir`, sequentially.
    ///
    /// Per-file transient conditions (network failures, checksum mismatches,
    /// undeterminable remote sizes) are counted and logged but never abort
    /// the run; only structural problems are returned as errors. A session
    /// summary is always logged before returning, even when every file
    /// failed.
    pub async fn sync(
        &self,
        manifest: &Manifest,
        target_dir: &Path,
        credential: &Credential,
    ) -> Result<SyncSession, SyncError> {
        if manifest.is_empty() {
            return Err(SyncError::Manifest(ManifestError::Empty));
        }
        let usable = match tokio::fs::metadata(target_dir).await {
            Ok(meta) => meta.is_dir(),
            Err(_) => false,
        };
        if !usable {
            return Err(SyncError::TargetDirUnavailable {
                path: target_dir.display().to_string(),
            });
        }

        let client = self.get_client(credential)?;
        let mut session = SyncSession::new(manifest.len());

        tracing::info!("{} files to synchronize", manifest.len());

        for (idx, entry) in manifest.entries().iter().enumerate() {
            tracing::info!(
                "file {}/{}: {} from {}",
                idx + 1,
                manifest.len(),
                entry.local_filename(),
                entry.url()
            );
            let outcome = self
                .process_entry(&client, entry, target_dir, &mut session)
                .await;
            tracing::info!(file = entry.local_filename(), outcome = ?outcome, "done");
            session.record(entry.local_filename(), outcome);
        }

        session.log_summary();
        Ok(session)
    }

    fn get_client(&self, credential: &Credential) -> Result<ClientWithMiddleware, SyncError> {
        let retry_policy = FixedThenExponentialRetry {
            max_n_retries: self.max_retries,
            wait_time: self.wait_between_retries,
            n_fixed_retries: 3,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent).map_err(|e| SyncError::Other {
                message: format!("invalid user agent {:?}", self.user_agent),
                origin: Box::new(e),
            })?,
        );
        headers.insert(
            AUTHORIZATION,
            credential
                .authorization_value()
                .map_err(|e| SyncError::Other {
                    message: "credential is not a valid header value".to_string(),
                    origin: Box::new(e),
                })?,
        );

        let mut client = reqwest::Client::builder().default_headers(headers);
        if let Some(proxy) = &self.proxy {
            client = client.proxy(proxy.clone());
        }
        if let Some(timeout) = self.connect_timeout {
            client = client.connect_timeout(timeout);
        }

        Ok(ClientBuilder::new(client.build()?)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build())
    }

    /// Resolves a single manifest entry to its terminal outcome. Everything
    /// here recovers locally; this function never propagates an error up to
    /// the run loop.
    async fn process_entry(
        &self,
        client: &ClientWithMiddleware,
        entry: &ManifestEntry,
        target_dir: &Path,
        session: &mut SyncSession,
    ) -> FileOutcome {
        let dest = target_dir.join(entry.local_filename());
        let local_size = match tokio::fs::metadata(&dest).await {
            Ok(meta) if meta.is_file() => Some(meta.len()),
            _ => None,
        };
        let remote_size = self.remote_file_size(client, entry.url()).await;

        let Some(remote) = remote_size else {
            tracing::warn!(
                file = entry.local_filename(),
                "remote file size could not be determined"
            );
            return self.verify_without_remote_size(entry, &dest, local_size, session).await;
        };

        match local_size {
            None => {
                tracing::info!(
                    "file {} - not present, downloading...",
                    entry.local_filename()
                );
                self.download_and_verify(client, entry, &dest, FileOutcome::Downloaded)
                    .await
            }
            Some(local) if local < remote => {
                tracing::info!(
                    "file {} - partial ({}/{} bytes), resuming...",
                    entry.local_filename(),
                    local,
                    remote
                );
                self.resume_and_verify(client, entry, &dest, local).await
            }
            Some(local) if local == remote => {
                tracing::info!(
                    "file {} - present, checking integrity...",
                    entry.local_filename()
                );
                match hash::md5_hex_of_file(&dest).await {
                    Ok(actual) if actual == entry.expected_checksum() => {
                        tracing::info!("file {} - already downloaded", entry.local_filename());
                        FileOutcome::Verified
                    }
                    Ok(actual) => {
                        tracing::warn!(
                            "file {} - corrupted, same size but checksum {} does not match {}, redownloading...",
                            entry.local_filename(),
                            actual,
                            entry.expected_checksum()
                        );
                        session.note_corrupted();
                        self.delete_and_redownload(client, entry, &dest).await
                    }
                    Err(e) => {
                        tracing::warn!(
                            "file {} - could not read back for verification: {}",
                            entry.local_filename(),
                            e
                        );
                        FileOutcome::Failed(FailureReason::Transfer)
                    }
                }
            }
            Some(local) => {
                tracing::warn!(
                    "file {} - corrupted, local {} bytes larger than remote {} bytes, redownloading...",
                    entry.local_filename(),
                    local,
                    remote
                );
                session.note_corrupted();
                self.delete_and_redownload(client, entry, &dest).await
            }
        }
    }

    /// Fallback when the remote size is unknown (e.g. the request was
    /// redirected to a login page): no resumption decision can be made, so
    /// only an existing local file can be checksum-verified.
    async fn verify_without_remote_size(
        &self,
        entry: &ManifestEntry,
        dest: &Path,
        local_size: Option<u64>,
        session: &mut SyncSession,
    ) -> FileOutcome {
        if local_size.is_none() {
            return FileOutcome::SkippedNoRemoteSize;
        }
        match hash::md5_hex_of_file(dest).await {
            Ok(actual) if actual == entry.expected_checksum() => {
                tracing::info!(
                    "VALID checksum for {} matches {}",
                    entry.local_filename(),
                    entry.expected_checksum()
                );
                session.note_no_remote_size();
                FileOutcome::Verified
            }
            Ok(_) => {
                tracing::warn!(
                    "FAILED checksum for {} does not match {}",
                    entry.local_filename(),
                    entry.expected_checksum()
                );
                session.note_invalid();
                FileOutcome::SkippedNoRemoteSize
            }
            Err(e) => {
                tracing::warn!(
                    "file {} - could not read back for verification: {}",
                    entry.local_filename(),
                    e
                );
                session.note_invalid();
                FileOutcome::SkippedNoRemoteSize
            }
        }
    }

    async fn delete_and_redownload(
        &self,
        client: &ClientWithMiddleware,
        entry: &ManifestEntry,
        dest: &Path,
    ) -> FileOutcome {
        if let Err(e) = tokio::fs::remove_file(dest).await {
            tracing::warn!(
                "file {} - failed to remove corrupt file: {}",
                entry.local_filename(),
                e
            );
            return FileOutcome::Failed(FailureReason::Transfer);
        }
        self.download_and_verify(client, entry, dest, FileOutcome::Redownloaded)
            .await
    }

    /// Full download with the checksum computed incrementally while
    /// streaming, so no re-read pass is needed. `success` is the outcome for
    /// a verified transfer (`Downloaded` for a fresh file, `Redownloaded`
    /// after a corruption delete).
    async fn download_and_verify(
        &self,
        client: &ClientWithMiddleware,
        entry: &ManifestEntry,
        dest: &Path,
        success: FileOutcome,
    ) -> FileOutcome {
        let actual = match self.download_full(client, entry.url(), dest).await {
            Ok(hex) => hex,
            Err(e) => {
                // keep any partial bytes on disk for a future resume
                tracing::warn!("file {} - download failed: {}", entry.local_filename(), e);
                return FileOutcome::Failed(FailureReason::Transfer);
            }
        };
        if actual == entry.expected_checksum() {
            tracing::info!(
                "VALID checksum for {} matches {}",
                entry.local_filename(),
                entry.expected_checksum()
            );
            return success;
        }
        // A mismatched full-length file is never left behind: resuming from
        // wrong content would only produce more corruption.
        tracing::warn!(
            "FAILED checksum for {} does not match {}, removing",
            entry.local_filename(),
            entry.expected_checksum()
        );
        if let Err(e) = tokio::fs::remove_file(dest).await {
            tracing::warn!(
                "file {} - failed to remove mismatched file: {}",
                entry.local_filename(),
                e
            );
        }
        FileOutcome::Failed(FailureReason::Corrupt)
    }

    async fn resume_and_verify(
        &self,
        client: &ClientWithMiddleware,
        entry: &ManifestEntry,
        dest: &Path,
        offset: u64,
    ) -> FileOutcome {
        if let Err(e) = self.append_range(client, entry.url(), dest, offset).await {
            tracing::warn!("file {} - resume failed: {}", entry.local_filename(), e);
            return FileOutcome::Failed(FailureReason::Transfer);
        }
        // The digest of the pre-existing prefix is unknown, so a resumed file
        // must be read back from disk in full.
        match hash::md5_hex_of_file(dest).await {
            Ok(actual) if actual == entry.expected_checksum() => {
                tracing::info!(
                    "VALID checksum for {} matches {}",
                    entry.local_filename(),
                    entry.expected_checksum()
                );
                FileOutcome::Resumed
            }
            Ok(_) => {
                // left on disk for a subsequent operator retry
                tracing::warn!(
                    "FAILED checksum for {} after resumed download",
                    entry.local_filename()
                );
                FileOutcome::Failed(FailureReason::ResumeCorrupt)
            }
            Err(e) => {
                tracing::warn!(
                    "file {} - could not read back for verification: {}",
                    entry.local_filename(),
                    e
                );
                FileOutcome::Failed(FailureReason::Transfer)
            }
        }
    }

    /// Queries the declared content length via an authenticated HEAD request
    /// without downloading a body. Returns None when the server cannot
    /// report a size, which usually indicates an authorization problem.
    async fn remote_file_size(&self, client: &ClientWithMiddleware, url: &Url) -> Option<u64> {
        let resp = match client.head(url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("size probe for {} failed: {}", url, e);
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!("size probe for {} returned status {}", url, resp.status());
            return None;
        }
        resp.headers()
            .get(CONTENT_LENGTH)
            .and_then(|val| val.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
    }

    /// Streams the whole file to `dest`, truncating any previous content,
    /// and returns the hex digest computed over the transferred bytes.
    async fn download_full(
        &self,
        client: &ClientWithMiddleware,
        url: &Url,
        dest: &Path,
    ) -> Result<String, SyncError> {
        let resp = client.get(url.clone()).send().await?;
        let mut resp = resp.error_for_status()?;

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dest)
            .await?;
        let mut writer = BufWriter::new(file);
        let mut digest = StreamingMd5::new();
        while let Some(chunk) = resp.chunk().await? {
            digest.update(&chunk);
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;

        Ok(digest.finalize_hex())
    }

    /// Issues a byte-range request starting at the local file's current
    /// length and appends the response. A server that ignores the range and
    /// replies 200 would duplicate the prefix, so anything but 206 is treated
    /// as a transfer failure.
    async fn append_range(
        &self,
        client: &ClientWithMiddleware,
        url: &Url,
        dest: &Path,
        offset: u64,
    ) -> Result<(), SyncError> {
        let range = HeaderValue::from_str(&format!("bytes={}-", offset)).map_err(|e| {
            SyncError::Other {
                message: "internal error: invalid range header value".to_string(),
                origin: Box::new(e),
            }
        })?;
        let resp = client.get(url.clone()).header(RANGE, range).send().await?;
        let mut resp = resp.error_for_status()?;
        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(SyncError::RangeIgnored {
                status: resp.status(),
            });
        }

        let file = tokio::fs::OpenOptions::new().append(true).open(dest).await?;
        let mut writer = BufWriter::new(file);
        while let Some(chunk) = resp.chunk().await? {
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;

        Ok(())
    }
}

impl SyncClientBuilder {
    fn validate(&self) -> Result<(), SyncClientBuilderError> {
        if let Some(wait_between_retries) = self.wait_between_retries {
            if wait_between_retries.is_zero() {
                return Err(SyncClientBuilderError::UninitializedField(
                    "wait_between_retries",
                ));
            }
        }
        if let Some(user_agent) = &self.user_agent {
            if user_agent.is_empty() {
                return Err(SyncClientBuilderError::UninitializedField("user_agent"));
            }
        }
        Ok(())
    }
}
