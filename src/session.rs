/// Why a file ended up as [FileOutcome::Failed]. Lets a caller distinguish
/// transient network corruption from a manifest error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The transfer itself failed; any partial bytes are kept for a resume.
    Transfer,
    /// Checksum mismatch after a full transfer; the file was deleted so a
    /// later run never resumes from wrong content.
    Corrupt,
    /// Checksum mismatch after a resumed transfer; the file is left on disk
    /// for a subsequent operator retry.
    ResumeCorrupt,
}

/// Terminal state of one manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Local file already matched its checksum, no transfer performed.
    Verified,
    /// Fresh full download, checksum verified.
    Downloaded,
    /// Interrupted prior transfer completed via a byte-range request.
    Resumed,
    /// Corrupt or stale local file replaced by a full redownload.
    Redownloaded,
    /// Remote size could not be determined, so no resumption decision could
    /// be made for this entry.
    SkippedNoRemoteSize,
    Failed(FailureReason),
}

impl FileOutcome {
    /// Whether the entry ended with a local file matching its checksum.
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            FileOutcome::Verified
                | FileOutcome::Downloaded
                | FileOutcome::Resumed
                | FileOutcome::Redownloaded
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub filename: String,
    pub outcome: FileOutcome,
}

/// Run-scoped counters and per-file log. Created at the start of a run,
/// discarded at the end, never persisted.
#[derive(Debug)]
pub struct SyncSession {
    total: usize,
    processed: u64,
    valid: u64,
    invalid: u64,
    fresh: u64,
    resumed: u64,
    redownloaded: u64,
    corrupted: u64,
    failed: u64,
    resume_corrupt: u64,
    no_remote_size: u64,
    reports: Vec<FileReport>,
}

impl SyncSession {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            valid: 0,
            invalid: 0,
            fresh: 0,
            resumed: 0,
            redownloaded: 0,
            corrupted: 0,
            failed: 0,
            resume_corrupt: 0,
            no_remote_size: 0,
            reports: Vec::with_capacity(total),
        }
    }

    pub fn record(&mut self, filename: &str, outcome: FileOutcome) {
        self.processed += 1;
        match outcome {
            FileOutcome::Verified => self.valid += 1,
            FileOutcome::Downloaded => {
                self.fresh += 1;
                self.valid += 1;
            }
            FileOutcome::Resumed => {
                self.resumed += 1;
                self.valid += 1;
            }
            FileOutcome::Redownloaded => {
                self.redownloaded += 1;
                self.valid += 1;
            }
            FileOutcome::SkippedNoRemoteSize => self.no_remote_size += 1,
            FileOutcome::Failed(FailureReason::Transfer) => self.failed += 1,
            FileOutcome::Failed(FailureReason::Corrupt) => self.invalid += 1,
            FileOutcome::Failed(FailureReason::ResumeCorrupt) => {
                self.invalid += 1;
                self.resume_corrupt += 1;
            }
        }
        self.reports.push(FileReport {
            filename: filename.to_string(),
            outcome,
        });
    }

    /// Counts a detected corruption (wrong checksum at equal size, or a local
    /// file larger than the remote) that triggered a delete-and-redownload.
    pub fn note_corrupted(&mut self) {
        self.corrupted += 1;
    }

    /// Counts a checksum mismatch found while the remote size was unknown.
    pub fn note_invalid(&mut self) {
        self.invalid += 1;
    }

    /// Counts an entry verified without a remote size to compare against.
    pub fn note_no_remote_size(&mut self) {
        self.no_remote_size += 1;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn valid(&self) -> u64 {
        self.valid
    }

    pub fn invalid(&self) -> u64 {
        self.invalid
    }

    pub fn fresh(&self) -> u64 {
        self.fresh
    }

    pub fn resumed(&self) -> u64 {
        self.resumed
    }

    pub fn redownloaded(&self) -> u64 {
        self.redownloaded
    }

    pub fn corrupted(&self) -> u64 {
        self.corrupted
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn resume_corrupt(&self) -> u64 {
        self.resume_corrupt
    }

    pub fn no_remote_size(&self) -> u64 {
        self.no_remote_size
    }

    pub fn reports(&self) -> &[FileReport] {
        &self.reports
    }

    /// True when every manifest entry ended with a verified local file.
    pub fn all_valid(&self) -> bool {
        self.valid as usize == self.total
    }

    /// Emits the end-of-run summary. Always called, even when every file
    /// failed.
    pub fn log_summary(&self) {
        tracing::info!(
            processed = self.processed,
            valid = self.valid,
            invalid = self.invalid,
            fresh = self.fresh,
            resumed = self.resumed,
            redownloaded = self.redownloaded,
            corrupted = self.corrupted,
            failed = self.failed,
            resume_corrupt = self.resume_corrupt,
            no_remote_size = self.no_remote_size,
            "session summary"
        );

        if self.all_valid() {
            tracing::info!("all files successfully synchronized");
            return;
        }
        if self.failed > 0 {
            tracing::warn!("{} failed transfers, re-run to attempt to fix", self.failed);
        }
        if self.resume_corrupt > 0 {
            tracing::warn!(
                "{} corrupted files after resumed download, re-run to attempt to fix",
                self.resume_corrupt
            );
        }
        if self.invalid > 0 {
            tracing::warn!("{} corrupted files, re-run to attempt to fix", self.invalid);
        }
        if self.no_remote_size > 0 {
            tracing::warn!(
                "{} files skipped because the remote size could not be determined",
                self.no_remote_size
            );
        }
    }
}
