use std::collections::{HashMap, HashSet};
use std::path::Path;

use reqwest::Url;
use thiserror::Error;

use crate::hash::MD5_HEX_LEN;

/// Manifest problems are structural: they indicate an upstream packaging bug,
/// not a transient condition, and abort the run before any network activity.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("URL list not found or unreadable at {path}: {source}")]
    UrlListUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("checksum file not found or unreadable at {path}: {source}")]
    ChecksumFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse checksum line {line_no}: {line:?}")]
    InvalidChecksumLine { line_no: usize, line: String },
    #[error("invalid URL on line {line_no}: {line:?}")]
    InvalidUrl { line_no: usize, line: String },
    #[error("URL on line {line_no} has no usable filename: {url}")]
    NoFilename { line_no: usize, url: String },
    #[error("no checksum entry found for {filename}")]
    MissingChecksum { filename: String },
    #[error("duplicate filename in manifest: {filename}")]
    DuplicateFilename { filename: String },
    #[error("manifest lists no files")]
    Empty,
}

/// One file to synchronize. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    url: Url,
    expected_checksum: String,
    local_filename: String,
}

impl ManifestEntry {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Lowercase hex MD5 digest the final file must match.
    pub fn expected_checksum(&self) -> &str {
        &self.expected_checksum
    }

    /// Destination filename, derived from the URL's final path segment.
    pub fn local_filename(&self) -> &str {
        &self.local_filename
    }
}

#[derive(Debug, Clone)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Loads and validates the two parallel manifest artifacts: a
    /// newline-delimited URL list and a checksum file with one
    /// `<hex-digest>  <filename>` entry per line (two-space separator).
    pub async fn load<P: AsRef<Path>>(url_list: P, checksum_file: P) -> Result<Self, ManifestError> {
        let urls_text = tokio::fs::read_to_string(url_list.as_ref())
            .await
            .map_err(|source| ManifestError::UrlListUnreadable {
                path: url_list.as_ref().display().to_string(),
                source,
            })?;
        let checksums_text = tokio::fs::read_to_string(checksum_file.as_ref())
            .await
            .map_err(|source| ManifestError::ChecksumFileUnreadable {
                path: checksum_file.as_ref().display().to_string(),
                source,
            })?;
        Self::parse(&urls_text, &checksums_text)
    }

    /// Parses manifest text. All validation of required fields happens here,
    /// once, rather than scattered through the transfer loop.
    pub fn parse(urls_text: &str, checksums_text: &str) -> Result<Self, ManifestError> {
        let checksums = parse_checksum_lines(checksums_text)?;

        let mut entries = Vec::new();
        let mut seen = HashSet::new();
        for (idx, line) in urls_text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let url = Url::parse(trimmed).map_err(|_| ManifestError::InvalidUrl {
                line_no,
                line: trimmed.to_string(),
            })?;
            let filename = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ManifestError::NoFilename {
                    line_no,
                    url: trimmed.to_string(),
                })?;
            let expected_checksum = checksums
                .get(filename.as_str())
                .cloned()
                .ok_or_else(|| ManifestError::MissingChecksum {
                    filename: filename.clone(),
                })?;
            if !seen.insert(filename.clone()) {
                return Err(ManifestError::DuplicateFilename { filename });
            }
            entries.push(ManifestEntry {
                url,
                expected_checksum,
                local_filename: filename,
            });
        }

        if entries.is_empty() {
            return Err(ManifestError::Empty);
        }

        Ok(Manifest { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_checksum_lines(text: &str) -> Result<HashMap<String, String>, ManifestError> {
    let mut checksums = HashMap::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let (digest, filename) =
            line.split_once("  ")
                .ok_or_else(|| ManifestError::InvalidChecksumLine {
                    line_no,
                    line: line.to_string(),
                })?;
        let digest = digest.trim();
        let filename = filename.trim();
        if digest.len() != MD5_HEX_LEN
            || !digest.chars().all(|c| c.is_ascii_hexdigit())
            || filename.is_empty()
        {
            return Err(ManifestError::InvalidChecksumLine {
                line_no,
                line: line.to_string(),
            });
        }
        checksums.insert(filename.to_string(), digest.to_ascii_lowercase());
    }
    Ok(checksums)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST_A: &str = "d41d8cd98f00b204e9800998ecf8427e";
    const DIGEST_B: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    #[test]
    fn parses_matching_artifacts() {
        let urls = "https://host/data/a.bin\nhttps://host/data/b.bin\n";
        let checksums = format!("{DIGEST_A}  a.bin\n{DIGEST_B}  b.bin\n");
        let manifest = Manifest::parse(urls, &checksums).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries()[0].local_filename(), "a.bin");
        assert_eq!(manifest.entries()[0].expected_checksum(), DIGEST_A);
        assert_eq!(
            manifest.entries()[1].url().as_str(),
            "https://host/data/b.bin"
        );
    }

    #[test]
    fn digest_is_lowercased_at_parse_time() {
        let urls = "https://host/a.bin\n";
        let checksums = format!("{}  a.bin\n", DIGEST_A.to_ascii_uppercase());
        let manifest = Manifest::parse(urls, &checksums).unwrap();
        assert_eq!(manifest.entries()[0].expected_checksum(), DIGEST_A);
    }

    #[test]
    fn filename_with_spaces_is_kept_whole() {
        let urls = "https://host/some%20file.bin\n";
        // the URL path segment is percent-encoded, so it must match as-is
        let checksums = format!("{DIGEST_A}  some%20file.bin\n");
        let manifest = Manifest::parse(urls, &checksums).unwrap();
        assert_eq!(manifest.entries()[0].local_filename(), "some%20file.bin");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let urls = "\nhttps://host/a.bin\n\n";
        let checksums = format!("\n{DIGEST_A}  a.bin\n\n");
        let manifest = Manifest::parse(urls, &checksums).unwrap();
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn url_without_checksum_entry_is_fatal() {
        let urls = "https://host/a.bin\nhttps://host/b.bin\n";
        let checksums = format!("{DIGEST_A}  a.bin\n");
        let err = Manifest::parse(urls, &checksums).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::MissingChecksum { filename } if filename == "b.bin"
        ));
    }

    #[test]
    fn duplicate_filenames_are_fatal() {
        let urls = "https://host/one/a.bin\nhttps://host/two/a.bin\n";
        let checksums = format!("{DIGEST_A}  a.bin\n");
        let err = Manifest::parse(urls, &checksums).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::DuplicateFilename { filename } if filename == "a.bin"
        ));
    }

    #[test]
    fn checksum_line_with_single_space_is_fatal() {
        let urls = "https://host/a.bin\n";
        let checksums = format!("{DIGEST_A} a.bin\n");
        let err = Manifest::parse(urls, &checksums).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidChecksumLine { line_no: 1, .. }
        ));
    }

    #[test]
    fn non_hex_digest_is_fatal() {
        let urls = "https://host/a.bin\n";
        let checksums = "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz  a.bin\n";
        let err = Manifest::parse(urls, checksums).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidChecksumLine { .. }));
    }

    #[test]
    fn truncated_digest_is_fatal() {
        let urls = "https://host/a.bin\n";
        let checksums = "d41d8cd9  a.bin\n";
        let err = Manifest::parse(urls, checksums).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidChecksumLine { .. }));
    }

    #[test]
    fn invalid_url_is_fatal() {
        let urls = "not a url\n";
        let checksums = format!("{DIGEST_A}  a.bin\n");
        let err = Manifest::parse(urls, &checksums).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidUrl { line_no: 1, .. }));
    }

    #[test]
    fn url_with_trailing_slash_has_no_filename() {
        let urls = "https://host/data/\n";
        let checksums = format!("{DIGEST_A}  a.bin\n");
        let err = Manifest::parse(urls, &checksums).unwrap_err();
        assert!(matches!(err, ManifestError::NoFilename { .. }));
    }

    #[test]
    fn empty_url_list_is_fatal() {
        let checksums = format!("{DIGEST_A}  a.bin\n");
        let err = Manifest::parse("", &checksums).unwrap_err();
        assert!(matches!(err, ManifestError::Empty));
    }

    #[tokio::test]
    async fn load_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let urls_path = dir.path().join("urls.txt");
        let md5_path = dir.path().join("md5sum.txt");
        std::fs::write(&urls_path, "https://host/a.bin\n").unwrap();
        std::fs::write(&md5_path, format!("{DIGEST_A}  a.bin\n")).unwrap();
        let manifest = Manifest::load(&urls_path, &md5_path).await.unwrap();
        assert_eq!(manifest.len(), 1);
    }

    #[tokio::test]
    async fn load_with_missing_url_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let md5_path = dir.path().join("md5sum.txt");
        std::fs::write(&md5_path, format!("{DIGEST_A}  a.bin\n")).unwrap();
        let err = Manifest::load(&dir.path().join("urls.txt"), &md5_path)
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::UrlListUnreadable { .. }));
    }

    #[tokio::test]
    async fn load_with_missing_checksum_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let urls_path = dir.path().join("urls.txt");
        std::fs::write(&urls_path, "https://host/a.bin\n").unwrap();
        let err = Manifest::load(&urls_path, &dir.path().join("md5sum.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::ChecksumFileUnreadable { .. }));
    }
}
