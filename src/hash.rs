use digest::Digest;
use md5::Md5;
use std::path::Path;
use tokio::io::{self as async_io, AsyncRead, AsyncReadExt, BufReader};

/// Length of a hex-encoded MD5 digest, the checksum format used by the
/// manifest's checksum file.
pub const MD5_HEX_LEN: usize = 32;

/// Running MD5 digest, updated chunk-by-chunk as bytes are written to disk
/// so fresh downloads need no separate re-read pass.
pub struct StreamingMd5 {
    hasher: Md5,
}

impl StreamingMd5 {
    pub fn new() -> Self {
        Self { hasher: Md5::new() }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Consumes the digest and returns the lowercase hex encoding.
    pub fn finalize_hex(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl Default for StreamingMd5 {
    fn default() -> Self {
        Self::new()
    }
}

/// Hashes the contents of an async reader, returning the lowercase hex digest.
pub async fn md5_hex_of_reader<R: AsyncRead + Unpin>(mut reader: R) -> async_io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Recomputes the digest of a pre-existing file by reading it back from disk.
pub async fn md5_hex_of_file<P: AsRef<Path>>(path: P) -> async_io::Result<String> {
    let file = tokio::fs::File::open(path.as_ref()).await?;
    md5_hex_of_reader(BufReader::new(file)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn md5_hex_known_vector() {
        let hash = md5_hex_of_reader(&b"hello world"[..]).await.unwrap();
        assert_eq!(hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[tokio::test]
    async fn md5_hex_empty_input() {
        let hash = md5_hex_of_reader(&b""[..]).await.unwrap();
        assert_eq!(hash, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn streaming_digest_matches_one_shot() {
        let mut streaming = StreamingMd5::new();
        streaming.update(b"hello ");
        streaming.update(b"world");
        assert_eq!(streaming.finalize_hex(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn streaming_digest_empty() {
        let streaming = StreamingMd5::new();
        assert_eq!(streaming.finalize_hex(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn md5_hex_of_file_reads_back_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"hello world").unwrap();
        let hash = md5_hex_of_file(&path).await.unwrap();
        assert_eq!(hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[tokio::test]
    async fn md5_hex_of_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = md5_hex_of_file(dir.path().join("missing.bin")).await;
        assert!(result.is_err());
    }
}
