use clap::Parser;
use std::path::PathBuf;

/// Synchronize a set of remote files into a local directory, verifying each
/// against an MD5 checksum manifest and resuming interrupted downloads.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Path to the URL list, one download URL per line.
    pub urls: PathBuf,

    /// Path to the checksum manifest, one "<md5>  <filename>" line per file.
    pub checksums: PathBuf,

    /// Directory the files are synchronized into.
    #[arg(short, long, default_value = ".")]
    pub target_dir: PathBuf,

    /// Number of retries for a transient network error on a single request.
    #[arg(long)]
    pub retry: Option<u32>,

    /// Seconds to wait between retries (can be fractional).
    #[arg(long)]
    pub waitretry: Option<f64>,

    /// Custom User-Agent sent with every request.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Proxy URL used for all requests.
    #[arg(long)]
    pub proxy: Option<String>,

    /// Explicit config file path. Defaults to bulksync.toml inside the
    /// target directory, if present.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_files_and_defaults() {
        let args = Args::parse_from(["bulksync", "urls.txt", "sums.md5"]);
        assert_eq!(args.urls, PathBuf::from("urls.txt"));
        assert_eq!(args.checksums, PathBuf::from("sums.md5"));
        assert_eq!(args.target_dir, PathBuf::from("."));
        assert!(args.retry.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "bulksync",
            "urls.txt",
            "sums.md5",
            "--target-dir",
            "/data",
            "--retry",
            "7",
            "--waitretry",
            "0.5",
            "--proxy",
            "http://localhost:3128",
        ]);
        assert_eq!(args.target_dir, PathBuf::from("/data"));
        assert_eq!(args.retry, Some(7));
        assert_eq!(args.waitretry, Some(0.5));
        assert_eq!(args.proxy.as_deref(), Some("http://localhost:3128"));
    }

    #[test]
    fn missing_positionals_are_an_error() {
        assert!(Args::try_parse_from(["bulksync", "urls.txt"]).is_err());
    }
}
