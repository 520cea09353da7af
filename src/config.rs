use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{fs, io};

pub const CONFIG_FILE_NAME: &str = "bulksync.toml";

/// Optional sync client configuration. Fields are optional so that
/// unspecified values can fall back to CLI flags and code defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub user_agent: Option<String>,
    pub max_retries: Option<u32>,
    /// wait between retries in seconds (can be fractional)
    pub wait_between_retries_secs: Option<f64>,
    pub proxy: Option<String>,
    /// connect timeout in seconds (can be fractional)
    pub connect_timeout_secs: Option<f64>,
}

impl Config {
    /// Path to the config file inside the provided target dir.
    pub fn config_path_for_dir<P: AsRef<Path>>(target_dir: P) -> PathBuf {
        let mut p = target_dir.as_ref().to_path_buf();
        p.push(CONFIG_FILE_NAME);
        p
    }

    /// Load configuration from the given directory's `bulksync.toml`.
    /// If the file does not exist, returns Ok(Default::default()).
    pub fn load_from_dir<P: AsRef<Path>>(target_dir: P) -> Result<Config, io::Error> {
        let path = Config::config_path_for_dir(target_dir);
        if !path.exists() {
            return Ok(Config::default());
        }
        Config::load_from_path(&path)
    }

    /// Load configuration from an explicit path. A missing file is an error
    /// here, since the operator asked for it.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config, io::Error> {
        let s = fs::read_to_string(path.as_ref())?;
        let cfg: Config =
            toml::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from_dir(dir.path()).unwrap();
        assert!(cfg.max_retries.is_none());
        assert!(cfg.user_agent.is_none());
    }

    #[test]
    fn loads_values_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = Config::config_path_for_dir(dir.path());
        fs::write(
            &path,
            "max_retries = 5\nwait_between_retries_secs = 0.25\nuser_agent = \"custom/1.0\"\n",
        )
        .unwrap();
        let cfg = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(cfg.max_retries, Some(5));
        assert_eq!(cfg.wait_between_retries_secs, Some(0.25));
        assert_eq!(cfg.user_agent.as_deref(), Some("custom/1.0"));
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from_path(dir.path().join("nope.toml"));
        assert!(result.is_err());
    }
}
