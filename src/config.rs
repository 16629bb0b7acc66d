//! Service configuration.
//!
//! Configuration can be loaded from:
//! 1. TOML file (`reelmerge.toml` by default)
//! 2. Environment variables (with `REELMERGE_` prefix)
//!
//! Environment variables override TOML configuration.
//!
//! # Example TOML Configuration
//!
//! ```toml
//! [storage]
//! upload_dir = "uploads"
//! output_dir = "outputs"
//! chunk_extension = "mp4"
//!
//! [merge]
//! combiner = "ffmpeg"
//! ffmpeg_path = "/usr/bin/ffmpeg"
//! max_concurrent_merges = 4
//! max_expected_chunks = 1000
//!
//! [server]
//! bind = "0.0.0.0:5000"
//! max_chunk_bytes = 536870912
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BIND, DEFAULT_CHUNK_EXTENSION, DEFAULT_CONFIG_FILE, DEFAULT_MAX_CHUNK_BYTES,
    DEFAULT_MAX_CONCURRENT_MERGES, DEFAULT_MAX_EXPECTED_CHUNKS, DEFAULT_OUTPUT_DIR,
    DEFAULT_UPLOAD_DIR,
};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {error}")]
    Io {
        /// Path that was read.
        path: String,
        /// The I/O error message.
        error: String,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value is syntactically valid but unusable.
    #[error("invalid config value for {key}: {message}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// Why it was rejected.
        message: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelmergeConfig {
    /// Where chunks and outputs live.
    pub storage: StorageConfig,
    /// Background merge settings.
    pub merge: MergeConfig,
    /// HTTP adapter settings.
    pub server: ServerConfig,
}

impl ReelmergeConfig {
    /// Load configuration from the default file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. `reelmerge.toml` in the working directory, if present
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_toml(&read(Path::new(DEFAULT_CONFIG_FILE))?)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply
    /// environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_toml(&read(path.as_ref())?)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Rejects values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merge.max_concurrent_merges == 0 {
            return Err(ConfigError::Invalid {
                key: "merge.max_concurrent_merges",
                message: "must be at least 1".to_string(),
            });
        }
        if self.merge.max_expected_chunks == 0 {
            return Err(ConfigError::Invalid {
                key: "merge.max_expected_chunks",
                message: "must be at least 1".to_string(),
            });
        }
        if self.storage.chunk_extension.is_empty()
            || self.storage.chunk_extension.contains(['/', '\\', '.'])
        {
            return Err(ConfigError::Invalid {
                key: "storage.chunk_extension",
                message: format!("{:?} is not a plain extension", self.storage.chunk_extension),
            });
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `REELMERGE_*` overrides read through `lookup`.
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup("REELMERGE_UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("REELMERGE_OUTPUT_DIR") {
            self.storage.output_dir = PathBuf::from(dir);
        }
        if let Some(ext) = lookup("REELMERGE_CHUNK_EXTENSION") {
            self.storage.chunk_extension = ext;
        }

        if let Some(v) = lookup("REELMERGE_MAX_CONCURRENT_MERGES") {
            self.merge.max_concurrent_merges =
                parse_value("REELMERGE_MAX_CONCURRENT_MERGES", &v)?;
        }
        if let Some(v) = lookup("REELMERGE_MAX_EXPECTED_CHUNKS") {
            self.merge.max_expected_chunks = parse_value("REELMERGE_MAX_EXPECTED_CHUNKS", &v)?;
        }
        if let Some(v) = lookup("REELMERGE_COMBINER") {
            self.merge.combiner = parse_value("REELMERGE_COMBINER", &v)?;
        }
        if let Some(path) = lookup("REELMERGE_FFMPEG_PATH") {
            self.merge.ffmpeg_path = PathBuf::from(path);
        }

        if let Some(bind) = lookup("REELMERGE_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = parse_value("PORT", &port)?;
            self.server.bind = with_port(&self.server.bind, port);
        }
        if let Some(v) = lookup("REELMERGE_MAX_CHUNK_BYTES") {
            self.server.max_chunk_bytes = parse_value("REELMERGE_MAX_CHUNK_BYTES", &v)?;
        }
        Ok(())
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        error: e.to_string(),
    })
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

/// Replaces the port of a `host:port` bind address.
fn with_port(bind: &str, port: u16) -> String {
    let host = bind.rsplit_once(':').map_or(bind, |(host, _)| host);
    format!("{host}:{port}")
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploaded chunks.
    pub upload_dir: PathBuf,
    /// Directory holding combined outputs.
    pub output_dir: PathBuf,
    /// Extension used for chunk and output files.
    pub chunk_extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            chunk_extension: DEFAULT_CHUNK_EXTENSION.to_string(),
        }
    }
}

/// Which [`Combiner`](crate::combine::Combiner) to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinerKind {
    /// ffmpeg concat demuxer.
    Ffmpeg,
    /// Plain byte concatenation.
    Concat,
}

impl FromStr for CombinerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(Self::Ffmpeg),
            "concat" => Ok(Self::Concat),
            other => Err(format!("unknown combiner {other:?} (expected ffmpeg or concat)")),
        }
    }
}

/// Background merge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Combination strategy.
    pub combiner: CombinerKind,
    /// ffmpeg executable used by the ffmpeg combiner.
    pub ffmpeg_path: PathBuf,
    /// Upper bound on merges running at once.
    pub max_concurrent_merges: usize,
    /// Largest `expected_count` accepted by job creation.
    pub max_expected_chunks: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            combiner: CombinerKind::Ffmpeg,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            max_concurrent_merges: DEFAULT_MAX_CONCURRENT_MERGES,
            max_expected_chunks: DEFAULT_MAX_EXPECTED_CHUNKS,
        }
    }
}

/// HTTP adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Largest accepted upload request body.
    pub max_chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_use_local_directories() {
        let config = ReelmergeConfig::default();
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.storage.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.storage.chunk_extension, "mp4");
        assert_eq!(config.merge.combiner, CombinerKind::Ffmpeg);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ReelmergeConfig::from_toml(
            r#"
            [merge]
            combiner = "concat"
            max_concurrent_merges = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.merge.combiner, CombinerKind::Concat);
        assert_eq!(config.merge.max_concurrent_merges, 2);
        assert_eq!(config.merge.max_expected_chunks, DEFAULT_MAX_EXPECTED_CHUNKS);
        assert_eq!(config.server.bind, DEFAULT_BIND);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = ReelmergeConfig::from_toml("[merge\ncombiner=").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_win() {
        let mut config = ReelmergeConfig::from_toml("[storage]\nupload_dir = \"a\"").unwrap();
        config
            .apply_overrides(env(&[
                ("REELMERGE_UPLOAD_DIR", "/srv/in"),
                ("REELMERGE_COMBINER", "CONCAT"),
                ("REELMERGE_MAX_EXPECTED_CHUNKS", "12"),
                ("PORT", "8080"),
            ]))
            .unwrap();
        assert_eq!(config.storage.upload_dir, PathBuf::from("/srv/in"));
        assert_eq!(config.merge.combiner, CombinerKind::Concat);
        assert_eq!(config.merge.max_expected_chunks, 12);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn unparseable_override_is_reported() {
        let mut config = ReelmergeConfig::default();
        let err = config
            .apply_overrides(env(&[("REELMERGE_MAX_CONCURRENT_MERGES", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("REELMERGE_MAX_CONCURRENT_MERGES"));
    }

    #[test]
    fn validate_rejects_zero_limits_and_bad_extensions() {
        let mut config = ReelmergeConfig::default();
        config.merge.max_concurrent_merges = 0;
        assert!(config.validate().is_err());

        let mut config = ReelmergeConfig::default();
        config.storage.chunk_extension = "../mp4".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn with_port_replaces_only_the_port() {
        assert_eq!(with_port("127.0.0.1:5000", 9000), "127.0.0.1:9000");
        assert_eq!(with_port("[::1]:5000", 9000), "[::1]:9000");
    }
}
