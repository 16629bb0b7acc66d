//! Default values shared by configuration and the HTTP adapter.

/// Configuration file read by [`ReelmergeConfig::load`](crate::config::ReelmergeConfig::load).
pub const DEFAULT_CONFIG_FILE: &str = "reelmerge.toml";

/// Directory for uploaded chunks.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Directory for combined outputs.
pub const DEFAULT_OUTPUT_DIR: &str = "outputs";

/// File extension for chunks and outputs.
pub const DEFAULT_CHUNK_EXTENSION: &str = "mp4";

/// Merges allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_MERGES: usize = 4;

/// Largest accepted `expected_count`.
pub const DEFAULT_MAX_EXPECTED_CHUNKS: u32 = 1000;

/// Listen address of the HTTP adapter.
pub const DEFAULT_BIND: &str = "0.0.0.0:5000";

/// Largest accepted chunk upload body (512 MiB).
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 512 * 1024 * 1024;
