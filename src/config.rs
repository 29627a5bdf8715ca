use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://iteraplay.com/api/play.php";
const DEFAULT_API_KEY: &str = "iTeraPlay2025";

// 2 GiB, matching the upstream hoster's free-tier cap
const DEFAULT_MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Everything the pipeline consumes from the embedding application.
/// The pipeline owns none of this; callers construct it once and share it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
  /// Base URL of the resolution API (no query string).
  pub api_base: String,
  /// API key appended to every resolution request.
  pub api_key: String,
  /// Timeout for resolution API and fallback page requests.
  pub request_timeout: Duration,
  /// Timeout for streaming a direct file to disk.
  pub download_timeout: Duration,
  /// Wall-clock ceiling for the remux subprocess.
  pub remux_timeout: Duration,
  /// Hard ceiling on downloaded file size, checked against Content-Length
  /// and again while streaming.
  pub max_file_size: u64,
  /// Directory downloads are written into. Created on demand.
  pub download_dir: PathBuf,
  /// Remuxing tool binary, resolved via PATH unless absolute.
  pub ffmpeg_bin: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api_base: DEFAULT_API_BASE.to_string(),
      api_key: DEFAULT_API_KEY.to_string(),
      request_timeout: Duration::from_secs(30),
      download_timeout: Duration::from_secs(300),
      remux_timeout: Duration::from_secs(600),
      max_file_size: DEFAULT_MAX_FILE_SIZE,
      download_dir: PathBuf::from("./downloads"),
      ffmpeg_bin: "ffmpeg".to_string(),
    }
  }
}

impl Config {
  /// Reads overrides from the environment, falling back to defaults.
  pub fn from_env() -> Self {
    let mut cfg = Config::default();

    if let Ok(base) = std::env::var("TERABOX_API_BASE") {
      cfg.api_base = base;
    }
    if let Ok(key) = std::env::var("TERABOX_API_KEY") {
      cfg.api_key = key;
    }
    if let Some(secs) = env_u64("TIMEOUT") {
      cfg.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = env_u64("DOWNLOAD_TIMEOUT") {
      cfg.download_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = env_u64("REMUX_TIMEOUT") {
      cfg.remux_timeout = Duration::from_secs(secs);
    }
    if let Some(bytes) = env_u64("MAX_FILE_SIZE") {
      cfg.max_file_size = bytes;
    }
    if let Ok(dir) = std::env::var("DOWNLOAD_DIR") {
      cfg.download_dir = PathBuf::from(dir);
    }
    if let Ok(bin) = std::env::var("FFMPEG_BIN") {
      cfg.ffmpeg_bin = bin;
    }

    cfg
  }

  /// Resolution API request URL for a canonical source link.
  pub fn api_url(&self, source_url: &str) -> String {
    format!(
      "{}?url={}&key={}",
      self.api_base,
      urlencoding::encode(source_url),
      self.api_key
    )
  }
}

fn env_u64(name: &str) -> Option<u64> {
  std::env::var(name).ok().and_then(|s| s.parse().ok())
}
