use thiserror::Error;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Classified pipeline outcome. Carries enough context for the caller to
/// pick a user-facing message; never produces one itself.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("not a usable link: {0:?}")]
  InvalidInput(String),

  #[error("could not resolve {url} (upstream status: {status:?})")]
  ResolutionFailed { url: String, status: Option<u16> },

  #[error("anti-bot challenge served for {url}")]
  AntiBotDetected { url: String },

  #[error("file too large: {declared} bytes (limit {limit})")]
  TooLarge { declared: u64, limit: u64 },

  #[error("fetch failed for {url}: {reason}")]
  FetchFailed { url: String, reason: String },

  #[error("timed out after {secs}s talking to {url}")]
  Timeout { url: String, secs: u64 },
}

impl PipelineError {
  pub fn fetch_failed(
    url: impl Into<String>,
    reason: impl Into<String>,
  ) -> Self {
    PipelineError::FetchFailed {
      url: url.into(),
      reason: reason.into(),
    }
  }

  /// Maps a transport error onto the taxonomy, keeping timeouts distinct.
  pub fn from_reqwest(url: &str, secs: u64, err: reqwest::Error) -> Self {
    if err.is_timeout() {
      PipelineError::Timeout {
        url: url.to_string(),
        secs,
      }
    } else {
      PipelineError::FetchFailed {
        url: url.to_string(),
        reason: err.to_string(),
      }
    }
  }
}
