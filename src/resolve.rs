use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::extract::{self, Extracted, API_STRATEGIES, PAGE_STRATEGIES};
use crate::normalize::LinkCandidate;
use crate::{filename, Config, PipelineError, Result};

// delay before the single retry on an anti-bot challenge
const CHALLENGE_RETRY_DELAY: Duration = Duration::from_secs(2);

// the resolution API and the origin site both reject obvious non-browser
// user agents, so every request pretends to be one
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
   AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

pub(crate) fn browser_headers() -> HeaderMap {
  let mut headers = HeaderMap::new();
  headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
  headers.insert(
    header::ACCEPT,
    HeaderValue::from_static("text/html,application/json,*/*;q=0.8"),
  );
  headers.insert(
    header::ACCEPT_LANGUAGE,
    HeaderValue::from_static("en-US,en;q=0.9"),
  );
  headers
}

/// How the resolved bytes are delivered upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
  /// Plain file behind an HTTP URL.
  Direct,
  /// Segmented playlist (HLS manifest); needs a remux pass.
  Playlist,
}

/// A playable media reference produced by exactly one successful extraction
/// heuristic. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ResolvedStream {
  url: String,
  filename: String,
  kind: StreamKind,
}

impl ResolvedStream {
  /// Classifies the stream and derives a safe filename from the title hint
  /// or, failing that, the URL path.
  pub fn new(url: String, title_hint: Option<&str>) -> Self {
    let kind = if url.contains(".m3u8") {
      StreamKind::Playlist
    } else {
      StreamKind::Direct
    };
    let filename = filename::build(title_hint, &url);
    Self {
      url,
      filename,
      kind,
    }
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  pub fn filename(&self) -> &str {
    &self.filename
  }

  pub fn kind(&self) -> StreamKind {
    self.kind
  }
}

/// Resolves canonical source links to playable stream URLs by querying the
/// resolution API and, when that fails, scraping the source page itself.
pub struct Resolver {
  client: reqwest::Client,
  config: Config,
}

impl Resolver {
  pub fn new(config: Config) -> Self {
    let client = reqwest::Client::builder()
      .timeout(config.request_timeout)
      .redirect(reqwest::redirect::Policy::limited(10))
      .build()
      .expect("failed to build resolver HTTP client");
    Self { client, config }
  }

  /// Resolution cascade, in strict priority order: API status handling,
  /// single anti-bot retry, extraction heuristics over the API body, then
  /// the source page as a last resort.
  pub async fn resolve(
    &self,
    candidate: &LinkCandidate,
  ) -> Result<ResolvedStream> {
    let source_url = candidate.canonical();
    let api_url = self.config.api_url(source_url);
    let mut challenge_seen = false;

    info!(source = %source_url, "resolving stream url");

    if let Some(stream) = self.try_api(&api_url, &mut challenge_seen).await? {
      return Ok(stream);
    }

    if let Some(stream) = self
      .try_source_page(source_url, &mut challenge_seen)
      .await
    {
      return Ok(stream);
    }

    if challenge_seen {
      Err(PipelineError::AntiBotDetected {
        url: source_url.to_string(),
      })
    } else {
      Err(PipelineError::ResolutionFailed {
        url: source_url.to_string(),
        status: None,
      })
    }
  }

  /// Queries the resolution API. `Ok(None)` means "keep cascading";
  /// errors are terminal for the whole resolution.
  async fn try_api(
    &self,
    api_url: &str,
    challenge_seen: &mut bool,
  ) -> Result<Option<ResolvedStream>> {
    let (status, final_url, mut body) = self.get(api_url).await?;

    if status == StatusCode::NOT_FOUND {
      // link invalid or expired; no other avenue will help
      return Err(PipelineError::ResolutionFailed {
        url: api_url.to_string(),
        status: Some(404),
      });
    }

    if !status.is_success() {
      if final_url != api_url {
        // the API bounced us somewhere else; treat the redirect target as
        // a low-confidence candidate stream
        info!(target = %final_url, "using redirect target as candidate stream");
        return Ok(Some(ResolvedStream::new(final_url, None)));
      }
      return Err(PipelineError::ResolutionFailed {
        url: api_url.to_string(),
        status: Some(status.as_u16()),
      });
    }

    if extract::looks_like_challenge(&body) {
      *challenge_seen = true;
      warn!("anti-bot challenge from resolution api, retrying once");
      tokio::time::sleep(CHALLENGE_RETRY_DELAY).await;

      // connection resets are a common challenge symptom; anything short
      // of a timeout keeps the cascade going so the source page still
      // gets its turn
      let (status, _, retry_body) = match self.get(api_url).await {
        Ok(resp) => resp,
        Err(err @ PipelineError::Timeout { .. }) => return Err(err),
        Err(err) => {
          warn!("challenge retry failed: {err}");
          return Ok(None);
        }
      };
      if !status.is_success() || extract::looks_like_challenge(&retry_body) {
        return Ok(None);
      }
      body = retry_body;
    }

    Ok(extract::run(API_STRATEGIES, &body).map(from_extracted))
  }

  /// Last resort: fetch the original source page and run the pattern
  /// heuristics over it. Transport failures here only end the cascade.
  async fn try_source_page(
    &self,
    source_url: &str,
    challenge_seen: &mut bool,
  ) -> Option<ResolvedStream> {
    debug!(url = %source_url, "falling back to source page");

    let (status, _, body) = match self.get(source_url).await {
      Ok(resp) => resp,
      Err(e) => {
        warn!("source page fetch failed: {e}");
        return None;
      }
    };

    if extract::looks_like_challenge(&body) {
      *challenge_seen = true;
      return None;
    }
    if !status.is_success() {
      return None;
    }

    extract::run(PAGE_STRATEGIES, &body).map(from_extracted)
  }

  async fn get(&self, url: &str) -> Result<(StatusCode, String, String)> {
    let secs = self.config.request_timeout.as_secs();
    let resp = self
      .client
      .get(url)
      .headers(browser_headers())
      .send()
      .await
      .map_err(|e| transport_error(url, secs, e))?;

    let status = resp.status();
    let final_url = resp.url().as_str().to_string();
    let body = resp
      .text()
      .await
      .map_err(|e| transport_error(url, secs, e))?;

    Ok((status, final_url, body))
  }
}

// resolution may only fail as resolution-failed, anti-bot or timeout, so a
// non-timeout transport error here is a resolution failure, not a fetch one
fn transport_error(url: &str, secs: u64, err: reqwest::Error) -> PipelineError {
  if err.is_timeout() {
    PipelineError::Timeout {
      url: url.to_string(),
      secs,
    }
  } else {
    warn!("transport error contacting {url}: {err}");
    PipelineError::ResolutionFailed {
      url: url.to_string(),
      status: None,
    }
  }
}

fn from_extracted(found: Extracted) -> ResolvedStream {
  ResolvedStream::new(found.url, found.filename_hint.as_deref())
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn stream_kind_classification() {
    let direct =
      ResolvedStream::new("https://cdn.example/v.mp4".to_string(), None);
    assert_eq!(direct.kind(), StreamKind::Direct);
    assert_eq!(direct.filename(), "v.mp4");

    let playlist = ResolvedStream::new(
      "https://cdn.example/live/master.m3u8?tok=1".to_string(),
      None,
    );
    assert_eq!(playlist.kind(), StreamKind::Playlist);
  }

  #[test]
  fn title_hint_wins_over_url_path() {
    let stream = ResolvedStream::new(
      "https://cdn.example/v.mp4".to_string(),
      Some("My Clip"),
    );
    assert_eq!(stream.filename(), "My Clip.mp4");
  }
}
