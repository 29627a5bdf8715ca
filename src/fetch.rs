use std::path::{Path, PathBuf};
use std::process::Stdio;

use bytes::Bytes;
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::Command;
use tracing::{info, warn};

use crate::resolve::{browser_headers, ResolvedStream, StreamKind};
use crate::{Config, PipelineError, Result};

// anything under this is an error page, not media
const MIN_DIRECT_BYTES: u64 = 512;

// remuxed playlists have a larger minimum viable size
const MIN_REMUX_BYTES: u64 = 100 * 1024;

const WRITE_BUFFER_BYTES: usize = 64 * 1024;

/// A completed download. The file is owned by the caller from here on;
/// the fetcher never deletes it after success.
#[derive(Debug)]
pub struct Download {
  pub path: PathBuf,
  pub filename: String,
}

/// Retrieves resolved streams into the download directory, either by
/// streaming HTTP bytes or by remuxing a segmented playlist with ffmpeg.
pub struct Fetcher {
  client: reqwest::Client,
  config: Config,
}

impl Fetcher {
  pub fn new(config: Config) -> Self {
    let client = reqwest::Client::builder()
      .timeout(config.download_timeout)
      .redirect(reqwest::redirect::Policy::limited(10))
      // the hosting CDN serves media from hosts with mismatched certs
      .danger_accept_invalid_certs(true)
      .build()
      .expect("failed to build fetcher HTTP client");
    Self { client, config }
  }

  /// Downloads the stream to a collision-free path under the download
  /// directory. Partial files are removed on every failure path.
  pub async fn fetch(&self, stream: &ResolvedStream) -> Result<Download> {
    tokio::fs::create_dir_all(&self.config.download_dir)
      .await
      .map_err(|e| PipelineError::fetch_failed(stream.url(), e.to_string()))?;

    let path = self.unique_path(stream.filename());

    let outcome = match stream.kind() {
      StreamKind::Direct => self.fetch_direct(stream, &path).await,
      StreamKind::Playlist => self.fetch_playlist(stream, &path).await,
    };

    if let Err(err) = outcome {
      remove_partial(&path).await;
      return Err(err);
    }

    info!(path = %path.display(), "download complete");
    Ok(Download {
      path,
      filename: stream.filename().to_string(),
    })
  }

  async fn fetch_direct(
    &self,
    stream: &ResolvedStream,
    path: &Path,
  ) -> Result<()> {
    let url = stream.url();
    let secs = self.config.download_timeout.as_secs();
    let limit = self.config.max_file_size;

    let resp = self
      .client
      .get(url)
      .headers(browser_headers())
      .send()
      .await
      .map_err(|e| PipelineError::from_reqwest(url, secs, e))?;

    if !resp.status().is_success() {
      return Err(PipelineError::fetch_failed(
        url,
        format!("stream returned status {}", resp.status()),
      ));
    }

    // reject declared-oversize payloads before touching the disk
    if let Some(declared) = resp.content_length() {
      if declared > limit {
        return Err(PipelineError::TooLarge { declared, limit });
      }
    }

    let file = File::create(path)
      .await
      .map_err(|e| PipelineError::fetch_failed(url, e.to_string()))?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_BYTES, file);

    let mut body = resp.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = body.next().await {
      let chunk: Bytes =
        chunk.map_err(|e| PipelineError::from_reqwest(url, secs, e))?;
      written += chunk.len() as u64;
      // servers without Content-Length still get the ceiling enforced
      if written > limit {
        return Err(PipelineError::TooLarge {
          declared: written,
          limit,
        });
      }
      writer
        .write_all(&chunk)
        .await
        .map_err(|e| PipelineError::fetch_failed(url, e.to_string()))?;
    }
    writer
      .flush()
      .await
      .map_err(|e| PipelineError::fetch_failed(url, e.to_string()))?;

    if written < MIN_DIRECT_BYTES {
      return Err(PipelineError::fetch_failed(
        url,
        format!("implausibly small output ({written} bytes)"),
      ));
    }

    Ok(())
  }

  /// Remuxes a segmented playlist into a single container via ffmpeg,
  /// stream-copying (no re-encode) under a wall-clock ceiling. The child
  /// is killed if the ceiling is hit; no orphan survives any exit path.
  async fn fetch_playlist(
    &self,
    stream: &ResolvedStream,
    path: &Path,
  ) -> Result<()> {
    let url = stream.url();
    let secs = self.config.remux_timeout.as_secs();

    let mut cmd = Command::new(&self.config.ffmpeg_bin);
    cmd
      .arg("-protocol_whitelist")
      .arg("file,http,https,tcp,tls,crypto")
      .arg("-allowed_extensions")
      .arg("ALL")
      .arg("-i")
      .arg(url)
      .arg("-c")
      .arg("copy")
      .arg("-bsf:a")
      .arg("aac_adtstoasc")
      .arg("-y")
      .arg(path)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    let output = tokio::time::timeout(self.config.remux_timeout, cmd.output())
      .await
      .map_err(|_| PipelineError::Timeout {
        url: url.to_string(),
        secs,
      })?
      .map_err(|e| PipelineError::fetch_failed(url, e.to_string()))?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let tail: String = stderr
        .lines()
        .rev()
        .take(3)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("; ");
      warn!("remux failed: {tail}");
      return Err(PipelineError::fetch_failed(
        url,
        format!("remux exited with {}", output.status),
      ));
    }

    let size = tokio::fs::metadata(path)
      .await
      .map(|m| m.len())
      .unwrap_or(0);
    if size < MIN_REMUX_BYTES {
      return Err(PipelineError::fetch_failed(
        url,
        format!("implausibly small remux output ({size} bytes)"),
      ));
    }

    Ok(())
  }

  /// On-disk name with a random token so concurrent downloads resolving to
  /// the same suggested filename never clobber each other.
  fn unique_path(&self, filename: &str) -> PathBuf {
    let token: u32 = rand::random();
    let (stem, ext) = match filename.rsplit_once('.') {
      Some((stem, ext)) => (stem, ext),
      None => (filename, "mp4"),
    };
    self
      .config
      .download_dir
      .join(format!("{stem}.{token:08x}.{ext}"))
  }
}

async fn remove_partial(path: &Path) {
  if tokio::fs::remove_file(path).await.is_ok() {
    warn!(path = %path.display(), "removed partial download");
  }
}
