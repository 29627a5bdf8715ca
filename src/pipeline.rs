use tracing::info;

use crate::fetch::{Download, Fetcher};
use crate::normalize;
use crate::resolve::Resolver;
use crate::{Config, Result};

/// The whole link-to-file pipeline: normalize, resolve, fetch.
///
/// Stateless across calls; every invocation is independent, so one
/// `Pipeline` can be shared by any number of concurrent tasks. Delivery,
/// accounting and cleanup of the returned file belong to the caller.
pub struct Pipeline {
  resolver: Resolver,
  fetcher: Fetcher,
}

impl Pipeline {
  pub fn new(config: Config) -> Self {
    Self {
      resolver: Resolver::new(config.clone()),
      fetcher: Fetcher::new(config),
    }
  }

  /// Sole entry point: raw chat text in, local media file out (or a
  /// classified failure the caller maps to a user-facing message).
  pub async fn process(&self, raw: &str) -> Result<Download> {
    let candidate = normalize::normalize(raw)?;
    info!(url = %candidate.canonical(), "accepted link");

    let stream = self.resolver.resolve(&candidate).await?;
    info!(
      stream = %stream.url(),
      filename = %stream.filename(),
      kind = ?stream.kind(),
      "resolved stream"
    );

    self.fetcher.fetch(&stream).await
  }
}
