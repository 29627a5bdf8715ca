use terabox_dl::{Config, Pipeline};
use tracing_subscriber::EnvFilter;

/// Thin CLI runner: each argument is treated as a share link and pushed
/// through the pipeline. The chat front end embeds the library directly.
#[tokio::main]
async fn main() -> std::process::ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let links: Vec<String> = std::env::args().skip(1).collect();
  if links.is_empty() {
    eprintln!("usage: terabox-dl <share-link>...");
    return std::process::ExitCode::FAILURE;
  }

  let pipeline = Pipeline::new(Config::from_env());
  let mut failed = false;

  for link in links {
    match pipeline.process(&link).await {
      Ok(download) => {
        println!("{}\t{}", download.path.display(), download.filename);
      }
      Err(err) => {
        eprintln!("{link}: {err}");
        failed = true;
      }
    }
  }

  if failed {
    std::process::ExitCode::FAILURE
  } else {
    std::process::ExitCode::SUCCESS
  }
}
