//! Link-resolution and download pipeline for Terabox share links.
//!
//! Takes an arbitrary user-supplied string and deterministically produces
//! either a locally stored media file plus a validated filename, or a
//! classified failure. Consists of three components consumed in strict
//! sequence: URL normalizer, stream resolver, media fetcher.

mod config;
mod error;
mod extract;
mod fetch;
mod filename;
mod normalize;
mod pipeline;
mod resolve;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use fetch::{Download, Fetcher};
pub use normalize::{normalize, LinkCandidate};
pub use pipeline::Pipeline;
pub use resolve::{ResolvedStream, Resolver, StreamKind};
