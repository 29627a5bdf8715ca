//! Extraction heuristics for upstream response bodies.
//!
//! The resolution API is undocumented and its response shape varies: plain
//! JSON, JSON-escaped HTML fragments, redirects, challenge pages. Instead of
//! assuming one schema, extraction is an ordered table of named strategies,
//! each a pure function over the body text, evaluated until one succeeds.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// A stream URL pulled out of a response body, plus a display-name hint
/// when the body carried one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
  pub url: String,
  pub filename_hint: Option<String>,
}

pub type StrategyFn = fn(&str) -> Option<Extracted>;

pub struct Strategy {
  pub name: &'static str,
  pub run: StrategyFn,
}

/// Full cascade for resolution API responses.
pub static API_STRATEGIES: &[Strategy] = &[
  Strategy { name: "json-fields", run: json_fields },
  Strategy { name: "quality-keyed", run: quality_keyed },
  Strategy { name: "hls-manifest", run: hls_manifest },
  Strategy { name: "direct-media", run: direct_media },
];

/// Pattern-only cascade for the source-page fallback, where the body is
/// HTML and a JSON envelope is never present.
pub static PAGE_STRATEGIES: &[Strategy] = &[
  Strategy { name: "quality-keyed", run: quality_keyed },
  Strategy { name: "hls-manifest", run: hls_manifest },
  Strategy { name: "direct-media", run: direct_media },
];

/// Runs a cascade in order, returning the first hit.
pub fn run(strategies: &[Strategy], body: &str) -> Option<Extracted> {
  for strategy in strategies {
    if let Some(found) = (strategy.run)(body) {
      tracing::debug!(strategy = strategy.name, url = %found.url, "extracted stream url");
      return Some(found);
    }
  }
  None
}

const STREAM_URL_KEYS: &[&str] = &["url", "stream_url", "play_url", "video_url"];
const TITLE_KEYS: &[&str] = &["filename", "title", "name"];
const WRAPPER_KEYS: &[&str] = &["data", "result"];

/// Structured JSON: stream-URL and title fields, checked at the top level
/// and one level under common wrapper keys.
fn json_fields(body: &str) -> Option<Extracted> {
  let value: Value = serde_json::from_str(body).ok()?;
  let map = value.as_object()?;

  let url = lookup(map, STREAM_URL_KEYS)?;
  let title = lookup(map, TITLE_KEYS);

  Some(Extracted {
    url: unescape(&url),
    filename_hint: title,
  })
}

fn lookup(
  map: &serde_json::Map<String, Value>,
  keys: &[&str],
) -> Option<String> {
  for key in keys {
    if let Some(s) = map.get(*key).and_then(nonempty_str) {
      return Some(s);
    }
  }
  for wrapper in WRAPPER_KEYS {
    if let Some(inner) = map.get(*wrapper).and_then(Value::as_object) {
      for key in keys {
        if let Some(s) = inner.get(*key).and_then(nonempty_str) {
          return Some(s);
        }
      }
    }
  }
  None
}

fn nonempty_str(value: &Value) -> Option<String> {
  value
    .as_str()
    .filter(|s| !s.is_empty())
    .map(|s| s.to_string())
}

// highest preferred quality first, then the generic play-url label
const QUALITY_LABELS: &[&str] = &["1080p", "720p", "480p", "360p", "play_url"];

static QUALITY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> =
  LazyLock::new(|| {
    QUALITY_LABELS
      .iter()
      .map(|label| {
        let pattern = format!(r#""{label}"\s*:\s*"([^"]+)""#);
        (*label, Regex::new(&pattern).unwrap())
      })
      .collect()
  });

/// Resolution-keyed quoted values, e.g. `"720p":"https:\/\/cdn\/v.mp4"`.
fn quality_keyed(body: &str) -> Option<Extracted> {
  for (label, re) in QUALITY_PATTERNS.iter() {
    if let Some(caps) = re.captures(body) {
      let url = unescape(&caps[1]);
      if url.starts_with("http") {
        tracing::debug!(label, "matched quality-keyed stream url");
        return Some(Extracted {
          url,
          filename_hint: None,
        });
      }
    }
  }
  None
}

// `[^"'\s<>]` deliberately admits backslashes so JSON-escaped `\/` paths
// match; unescape() cleans them up afterwards.
static HLS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"https?:(?:\\?/){2}[^"'\s<>]+?\.m3u8[^"'\s<>]*"#).unwrap()
});

/// Embedded segmented-playlist manifest links, escaped variants included.
fn hls_manifest(body: &str) -> Option<Extracted> {
  HLS_PATTERN.find(body).map(|m| Extracted {
    url: unescape(m.as_str()),
    filename_hint: None,
  })
}

static MEDIA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"https?:(?:\\?/){2}[^"'\s<>]+?\.(?:mp4|mkv|avi|mov|webm)[^"'\s<>]*"#)
    .unwrap()
});

/// Direct media-file links, escaped variants included.
fn direct_media(body: &str) -> Option<Extracted> {
  MEDIA_PATTERN.find(body).map(|m| Extracted {
    url: unescape(m.as_str()),
    filename_hint: None,
  })
}

/// Undoes JSON-string escaping of slashes and colons and drops any trailing
/// backslash picked up from an escaped closing quote.
fn unescape(url: &str) -> String {
  url
    .replace("\\/", "/")
    .replace("\\:", ":")
    .trim_end_matches('\\')
    .to_string()
}

// strings that identify bot-verification / CAPTCHA interstitials
const CHALLENGE_MARKERS: &[&str] = &[
  "just a moment",
  "checking your browser",
  "cf-chl",
  "captcha",
  "verify you are human",
  "attention required",
  "ddos-guard",
];

/// True when the body looks like an anti-bot challenge page rather than
/// real content.
pub fn looks_like_challenge(body: &str) -> bool {
  let lower = body.to_lowercase();
  CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
}
