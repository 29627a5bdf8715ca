use url::Url;

pub const DEFAULT_FILENAME: &str = "terabox_video";
pub const DEFAULT_EXTENSION: &str = ".mp4";

// containers the delivery side can pass through without remuxing
const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".avi", ".mov", ".webm"];

/// Builds a safe display filename from an optional title hint and the
/// stream URL. The result never contains path separators or reserved
/// filesystem characters and always ends in a recognized media extension.
pub fn build(title: Option<&str>, stream_url: &str) -> String {
  let base = title
    .map(sanitize)
    .filter(|s| !s.is_empty())
    .or_else(|| from_url_path(stream_url))
    .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

  ensure_extension(base)
}

/// Strips characters that are illegal or dangerous in filenames.
pub fn sanitize(name: &str) -> String {
  name
    .chars()
    .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
    .filter(|c| !c.is_control())
    .collect::<String>()
    .trim()
    .to_string()
}

fn ensure_extension(name: String) -> String {
  let lower = name.to_lowercase();
  if MEDIA_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
    name
  } else {
    format!("{name}{DEFAULT_EXTENSION}")
  }
}

/// Last path segment of the URL, sanitized. None when the path is empty.
pub fn from_url_path(stream_url: &str) -> Option<String> {
  let url = Url::parse(stream_url).ok()?;
  let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
  let decoded = urlencoding::decode(segment)
    .map(|s| s.into_owned())
    .unwrap_or_else(|_| segment.to_string());
  let cleaned = sanitize(&decoded);
  (!cleaned.is_empty()).then_some(cleaned)
}
