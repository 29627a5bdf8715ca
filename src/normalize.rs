use crate::{PipelineError, Result};

/// Substring that must appear in a canonical link. Containment (rather than
/// strict host parsing) is deliberately permissive; see DESIGN.md.
const DOMAIN_MARKER: &str = "terabox";

// mirror hosts observed in the wild, rewritten to the canonical domain.
// must run before the marker check: several aliases don't contain it.
const DOMAIN_ALIASES: &[(&str, &str)] = &[
  ("teraboxlink.com", "terabox.com"),
  ("teraboxapp.com", "terabox.com"),
  ("terasharelink.com", "terabox.com"),
  ("terafileshare.com", "terabox.com"),
  ("1024tera.com", "terabox.com"),
  ("4funbox.com", "terabox.com"),
  ("mirrobox.com", "terabox.com"),
  ("momerybox.com", "terabox.com"),
];

/// A user-supplied string that survived validation. `canonical` always
/// starts with an http(s) scheme and contains the hosting domain marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
  raw: String,
  canonical: String,
}

impl LinkCandidate {
  pub fn raw(&self) -> &str {
    &self.raw
  }

  pub fn canonical(&self) -> &str {
    &self.canonical
  }
}

/// Validates and canonicalizes free-form chat text into a link candidate.
/// Pure; fails closed with `InvalidInput`.
pub fn normalize(raw: &str) -> Result<LinkCandidate> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(PipelineError::InvalidInput(raw.to_string()));
  }

  let lower = trimmed.to_lowercase();
  if !lower.starts_with("http://") && !lower.starts_with("https://") {
    return Err(PipelineError::InvalidInput(raw.to_string()));
  }

  // messages often carry trailing chatter after the link
  let url = trimmed.split_whitespace().next().unwrap_or(trimmed);

  let mut canonical = url.to_string();
  // canonical form always starts with a literal http:// or https://
  let scheme_len = if lower.starts_with("https://") { 8 } else { 7 };
  canonical[..scheme_len].make_ascii_lowercase();
  for (alias, target) in DOMAIN_ALIASES {
    if canonical.to_ascii_lowercase().contains(alias) {
      canonical = replace_ignore_case(&canonical, alias, target);
      break;
    }
  }

  if !canonical.to_lowercase().contains(DOMAIN_MARKER) {
    return Err(PipelineError::InvalidInput(raw.to_string()));
  }

  Ok(LinkCandidate {
    raw: raw.to_string(),
    canonical,
  })
}

// ascii lowering keeps byte offsets stable, so slicing the original at the
// match position is safe even for non-ascii surroundings
fn replace_ignore_case(haystack: &str, needle: &str, with: &str) -> String {
  let lower = haystack.to_ascii_lowercase();
  match lower.find(&needle.to_ascii_lowercase()) {
    Some(pos) => {
      let mut out = String::with_capacity(haystack.len());
      out.push_str(&haystack[..pos]);
      out.push_str(with);
      out.push_str(&haystack[pos + needle.len()..]);
      out
    }
    None => haystack.to_string(),
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn rejects_non_http_input() {
    for raw in ["", "   ", "terabox.com/s/abc", "ftp://terabox.com/s/abc"] {
      assert!(matches!(
        normalize(raw),
        Err(PipelineError::InvalidInput(_))
      ));
    }
  }

  #[test]
  fn rejects_links_without_domain_marker() {
    assert!(normalize("https://example.com/s/abc123").is_err());
  }

  #[test]
  fn accepts_plain_terabox_link() {
    let c = normalize("  https://terabox.com/s/abc123 \n").unwrap();
    assert_eq!(c.canonical(), "https://terabox.com/s/abc123");
  }

  #[test]
  fn uppercase_scheme_is_accepted_and_lowercased() {
    let c = normalize("HTTPS://terabox.com/s/abc123").unwrap();
    assert_eq!(c.canonical(), "https://terabox.com/s/abc123");

    let c = normalize("Http://terabox.com/s/abc123").unwrap();
    assert_eq!(c.canonical(), "http://terabox.com/s/abc123");
  }

  #[test]
  fn rewrites_known_alias_before_marker_check() {
    let c = normalize("https://teraboxlink.com/s/abc123").unwrap();
    assert_eq!(c.canonical(), "https://terabox.com/s/abc123");

    // alias without the marker in it only passes because of the rewrite
    let c = normalize("https://1024tera.com/s/abc123").unwrap();
    assert_eq!(c.canonical(), "https://terabox.com/s/abc123");
  }

  #[test]
  fn takes_first_token_from_chat_text() {
    let c =
      normalize("https://terabox.com/s/abc123 please download this").unwrap();
    assert_eq!(c.canonical(), "https://terabox.com/s/abc123");
  }
}
