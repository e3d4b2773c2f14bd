//! Content preprocessing: strip trailing reference sections and footnote
//! markers from extracted source text before generation.
//!
//! Deterministic, no failure modes. `clean_references` is idempotent for
//! inputs containing at most one references-style section.

use std::sync::LazyLock;

use regex::Regex;

/// Markdown heading lines that open a references/bibliography block.
/// The cut happens at the EARLIEST match across all patterns, not the
/// first pattern that happens to match.
static REFERENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
  [
    r"(?i)\n##?\s*References?\s*\n",
    r"(?i)\n##?\s*Bibliography\s*\n",
    r"(?i)\n##?\s*Works?\s*Cited\s*\n",
    r"(?i)\n##?\s*Literature\s*\n",
    r"(?i)\n##?\s*Sources?\s*\n",
    r"(?i)\n##?\s*Tài liệu tham khảo\s*\n",
  ]
  .iter()
  .map(|p| Regex::new(p).expect("static reference pattern compiles"))
  .collect()
});

static FOOTNOTE_MARKER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\[\d+\]").expect("static footnote pattern compiles"));

static EXCESS_NEWLINES: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\n{3,}").expect("static newline pattern compiles"));

/// Remove the references/bibliography tail, bracketed footnote markers like
/// `[12]`, and excessive blank runs. Returns the trimmed original when no
/// header pattern matches.
pub fn clean_references(content: &str) -> String {
  let mut earliest = content.len();
  for pattern in REFERENCE_PATTERNS.iter() {
    if let Some(m) = pattern.find(content) {
      if m.start() < earliest {
        earliest = m.start();
      }
    }
  }

  let cleaned = content[..earliest].trim();
  let cleaned = FOOTNOTE_MARKER.replace_all(cleaned, "");
  let cleaned = EXCESS_NEWLINES.replace_all(&cleaned, "\n\n");
  cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cuts_before_references_heading() {
    let text = "Body paragraph one.\n\nMore body.\n\n## References\n\n[1] Someone, 2019.";
    let out = clean_references(text);
    assert_eq!(out, "Body paragraph one.\n\nMore body.");
  }

  #[test]
  fn cut_is_case_insensitive_and_single_hash() {
    let text = "Body.\n\n# BIBLIOGRAPHY\nStuff.";
    assert_eq!(clean_references(text), "Body.");
  }

  #[test]
  fn cuts_at_earliest_match_across_patterns() {
    // "Sources" appears before "References": the earlier position wins even
    // though "References" is checked first.
    let text = "Body.\n\n## Sources\nlist\n\n## References\nlist";
    assert_eq!(clean_references(text), "Body.");
  }

  #[test]
  fn strips_footnote_markers_and_collapses_newlines() {
    let text = "A claim[1] and another[23].\n\n\n\nNext paragraph.";
    let out = clean_references(text);
    assert_eq!(out, "A claim and another.\n\nNext paragraph.");
  }

  #[test]
  fn no_match_returns_trimmed_original() {
    let text = "  Just a document with no tail sections.  ";
    assert_eq!(clean_references(text), "Just a document with no tail sections.");
  }

  #[test]
  fn clean_is_idempotent() {
    let text = "Intro[2] text.\n\n\n\nBody.\n\n## Works Cited\nW, 2020.";
    let once = clean_references(text);
    let twice = clean_references(&once);
    assert_eq!(once, twice);
  }

  #[test]
  fn vietnamese_reference_heading_is_recognized() {
    let text = "Nội dung chính.\n\n## Tài liệu tham khảo\nDanh sách.";
    assert_eq!(clean_references(text), "Nội dung chính.");
  }
}
