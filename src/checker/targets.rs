// src/checker/targets.rs
// =============================================================================
// This module turns a plain text file into the list of sites to check.
//
// Format (one entry per line):
//   https://example.com      <- a target
//   # Partner sites          <- a comment, ignored
//                            <- blank lines are ignored
//   example.org              <- invalid: no http:// or https:// prefix
//
// Invalid lines never stop a run. They are collected so the caller can tell
// the user how many lines were skipped.
// =============================================================================

use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// A single site to check.
///
/// Construction goes through `Target::parse`, so every `Target` starts with
/// `http://` or `https://`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    url: String,
}

impl Target {
    /// Returns `Some(Target)` if `line` starts with a supported scheme.
    pub fn parse(line: &str) -> Option<Self> {
        if line.starts_with("http://") || line.starts_with("https://") {
            Some(Self {
                url: line.to_string(),
            })
        } else {
            None
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// True when the URL declares the https scheme.
    ///
    /// This is only a scheme check. The certificate itself is not inspected.
    pub fn is_secure(&self) -> bool {
        self.url.starts_with("https://")
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

// The outcome of reading a target file: the usable targets (in file order)
// plus every line we had to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetList {
    pub targets: Vec<Target>,
    pub invalid: Vec<String>,
}

impl TargetList {
    pub fn invalid_count(&self) -> usize {
        self.invalid.len()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read target file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// Parses target lines from already-loaded text
//
// Every line is trimmed first, so "  https://a.com  " is accepted and
// Windows line endings (\r\n) do not leak into the URL.
pub fn parse_targets(text: &str) -> TargetList {
    let mut list = TargetList::default();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match Target::parse(line) {
            Some(target) => list.targets.push(target),
            None => list.invalid.push(line.to_string()),
        }
    }

    if !list.invalid.is_empty() {
        warn!(count = list.invalid.len(), lines = ?list.invalid, "skipping invalid target lines");
    }

    list
}

// Reads a target file from disk and parses it
pub fn load_target_file(path: &Path) -> Result<TargetList, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_targets(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_keeps_only_http_lines() {
        let list = parse_targets("https://example.com\nnot-a-url\nhttp://example.org\n");
        let urls: Vec<&str> = list.targets.iter().map(Target::url).collect();
        assert_eq!(urls, vec!["https://example.com", "http://example.org"]);
        assert_eq!(list.invalid_count(), 1);
        assert_eq!(list.invalid, vec!["not-a-url".to_string()]);
    }

    #[test]
    fn test_skips_comments_and_blank_lines() {
        let text = "# main sites\n\n   \nhttps://a.com\n#https://commented.com\n";
        let list = parse_targets(text);
        assert_eq!(list.targets.len(), 1);
        assert_eq!(list.invalid_count(), 0);
    }

    #[test]
    fn test_trims_whitespace_and_crlf() {
        let list = parse_targets("  https://a.com  \r\nhttp://b.com\r\n");
        assert_eq!(list.targets[0].url(), "https://a.com");
        assert_eq!(list.targets[1].url(), "http://b.com");
    }

    #[test]
    fn test_keeps_original_order() {
        let list = parse_targets("http://c.com\nhttps://a.com\nftp://x.com\nhttp://b.com");
        let urls: Vec<&str> = list.targets.iter().map(Target::url).collect();
        assert_eq!(urls, vec!["http://c.com", "https://a.com", "http://b.com"]);
        assert_eq!(list.invalid, vec!["ftp://x.com".to_string()]);
    }

    #[test]
    fn test_secure_flag_follows_scheme() {
        assert!(Target::parse("https://a.com").unwrap().is_secure());
        assert!(!Target::parse("http://a.com").unwrap().is_secure());
        assert!(Target::parse("HTTPS://a.com").is_none());
    }

    #[test]
    fn test_load_target_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://example.com").unwrap();
        writeln!(file, "example.org").unwrap();

        let list = load_target_file(file.path()).unwrap();
        assert_eq!(list.targets.len(), 1);
        assert_eq!(list.invalid_count(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_target_file(Path::new("/definitely/not/here.txt"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
