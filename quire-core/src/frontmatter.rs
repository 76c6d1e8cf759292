//! Front matter parsing from content files.

use crate::models::Frontmatter;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrontmatterError {
    #[error("No front matter block")]
    Missing,

    #[error("Invalid YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Front matter must be a mapping of keys to values")]
    NotAMapping,
}

impl FrontmatterError {
    /// Line of the file the error points at; the YAML block starts on line 2
    pub fn line(&self) -> Option<usize> {
        match self {
            FrontmatterError::YamlError(err) => err.location().map(|l| l.line() + 1),
            _ => None,
        }
    }
}

static FRONTMATTER_REGEX: OnceLock<Regex> = OnceLock::new();

fn frontmatter_regex() -> &'static Regex {
    FRONTMATTER_REGEX.get_or_init(|| {
        Regex::new(r"(?s)\A---[ \t]*\r?\n(.*?\r?\n)??---[ \t]*(?:\r?\n|\z)(.*)\z").unwrap()
    })
}

/// Raw pieces of a file with a front matter block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split<'a> {
    pub yaml: &'a str,
    pub body: &'a str,
    /// 1-based line on which the body starts
    pub body_line: usize,
}

/// Split a file into its YAML block and body without parsing the YAML
pub fn split_frontmatter(content: &str) -> Option<Split<'_>> {
    let captures = frontmatter_regex().captures(content)?;
    let yaml = captures.get(1).map_or("", |m| m.as_str());
    let body = captures.get(2)?;
    let body_line = content[..body.start()].matches('\n').count() + 1;

    Some(Split {
        yaml,
        body: body.as_str(),
        body_line,
    })
}

/// Parse front matter from a content file
///
/// Returns a tuple of (frontmatter, body). Files without a front matter block
/// yield [`FrontmatterError::Missing`]; an empty block yields defaults.
///
/// # Example
///
/// ```
/// use quire_core::frontmatter::parse_frontmatter;
///
/// let content = "---\nlayout: post\ntitle: Sizing in SwiftUI\n---\n# Hello\n";
///
/// let (fm, body) = parse_frontmatter(content).unwrap();
/// assert_eq!(fm.title.as_deref(), Some("Sizing in SwiftUI"));
/// assert_eq!(fm.layout.as_deref(), Some("post"));
/// assert!(body.starts_with("# Hello"));
/// ```
pub fn parse_frontmatter(content: &str) -> Result<(Frontmatter, String), FrontmatterError> {
    let split = split_frontmatter(content).ok_or(FrontmatterError::Missing)?;
    let frontmatter = parse_block(split.yaml)?;
    Ok((frontmatter, split.body.to_string()))
}

/// Parse the YAML between the `---` markers
pub fn parse_block(yaml: &str) -> Result<Frontmatter, FrontmatterError> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    match value {
        // empty block or only comments
        serde_yaml::Value::Null => Ok(Frontmatter::default()),
        serde_yaml::Value::Mapping(_) => Ok(serde_yaml::from_value(value)?),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

/// Extract just the front matter without the body
pub fn extract_frontmatter(content: &str) -> Option<Frontmatter> {
    parse_frontmatter(content).ok().map(|(fm, _)| fm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_frontmatter() {
        let content = r#"---
layout: post
title: Wrapping a collection view
tags: [swiftui, uikit]
---

# Hello World

This is the content."#;

        let (fm, body) = parse_frontmatter(content).unwrap();
        assert_eq!(fm.title(), Some("Wrapping a collection view"));
        assert_eq!(fm.layout_name(), Some("post"));
        assert_eq!(fm.tags, vec!["swiftui", "uikit"]);
        assert!(body.contains("# Hello World"));
        assert!(body.contains("This is the content."));
    }

    #[test]
    fn test_parse_minimal_frontmatter() {
        let content = "---\ntitle: Minimal Post\n---\n\nContent here.";

        let (fm, body) = parse_frontmatter(content).unwrap();
        assert_eq!(fm.title(), Some("Minimal Post"));
        assert_eq!(fm.layout, None);
        assert!(body.contains("Content here"));
    }

    #[test]
    fn test_empty_block_gives_defaults() {
        let (fm, body) = parse_frontmatter("---\n---\nBody").unwrap();
        assert_eq!(fm.title, None);
        assert!(fm.published);
        assert_eq!(body, "Body");

        let (fm, _) = parse_frontmatter("---\n# just a comment\n---\n").unwrap();
        assert_eq!(fm.layout, None);
    }

    #[test]
    fn test_crlf_line_endings() {
        let content = "---\r\nlayout: page\r\ntitle: About\r\n---\r\nHi\r\n";
        let (fm, body) = parse_frontmatter(content).unwrap();
        assert_eq!(fm.layout_name(), Some("page"));
        assert_eq!(body, "Hi\r\n");
    }

    #[test]
    fn test_parse_no_frontmatter() {
        let content = "# Just Content\n\nNo front matter here.";
        assert!(matches!(
            parse_frontmatter(content),
            Err(FrontmatterError::Missing)
        ));
        assert!(extract_frontmatter(content).is_none());
    }

    #[test]
    fn test_closing_marker_must_be_its_own_line() {
        let content = "---\ntitle: x\n----\nstill yaml?\n---\nbody";
        let split = split_frontmatter(content).unwrap();
        assert_eq!(split.yaml, "title: x\n----\nstill yaml?\n");
        assert_eq!(split.body, "body");
    }

    #[test]
    fn test_body_line() {
        let content = "---\nlayout: post\ntitle: T\n---\nfirst body line\n";
        let split = split_frontmatter(content).unwrap();
        assert_eq!(split.body_line, 5);
    }

    #[test]
    fn test_unpublished_flag() {
        let (fm, _) = parse_frontmatter("---\ntitle: Draft\npublished: false\n---\n").unwrap();
        assert!(!fm.published);
    }

    #[test]
    fn test_invalid_yaml() {
        let content = "---\ntitle: Test\ninvalid yaml: [unclosed\n---\n\nContent.";
        assert!(matches!(
            parse_frontmatter(content),
            Err(FrontmatterError::YamlError(_))
        ));
    }

    #[test]
    fn test_scalar_block_is_rejected() {
        let content = "---\njust a string\n---\nbody";
        assert!(matches!(
            parse_frontmatter(content),
            Err(FrontmatterError::NotAMapping)
        ));
    }
}
