//! Content discovery and article loading.
//!
//! Posts live in `_posts/YYYY-MM-DD-slug.md`, drafts in `_drafts/`, and any
//! other markdown file with front matter is a page. Everything else that is
//! not excluded is copied verbatim.

use crate::{
    config::Config,
    frontmatter::{parse_frontmatter, split_frontmatter, FrontmatterError},
    models::{Article, ArticleKind, Diagnostic, Layout, StaticFile},
    permalink::{
        expand_permalink, has_dot_segments, output_path_for, page_output_path, PermalinkVars,
    },
    slug::{slugify, unslugify},
};
use chrono::NaiveDate;
use regex::Regex;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use walkdir::WalkDir;

pub const POSTS_DIR: &str = "_posts";
pub const DRAFTS_DIR: &str = "_drafts";
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown", "mkd", "mkdn"];

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}: {source}")]
    Frontmatter {
        path: String,
        #[source]
        source: FrontmatterError,
    },

    #[error("{0}: post filenames must look like YYYY-MM-DD-title.md")]
    InvalidPostFilename(String),

    #[error("{path}: invalid date '{value}'")]
    InvalidDate { path: String, value: String },

    #[error("{0}: not valid UTF-8")]
    Encoding(String),
}

impl ContentError {
    /// Diagnostic for a file that could not be loaded; I/O failures stay errors
    pub fn into_diagnostic(self) -> Result<Diagnostic, std::io::Error> {
        let diagnostic = match self {
            ContentError::Io(io) => return Err(io),
            ContentError::Frontmatter { path, source } => {
                let code = match source {
                    FrontmatterError::Missing => "frontmatter.missing",
                    _ => "frontmatter.invalid",
                };
                let diagnostic = Diagnostic::error(code, source.to_string()).with_source(path);
                match source.line() {
                    Some(line) => diagnostic.at_line(line),
                    None => diagnostic,
                }
            }
            ContentError::InvalidPostFilename(path) => Diagnostic::error(
                "filename.date",
                "Post filenames must start with a YYYY-MM-DD- date",
            )
            .with_source(path),
            ContentError::InvalidDate { path, value } => Diagnostic::error(
                "frontmatter.invalid",
                format!("Invalid date '{}', expected YYYY-MM-DD", value),
            )
            .with_source(path),
            ContentError::Encoding(path) => {
                Diagnostic::error("content.encoding", "File is not valid UTF-8").with_source(path)
            }
        };
        Ok(diagnostic)
    }
}

/// Files found under the site source, classified
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub posts: Vec<PathBuf>,
    pub drafts: Vec<PathBuf>,
    pub pages: Vec<PathBuf>,
    pub static_files: Vec<StaticFile>,
}

impl Discovery {
    /// Content files paired with their kind, drafts only when requested
    pub fn content_files(&self, include_drafts: bool) -> Vec<(PathBuf, ArticleKind)> {
        let mut files: Vec<(PathBuf, ArticleKind)> = self
            .posts
            .iter()
            .map(|p| (p.clone(), ArticleKind::Post))
            .collect();
        if include_drafts {
            files.extend(self.drafts.iter().map(|p| (p.clone(), ArticleKind::Draft)));
        }
        files.extend(self.pages.iter().map(|p| (p.clone(), ArticleKind::Page)));
        files
    }
}

/// An article plus the non-fatal problems found while loading it
#[derive(Debug, Clone)]
pub struct LoadedArticle {
    pub article: Article,
    pub diagnostics: Vec<Diagnostic>,
}

/// Glob-style exclusion list
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    patterns: Vec<Regex>,
}

impl ExcludeMatcher {
    /// `*` matches within one path component, `**` across components, and a
    /// pattern also excludes everything below the path it names.
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|pat| {
                let pat = pat.trim().trim_start_matches("./").trim_matches('/');
                if pat.is_empty() {
                    return None;
                }
                let re = format!("^{}(?:/.*)?$", glob_to_regex(pat));
                match Regex::new(&re) {
                    Ok(re) => Some(re),
                    Err(err) => {
                        tracing::warn!("Invalid exclude pattern '{}': {}", pat, err);
                        None
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(rel_path))
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::new();
    let mut literal = String::new();
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                ".*"
            }
            '*' => "[^/]*",
            '?' => "[^/]",
            other => {
                literal.push(other);
                continue;
            }
        };
        out.push_str(&regex::escape(&literal));
        literal.clear();
        out.push_str(token);
    }
    out.push_str(&regex::escape(&literal));
    out
}

/// Path relative to the source, with `/` separators
pub fn relative_path(source_dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(source_dir).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MARKDOWN_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn has_frontmatter_marker(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|s| s.starts_with("---"))
        .unwrap_or(false)
}

/// Walk the site source and classify every file
pub fn discover(config: &Config) -> Result<Discovery, ContentError> {
    let source_dir = config.source_dir().to_path_buf();
    let destination = config.destination_dir();
    let excludes = ExcludeMatcher::new(&config.exclude_patterns());
    let mut discovery = Discovery::default();

    let walker = WalkDir::new(&source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if entry.path() == destination {
                return false;
            }
            let name = entry.file_name().to_string_lossy();
            if (name.starts_with('_') || name.starts_with('.'))
                && name != POSTS_DIR
                && name != DRAFTS_DIR
            {
                return false;
            }
            let rel = relative_path(&source_dir, entry.path());
            if excludes.is_excluded(&rel) {
                tracing::debug!("Excluding {}", rel);
                return false;
            }
            true
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path().to_path_buf();
        let rel = relative_path(&source_dir, &path);
        let in_dir = |dir: &str| rel.split('/').any(|c| c == dir);

        if in_dir(POSTS_DIR) {
            if is_markdown(&path) {
                discovery.posts.push(path);
            } else {
                tracing::debug!("Ignoring non-markdown file in _posts: {}", rel);
            }
        } else if in_dir(DRAFTS_DIR) {
            if is_markdown(&path) {
                discovery.drafts.push(path);
            }
        } else if is_markdown(&path) && has_frontmatter_marker(&path) {
            discovery.pages.push(path);
        } else {
            discovery.static_files.push(StaticFile {
                source: path,
                rel_path: rel,
            });
        }
    }

    tracing::debug!(
        "Discovered {} posts, {} drafts, {} pages, {} static files",
        discovery.posts.len(),
        discovery.drafts.len(),
        discovery.pages.len(),
        discovery.static_files.len()
    );

    Ok(discovery)
}

static POST_FILENAME_REGEX: OnceLock<Regex> = OnceLock::new();

/// Split a post filename stem into its date and slug
///
/// ```
/// use quire_core::content::parse_post_filename;
///
/// let (date, slug) = parse_post_filename("2021-03-14-collection-views").unwrap();
/// assert_eq!(date.to_string(), "2021-03-14");
/// assert_eq!(slug, "collection-views");
/// assert!(parse_post_filename("collection-views").is_none());
/// ```
pub fn parse_post_filename(stem: &str) -> Option<(NaiveDate, String)> {
    let re = POST_FILENAME_REGEX
        .get_or_init(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})-(.+)$").unwrap());
    let caps = re.captures(stem)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    Some((date, caps[4].to_string()))
}

/// Parse a front matter date (`2021-03-14`, `2021-03-14 10:00:00 +0100`, ...)
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Read a content file as text
pub fn read_source(config: &Config, path: &Path) -> Result<String, ContentError> {
    fs::read_to_string(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::InvalidData => {
            ContentError::Encoding(relative_path(config.source_dir(), path))
        }
        _ => ContentError::Io(err),
    })
}

/// Load a content file into an [`Article`] without rendering its body
pub fn load_article(
    config: &Config,
    path: &Path,
    kind: ArticleKind,
) -> Result<LoadedArticle, ContentError> {
    let content = read_source(config, path)?;
    let rel = relative_path(config.source_dir(), path);
    let (frontmatter, body) =
        parse_frontmatter(&content).map_err(|source| ContentError::Frontmatter {
            path: rel.clone(),
            source,
        })?;
    let body_line = split_frontmatter(&content).map_or(1, |split| split.body_line);
    let mut diagnostics = Vec::new();

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let (filename_date, slug) = match kind {
        ArticleKind::Post => {
            let (date, slug) = parse_post_filename(&stem)
                .ok_or_else(|| ContentError::InvalidPostFilename(rel.clone()))?;
            (Some(date), slug)
        }
        ArticleKind::Draft | ArticleKind::Page => (None, slugify(&stem)),
    };

    let date = match frontmatter.date.as_deref() {
        Some(raw) => Some(parse_date(raw).ok_or_else(|| ContentError::InvalidDate {
            path: rel.clone(),
            value: raw.to_string(),
        })?),
        None if kind == ArticleKind::Draft => Some(chrono::Local::now().date_naive()),
        None => filename_date,
    };

    let defaults = config.defaults_for(&rel, kind);

    let layout_name = frontmatter
        .layout_name()
        .map(str::to_string)
        .or(defaults.layout.clone());
    let layout = match layout_name.as_deref() {
        Some(name) => Layout::from_name(name).unwrap_or_else(|| {
            diagnostics.push(
                Diagnostic::warning(
                    "layout.unknown",
                    format!(
                        "Unknown layout '{}', using 'default' (known: {})",
                        name,
                        Layout::names()
                    ),
                )
                .with_source(rel.clone()),
            );
            Layout::Default
        }),
        None if kind.is_post_like() => Layout::Post,
        None => Layout::Page,
    };

    let title = frontmatter
        .title()
        .map(str::to_string)
        .unwrap_or_else(|| unslugify(&slug));

    let categories = frontmatter.all_categories();
    let permalink = frontmatter.permalink.clone().or(defaults.permalink);

    let url = if kind.is_post_like() {
        let pattern = permalink.unwrap_or_else(|| config.permalink.clone());
        Some(expand_permalink(
            &pattern,
            &PermalinkVars {
                date,
                title: &slug,
                categories: &categories,
            },
        ))
    } else {
        permalink
    };
    if let Some(url) = url.as_deref().filter(|url| has_dot_segments(url)) {
        diagnostics.push(
            Diagnostic::warning(
                "permalink.invalid",
                format!("Permalink '{}' has '.' or '..' segments; they are ignored", url),
            )
            .with_source(rel.clone())
            .with_context(url.to_string()),
        );
    }
    let output_path = match url {
        Some(url) => output_path_for(&url),
        None => page_output_path(&rel),
    };

    let show_toc = frontmatter.toc.or(defaults.toc).unwrap_or(false);

    Ok(LoadedArticle {
        article: Article {
            kind,
            id: stem,
            slug,
            title,
            layout,
            date,
            tags: frontmatter.tags.clone(),
            categories,
            excerpt: frontmatter.excerpt.clone(),
            frontmatter,
            source_path: rel,
            output_path,
            content_html: String::new(),
            toc_html: None,
            show_toc,
            raw_body: body,
            body_line,
        },
        diagnostics,
    })
}
