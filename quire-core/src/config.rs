//! Site configuration parsing and management (`_config.yml`).

use crate::models::ArticleKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "_config.yml";
pub const MANIFEST_FILENAME: &str = "Gemfile";

/// Paths excluded from every build in addition to `exclude`
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "Gemfile",
    "Gemfile.lock",
    "node_modules",
    "vendor",
    ".jekyll-cache",
    ".sass-cache",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Main configuration struct matching the `_config.yml` schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Scheme and host, e.g. `https://example.com`
    #[serde(default)]
    pub url: String,

    /// Subpath the site is served from, e.g. `/blog`
    #[serde(default)]
    pub baseurl: String,

    #[serde(default = "default_permalink")]
    pub permalink: String,

    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub plugins: Vec<String>,

    #[serde(default)]
    pub show_drafts: bool,

    #[serde(default)]
    pub future: bool,

    #[serde(default)]
    pub unpublished: bool,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub defaults: Vec<FrontmatterDefault>,

    // Directory the config was loaded from (the site source)
    #[serde(skip)]
    source_dir: PathBuf,
}

fn default_title() -> String {
    String::from("My Blog")
}

fn default_permalink() -> String {
    String::from("date")
}

fn default_destination() -> PathBuf {
    PathBuf::from("_site")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_path")]
    pub path: String,

    #[serde(default = "default_posts_limit")]
    pub posts_limit: usize,
}

fn default_feed_path() -> String {
    String::from("feed.xml")
}

fn default_posts_limit() -> usize {
    10
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            path: default_feed_path(),
            posts_limit: default_posts_limit(),
        }
    }
}

/// A `defaults:` entry: front matter values applied to files in scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontmatterDefault {
    #[serde(default)]
    pub scope: DefaultScope,
    #[serde(default)]
    pub values: DefaultValues,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultScope {
    /// Path prefix relative to the site root; empty matches everything
    #[serde(default)]
    pub path: String,

    /// `posts`, `drafts` or `pages`; absent matches every kind
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultValues {
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub toc: Option<bool>,
}

impl DefaultScope {
    fn matches(&self, rel_path: &str, kind: ArticleKind) -> bool {
        let kind_ok = match self.kind.as_deref() {
            None | Some("") => true,
            Some(k) => k == kind.scope_name(),
        };
        let prefix = self.path.trim().trim_matches('/');
        let path_ok = prefix.is_empty()
            || rel_path == prefix
            || rel_path.starts_with(&format!("{}/", prefix));
        kind_ok && path_ok
    }
}

impl Config {
    /// Load configuration from a YAML file; its directory becomes the site source
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        config.source_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(config)
    }

    /// Parse configuration text; the source directory is the current directory
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        // an empty _config.yml is valid and means "all defaults"
        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        let mut config: Config = if value.is_null() {
            serde_yaml::from_str("{}")?
        } else {
            serde_yaml::from_value(value)?
        };
        config.source_dir = PathBuf::from(".");
        Ok(config)
    }

    /// Configuration with every default, rooted at `source_dir`
    pub fn for_source<P: AsRef<Path>>(source_dir: P) -> Self {
        Self {
            title: default_title(),
            description: String::new(),
            author: None,
            email: None,
            url: String::new(),
            baseurl: String::new(),
            permalink: default_permalink(),
            destination: default_destination(),
            exclude: Vec::new(),
            plugins: Vec::new(),
            show_drafts: false,
            future: false,
            unpublished: false,
            feed: FeedConfig::default(),
            defaults: Vec::new(),
            source_dir: source_dir.as_ref().to_path_buf(),
        }
    }

    /// Directory containing the site content
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Output directory, resolved relative to the source directory
    pub fn destination_dir(&self) -> PathBuf {
        self.resolve_path(&self.destination)
    }

    /// Path of the dependency manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.source_dir.join(MANIFEST_FILENAME)
    }

    /// Resolve an arbitrary path relative to the source directory
    pub fn resolve_relative(&self, path: &Path) -> PathBuf {
        self.resolve_path(path)
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.source_dir.join(path)
        }
    }

    /// Exclusion patterns: built-in defaults followed by `exclude`
    pub fn exclude_patterns(&self) -> Vec<String> {
        DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(self.exclude.iter().cloned())
            .collect()
    }

    /// Front matter defaults for a file, later entries overriding earlier ones
    pub fn defaults_for(&self, rel_path: &str, kind: ArticleKind) -> DefaultValues {
        let mut merged = DefaultValues::default();
        for entry in self
            .defaults
            .iter()
            .filter(|d| d.scope.matches(rel_path, kind))
        {
            if entry.values.layout.is_some() {
                merged.layout = entry.values.layout.clone();
            }
            if entry.values.permalink.is_some() {
                merged.permalink = entry.values.permalink.clone();
            }
            if entry.values.toc.is_some() {
                merged.toc = entry.values.toc;
            }
        }
        merged
    }

    /// Get a config value by its `site.` name, for `{{ site.x }}`
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "title" => Some(self.title.clone()),
            "description" => Some(self.description.clone()),
            "author" => self.author.clone(),
            "email" => self.email.clone(),
            "url" => Some(self.url.clone()),
            "baseurl" => Some(self.baseurl.clone()),
            _ => None,
        }
    }

    /// Normalized base URL with leading and trailing slash ("/foo/" or "/")
    pub fn normalized_base_url(&self) -> String {
        normalize_base_url(&self.baseurl)
    }
}

/// Ensure base URLs have a leading and trailing slash
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let mut s = trimmed.to_string();
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    if !s.ends_with('/') {
        s.push('/');
    }

    // Collapse duplicate slashes
    while s.contains("//") {
        s = s.replace("//", "/");
    }

    s
}
