//! Content model structs for articles, tags, diagnostics and the site index.

use crate::plugins::PluginSet;
use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Template a content file is wrapped in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Default,
    Home,
    Page,
    Post,
}

impl Layout {
    pub const ALL: [Layout; 4] = [Layout::Default, Layout::Home, Layout::Page, Layout::Post];

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "default" => Some(Layout::Default),
            "home" => Some(Layout::Home),
            "page" => Some(Layout::Page),
            "post" => Some(Layout::Post),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Default => "default",
            Layout::Home => "home",
            Layout::Page => "page",
            Layout::Post => "post",
        }
    }

    /// Comma separated list of layout names, for messages
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Where an article lives in the content tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleKind {
    Post,
    Draft,
    Page,
}

impl ArticleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleKind::Post => "post",
            ArticleKind::Draft => "draft",
            ArticleKind::Page => "page",
        }
    }

    /// Value accepted by `defaults[].scope.type` in the site config
    pub fn scope_name(&self) -> &'static str {
        match self {
            ArticleKind::Post => "posts",
            ArticleKind::Draft => "drafts",
            ArticleKind::Page => "pages",
        }
    }

    pub fn is_post_like(&self) -> bool {
        matches!(self, ArticleKind::Post | ArticleKind::Draft)
    }
}

/// Front matter metadata from content files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frontmatter {
    #[serde(default, deserialize_with = "scalar_string")]
    pub layout: Option<String>,

    #[serde(default, deserialize_with = "scalar_string")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "scalar_string")]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub categories: Vec<String>,

    #[serde(default, deserialize_with = "scalar_string")]
    pub category: Option<String>,

    #[serde(default, deserialize_with = "scalar_string")]
    pub permalink: Option<String>,

    #[serde(default = "default_true")]
    pub published: bool,

    #[serde(default, deserialize_with = "scalar_string")]
    pub excerpt: Option<String>,

    #[serde(default, deserialize_with = "scalar_string")]
    pub description: Option<String>,

    #[serde(default)]
    pub toc: Option<bool>,

    /// Keys quire does not interpret (available to `{{ page.x }}`)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Frontmatter {
    fn default() -> Self {
        Self {
            layout: None,
            title: None,
            date: None,
            tags: Vec::new(),
            categories: Vec::new(),
            category: None,
            permalink: None,
            published: true,
            excerpt: None,
            description: None,
            toc: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Frontmatter {
    /// Title with surrounding whitespace removed, if non-empty
    pub fn title(&self) -> Option<&str> {
        non_empty(self.title.as_deref())
    }

    /// Layout name with surrounding whitespace removed, if non-empty
    pub fn layout_name(&self) -> Option<&str> {
        non_empty(self.layout.as_deref())
    }

    /// `categories` plus the singular `category` key
    pub fn all_categories(&self) -> Vec<String> {
        let mut cats = self.categories.clone();
        if let Some(cat) = non_empty(self.category.as_deref()) {
            for c in cat.split_whitespace() {
                if !cats.iter().any(|existing| existing == c) {
                    cats.push(c.to_string());
                }
            }
        }
        cats
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn default_true() -> bool {
    true
}

/// Accept `title: 2021` or `title: true` as text
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(de::Error::custom("expected a string, number or boolean")),
    }
}

/// Accept `tags: [a, b]`, `tags: "a b"` or an empty key
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<serde_yaml::Value>),
    }

    let value: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(match value {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s.split_whitespace().map(str::to_string).collect(),
        Some(OneOrMany::Many(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_yaml::Value::String(s) => Some(s.trim().to_string()),
                serde_yaml::Value::Number(n) => Some(n.to_string()),
                serde_yaml::Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
    })
}

/// A single post, draft or page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub kind: ArticleKind,

    /// Filename stem (`2021-03-14-collection-views`), the key for `post_url`
    pub id: String,

    /// URL slug (`collection-views`)
    pub slug: String,

    pub title: String,

    pub layout: Layout,

    /// Publication date (filename date for posts unless overridden)
    pub date: Option<NaiveDate>,

    pub tags: Vec<String>,

    pub categories: Vec<String>,

    /// Original front matter
    pub frontmatter: Frontmatter,

    /// Source path relative to the site root, `/` separated
    pub source_path: String,

    /// Output path relative to the destination (no leading slash)
    pub output_path: String,

    /// Rendered HTML body
    pub content_html: String,

    /// Table of contents HTML (only when the article has headings)
    pub toc_html: Option<String>,

    /// Plain-text summary used on listings and in the feed
    pub excerpt: Option<String>,

    /// Whether the layout should show the table of contents sidebar
    pub show_toc: bool,

    /// Body text without front matter
    pub raw_body: String,

    /// 1-based line of the source file on which the body starts
    pub body_line: usize,
}

impl Article {
    /// URL path for this article (`/2021/03/14/x.html`, `/about/`)
    pub fn url(&self) -> String {
        format!("/{}", pretty_path(&self.output_path))
    }

    /// URL including the site base path
    pub fn url_with_base(&self, base_url: &str) -> String {
        format!(
            "{}{}",
            crate::config::normalize_base_url(base_url),
            pretty_path(&self.output_path)
        )
    }

    pub fn is_post(&self) -> bool {
        self.kind.is_post_like()
    }

    /// Description for meta tags: front matter description, then excerpt, then title
    pub fn description(&self) -> String {
        self.frontmatter
            .description
            .clone()
            .or_else(|| self.excerpt.clone())
            .unwrap_or_else(|| self.title.clone())
    }

    pub fn date_string(&self) -> Option<String> {
        self.date.map(|d| d.format("%Y-%m-%d").to_string())
    }
}

fn pretty_path(output_path: &str) -> &str {
    if output_path == "index.html" {
        ""
    } else {
        output_path.strip_suffix("/index.html").map_or(output_path, |dir| {
            // keep the trailing slash of the directory
            &output_path[..dir.len() + 1]
        })
    }
}

/// A non-content file copied verbatim into the destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticFile {
    /// Absolute path on disk
    pub source: PathBuf,

    /// Path relative to the site root, `/` separated
    pub rel_path: String,
}

/// Tag name to article indices, newest first
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TagIndex {
    pub tags: BTreeMap<String, Vec<usize>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from articles; only posts and drafts are indexed
    pub fn from_articles(articles: &[Article]) -> Self {
        let mut tags: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, article) in articles.iter().enumerate() {
            if !article.is_post() {
                continue;
            }
            for tag in &article.tags {
                let entry = tags.entry(tag.clone()).or_default();
                if !entry.contains(&idx) {
                    entry.push(idx);
                }
            }
        }

        for indices in tags.values_mut() {
            indices.sort_by(|a, b| compare_newest_first(&articles[*a], &articles[*b]));
        }

        Self { tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn articles<'a>(&self, tag: &str, articles: &'a [Article]) -> Vec<&'a Article> {
        self.tags
            .get(tag)
            .map(|indices| indices.iter().map(|i| &articles[*i]).collect())
            .unwrap_or_default()
    }
}

/// Order articles newest first, falling back to title for equal dates
pub fn compare_newest_first(a: &Article, b: &Article) -> std::cmp::Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.id.cmp(&b.id))
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// A content or manifest problem found while loading, building or linting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable machine-readable code (`frontmatter.title`, `link.broken`, ...)
    pub code: String,
    pub message: String,
    pub severity: DiagnosticSeverity,
    pub source_path: Option<String>,
    /// 1-based line number
    pub line: Option<usize>,
    pub context: Option<String>,
}

impl Diagnostic {
    pub fn new(
        severity: DiagnosticSeverity,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity,
            source_path: None,
            line: None,
            context: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, code, message)
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, code, message)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Info, code, message)
    }

    pub fn with_source(mut self, source_path: impl Into<String>) -> Self {
        self.source_path = Some(source_path.into());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Complete build result: rendered articles, tag index and diagnostics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SiteIndex {
    pub articles: Vec<Article>,
    pub tags: TagIndex,
    pub static_files: Vec<StaticFile>,
    pub plugins: PluginSet,
    pub diagnostics: Vec<Diagnostic>,
}

impl SiteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts (and drafts, when built with drafts), newest first
    pub fn posts(&self) -> Vec<&Article> {
        let mut posts: Vec<&Article> = self.articles.iter().filter(|a| a.is_post()).collect();
        posts.sort_by(|a, b| compare_newest_first(a, b));
        posts
    }

    pub fn pages(&self) -> Vec<&Article> {
        self.articles
            .iter()
            .filter(|a| a.kind == ArticleKind::Page)
            .collect()
    }

    /// Find a post by its filename stem
    pub fn find_by_id(&self, id: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.is_post() && a.id == id)
    }

    pub fn find_by_output_path(&self, output_path: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.output_path == output_path)
    }

    /// Whether an article or static file writes `output_path`
    pub fn writes_output(&self, output_path: &str) -> bool {
        self.find_by_output_path(output_path).is_some()
            || self.static_files.iter().any(|f| f.rel_path == output_path)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }
}
