//! Site building logic - discovers content, resolves links and renders bodies.
//!
//! Building runs in two passes. The first loads every article's front matter
//! and computes its output path, producing the [`UrlMap`] that `post_url` and
//! `link` resolve against. The second renders Liquid and markdown for each
//! article with links resolved.

use crate::{
    config::Config,
    content::{self, ContentError},
    liquid::{self, LinkResolver, LiquidContext},
    manifest::{HostPlatform, Manifest},
    markdown::MarkdownProcessor,
    models::*,
    permalink::tag_output_path,
    plugins::PluginSet,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("{first} and {second} both write {path}")]
    DuplicateOutput {
        path: String,
        first: String,
        second: String,
    },
}

/// What writes a file in the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputOwner {
    Article(String),
    Static(String),
    Tag(String),
    TagIndex,
}

impl OutputOwner {
    /// Source file behind the output, for articles and static files
    pub fn source_path(&self) -> Option<&str> {
        match self {
            OutputOwner::Article(path) | OutputOwner::Static(path) => Some(path),
            OutputOwner::Tag(_) | OutputOwner::TagIndex => None,
        }
    }
}

impl fmt::Display for OutputOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputOwner::Article(path) | OutputOwner::Static(path) => f.write_str(path),
            OutputOwner::Tag(tag) => write!(f, "tag '{}'", tag),
            OutputOwner::TagIndex => f.write_str("the tag index"),
        }
    }
}

/// An output path claimed twice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConflict {
    pub path: String,
    pub first: OutputOwner,
    pub second: OutputOwner,
}

/// Output paths written by more than one article, static file or tag page
///
/// Tag pages are checked against each other and the tag index only; an
/// article or static file at a generated path replaces the generated page.
pub fn output_conflicts(articles: &[Article], static_files: &[StaticFile]) -> Vec<OutputConflict> {
    let mut conflicts = Vec::new();

    let mut files = HashMap::new();
    for article in articles {
        let owner = OutputOwner::Article(article.source_path.clone());
        claim(&mut files, &mut conflicts, &article.output_path, owner);
    }
    for file in static_files {
        let owner = OutputOwner::Static(file.rel_path.clone());
        claim(&mut files, &mut conflicts, &file.rel_path, owner);
    }

    let mut generated = HashMap::new();
    generated.insert(TAG_INDEX_PATH.to_string(), OutputOwner::TagIndex);
    for tag in TagIndex::from_articles(articles).tags.keys() {
        let owner = OutputOwner::Tag(tag.clone());
        claim(&mut generated, &mut conflicts, &tag_output_path(tag), owner);
    }

    conflicts
}

/// Output path of the generated tag listing
pub const TAG_INDEX_PATH: &str = "tags/index.html";

fn claim(
    claims: &mut HashMap<String, OutputOwner>,
    conflicts: &mut Vec<OutputConflict>,
    path: &str,
    owner: OutputOwner,
) {
    match claims.get(path) {
        Some(first) => conflicts.push(OutputConflict {
            path: path.to_string(),
            first: first.clone(),
            second: owner,
        }),
        None => {
            claims.insert(path.to_string(), owner);
        }
    }
}

/// Output URLs of every loaded article and static file
#[derive(Debug, Clone, Default)]
pub struct UrlMap {
    /// post id -> URL
    posts: HashMap<String, String>,
    /// source path -> URL
    sources: HashMap<String, String>,
}

impl UrlMap {
    pub fn new(articles: &[Article], static_files: &[StaticFile], baseurl: &str) -> Self {
        let mut map = UrlMap::default();
        for article in articles {
            let url = article.url_with_base(baseurl);
            if article.is_post() {
                map.posts.insert(article.id.clone(), url.clone());
            }
            map.sources.insert(article.source_path.clone(), url);
        }
        for file in static_files {
            map.sources.insert(
                file.rel_path.clone(),
                liquid::relative_url(baseurl, &file.rel_path),
            );
        }
        map
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl LinkResolver for UrlMap {
    fn post_url(&self, post_id: &str) -> Option<String> {
        // `{% post_url 2021-03-14-name.md %}` is tolerated
        let id = post_id.trim().trim_end_matches(".md");
        let id = id.rsplit('/').next().unwrap_or(id);
        self.posts.get(id).cloned()
    }

    fn link(&self, source_path: &str) -> Option<String> {
        self.sources
            .get(source_path.trim().trim_start_matches('/'))
            .cloned()
    }
}

/// Result of the loading pass, before bodies are rendered
#[derive(Debug, Clone, Default)]
pub struct LoadedSite {
    pub articles: Vec<Article>,
    pub static_files: Vec<StaticFile>,
    pub manifest: Option<Manifest>,
    pub plugins: PluginSet,
    pub diagnostics: Vec<Diagnostic>,
}

/// Main site builder
pub struct SiteBuilder {
    config: Config,
    processor: MarkdownProcessor,
    include_drafts: bool,
    host: HostPlatform,
}

impl SiteBuilder {
    pub fn new(config: Config) -> Self {
        let include_drafts = config.show_drafts;
        Self {
            config,
            processor: MarkdownProcessor::new(),
            include_drafts,
            host: HostPlatform::current(),
        }
    }

    /// Include `_drafts/` (in addition to `show_drafts` in the config)
    pub fn with_drafts(mut self, drafts: bool) -> Self {
        self.include_drafts = self.include_drafts || drafts;
        self
    }

    /// Evaluate manifest platform guards against `host` instead of this machine
    pub fn with_host(mut self, host: HostPlatform) -> Self {
        self.host = host;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the entire site
    pub fn build(&self) -> Result<SiteIndex, BuildError> {
        let site = self.load()?;

        let conflicts = output_conflicts(&site.articles, &site.static_files);
        if let Some(conflict) = conflicts.into_iter().next() {
            return Err(BuildError::DuplicateOutput {
                path: conflict.path,
                first: conflict.first.to_string(),
                second: conflict.second.to_string(),
            });
        }

        Ok(self.render(site))
    }

    /// First pass: discover content, load front matter, resolve plugins
    pub fn load(&self) -> Result<LoadedSite, BuildError> {
        let discovery = content::discover(&self.config)?;
        let files = discovery.content_files(self.include_drafts);
        tracing::info!("Found {} content files", files.len());

        let mut site = LoadedSite {
            static_files: discovery.static_files,
            ..LoadedSite::default()
        };
        let today = chrono::Local::now().date_naive();

        for (path, kind) in files {
            let loaded = match content::load_article(&self.config, &path, kind) {
                Ok(loaded) => loaded,
                Err(err) => {
                    let diagnostic = err.into_diagnostic()?;
                    tracing::warn!("Skipping {}", diagnostic.message);
                    site.diagnostics.push(diagnostic);
                    continue;
                }
            };
            site.diagnostics.extend(loaded.diagnostics);
            let article = loaded.article;

            if !article.frontmatter.published && !self.config.unpublished {
                tracing::debug!("Skipping unpublished {}", article.source_path);
                continue;
            }
            if article.kind == ArticleKind::Post
                && !self.config.future
                && article.date.is_some_and(|d| d > today)
            {
                tracing::debug!("Skipping future-dated {}", article.source_path);
                continue;
            }

            tracing::debug!("Loaded {} -> {}", article.source_path, article.output_path);
            site.articles.push(article);
        }

        let manifest_path = self.config.manifest_path();
        site.manifest = match Manifest::load_optional(&manifest_path) {
            Ok(manifest) => manifest,
            Err(err) => {
                tracing::warn!("Ignoring manifest {}: {}", manifest_path.display(), err);
                site.diagnostics.push(err.into_diagnostic());
                None
            }
        };

        let mut plugin_names: Vec<&str> = self.config.plugins.iter().map(String::as_str).collect();
        if let Some(manifest) = &site.manifest {
            site.diagnostics.extend(manifest.validate());
            plugin_names.extend(manifest.plugins(&self.host));
        }
        let (plugins, plugin_diagnostics) = PluginSet::resolve(plugin_names);
        site.plugins = plugins;
        site.diagnostics.extend(plugin_diagnostics);

        Ok(site)
    }

    /// Second pass: render Liquid and markdown with links resolved
    pub fn render(&self, site: LoadedSite) -> SiteIndex {
        let urls = UrlMap::new(&site.articles, &site.static_files, &self.config.baseurl);
        let mut diagnostics = site.diagnostics;
        let mut articles = site.articles;

        for article in articles.iter_mut() {
            diagnostics.extend(self.render_article(article, &urls));
        }

        let tags = TagIndex::from_articles(&articles);
        tracing::info!(
            "Built site index with {} articles, {} tags",
            articles.len(),
            tags.len()
        );

        SiteIndex {
            articles,
            tags,
            static_files: site.static_files,
            plugins: site.plugins,
            diagnostics,
        }
    }

    /// Render one article's body in place, returning its diagnostics
    pub fn render_article(
        &self,
        article: &mut Article,
        resolver: &dyn LinkResolver,
    ) -> Vec<Diagnostic> {
        let page = page_variables(article, &self.config.baseurl);
        let ctx = LiquidContext {
            config: &self.config,
            page: &page,
            resolver,
            first_line: article.body_line,
        };
        let output = liquid::render(&article.raw_body, &ctx);
        let diagnostics = output
            .issues
            .into_iter()
            .map(|issue| issue.into_diagnostic(&article.source_path))
            .collect();

        let rendered = self.processor.convert(&output.text);
        article.content_html = rendered.html;
        article.toc_html = rendered.toc_html;
        if article.excerpt.is_none() {
            article.excerpt = rendered.excerpt;
        }

        diagnostics
    }
}

/// `page.*` variables available to Liquid
fn page_variables(article: &Article, baseurl: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();

    for (key, value) in &article.frontmatter.extra {
        let text = match value {
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        vars.insert(key.clone(), text);
    }

    vars.insert("title".into(), article.title.clone());
    vars.insert("url".into(), article.url());
    vars.insert("id".into(), article.id.clone());
    vars.insert("slug".into(), article.slug.clone());
    vars.insert("layout".into(), article.layout.as_str().into());
    vars.insert("path".into(), article.source_path.clone());
    vars.insert("tags".into(), article.tags.join(", "));
    vars.insert("categories".into(), article.categories.join(", "));
    vars.insert("permalink".into(), article.url_with_base(baseurl));
    if let Some(date) = article.date_string() {
        vars.insert("date".into(), date);
    }
    if let Some(description) = &article.frontmatter.description {
        vars.insert("description".into(), description.clone());
    }
    if let Some(excerpt) = &article.excerpt {
        vars.insert("excerpt".into(), excerpt.clone());
    }

    vars
}
