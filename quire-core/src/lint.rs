//! Structural checks over a site's content and manifest.
//!
//! Unlike a build, linting looks at every content file (drafts, unpublished
//! and future posts included) and turns each problem into a [`Diagnostic`].

use crate::{
    builder::{output_conflicts, BuildError, SiteBuilder, UrlMap},
    config::Config,
    content::{self, parse_date, parse_post_filename, relative_path, Discovery},
    frontmatter::{parse_block, split_frontmatter},
    manifest::{HostPlatform, Manifest},
    models::{
        Article, ArticleKind, Diagnostic, DiagnosticSeverity, Frontmatter, Layout, StaticFile,
    },
    plugins::PluginSet,
};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// Outcome of linting a site
#[derive(Debug, Clone, Default, Serialize)]
pub struct LintReport {
    /// Number of content files checked
    pub documents: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl LintReport {
    pub fn count(&self, severity: DiagnosticSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn errors(&self) -> usize {
        self.count(DiagnosticSeverity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(DiagnosticSeverity::Warning)
    }

    /// Whether the report should fail a check run
    pub fn fails(&self, deny_warnings: bool) -> bool {
        self.errors() > 0 || (deny_warnings && self.warnings() > 0)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }
}

/// Lint the site described by `config` on this machine
pub fn lint_site(config: &Config) -> Result<LintReport, BuildError> {
    Linter::new(config.clone()).run()
}

pub struct Linter {
    builder: SiteBuilder,
    host: HostPlatform,
}

impl Linter {
    pub fn new(config: Config) -> Self {
        Self {
            builder: SiteBuilder::new(config).with_drafts(true),
            host: HostPlatform::current(),
        }
    }

    pub fn with_host(mut self, host: HostPlatform) -> Self {
        self.builder = self.builder.with_host(host.clone());
        self.host = host;
        self
    }

    pub fn run(&self) -> Result<LintReport, BuildError> {
        let config = self.builder.config();
        let discovery = content::discover(config)?;
        let files = discovery.content_files(true);
        let known = known_sources(&discovery, config);

        let mut report = LintReport {
            documents: files.len(),
            diagnostics: Vec::new(),
        };
        let mut articles: Vec<Article> = Vec::new();

        for (path, kind) in &files {
            let text = match content::read_source(config, path) {
                Ok(text) => text,
                Err(err) => {
                    report.diagnostics.push(err.into_diagnostic()?);
                    continue;
                }
            };
            let rel = relative_path(config.source_dir(), path);
            tracing::debug!("Linting {}", rel);

            report
                .diagnostics
                .extend(check_document(config, &rel, *kind, &text, &known));

            // Files that fail to load were reported above
            if let Ok(loaded) = content::load_article(config, path, *kind) {
                report.diagnostics.extend(
                    loaded
                        .diagnostics
                        .into_iter()
                        .filter(|d| d.code == "permalink.invalid"),
                );
                articles.push(loaded.article);
            }
        }

        report
            .diagnostics
            .extend(duplicate_outputs(&articles, &discovery.static_files));

        let urls = UrlMap::new(&articles, &discovery.static_files, &config.baseurl);
        for article in articles.iter_mut() {
            report
                .diagnostics
                .extend(self.builder.render_article(article, &urls));
        }

        report.diagnostics.extend(self.check_manifest(config));

        report.diagnostics.sort_by(|a, b| {
            a.source_path
                .cmp(&b.source_path)
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.code.cmp(&b.code))
        });

        tracing::info!(
            "Linted {} documents: {} errors, {} warnings",
            report.documents,
            report.errors(),
            report.warnings()
        );
        Ok(report)
    }

    fn check_manifest(&self, config: &Config) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut plugin_names: Vec<String> = config.plugins.clone();

        match Manifest::load_optional(config.manifest_path()) {
            Ok(Some(manifest)) => {
                diagnostics.extend(manifest.validate());
                plugin_names.extend(manifest.plugins(&self.host).into_iter().map(String::from));
            }
            Ok(None) => {}
            Err(err) => diagnostics.push(err.into_diagnostic()),
        }

        let (_, plugin_diagnostics) = PluginSet::resolve(plugin_names.iter().map(String::as_str));
        diagnostics.extend(plugin_diagnostics);
        diagnostics
    }
}

/// Source paths that links may point at
fn known_sources(discovery: &Discovery, config: &Config) -> HashSet<String> {
    let content = discovery
        .posts
        .iter()
        .chain(&discovery.drafts)
        .chain(&discovery.pages)
        .map(|p| relative_path(config.source_dir(), p));
    let statics = discovery.static_files.iter().map(|f| f.rel_path.clone());
    content.chain(statics).collect()
}

/// Front matter, filename, code fence and relative link checks for one file
fn check_document(
    config: &Config,
    rel: &str,
    kind: ArticleKind,
    text: &str,
    known: &HashSet<String>,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let error = |code: &str, message: String| Diagnostic::error(code, message).with_source(rel);

    if kind == ArticleKind::Post {
        let stem = PathBuf::from(rel)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_default();
        if parse_post_filename(&stem).is_none() {
            diagnostics.push(error(
                "filename.date",
                format!("Post filename '{}' must start with a YYYY-MM-DD- date", stem),
            ));
        }
    }

    let Some(split) = split_frontmatter(text) else {
        diagnostics.push(
            error("frontmatter.missing", "No front matter block".to_string()).at_line(1),
        );
        // the body is the whole file
        diagnostics.extend(check_body(rel, text, 1, known));
        return diagnostics;
    };

    match parse_block(split.yaml) {
        Ok(frontmatter) => {
            diagnostics.extend(check_frontmatter(config, rel, kind, &frontmatter, split.yaml));
        }
        Err(err) => {
            let diagnostic = error("frontmatter.invalid", err.to_string());
            diagnostics.push(match err.line() {
                Some(line) => diagnostic.at_line(line),
                None => diagnostic,
            });
        }
    }

    diagnostics.extend(check_body(rel, split.body, split.body_line, known));
    diagnostics
}

/// File line of a top-level front matter key; the block starts on line 2
fn key_line(key: &str, yaml_lines: &[&str]) -> Option<usize> {
    let prefix = format!("{}:", key);
    yaml_lines
        .iter()
        .position(|l| l.starts_with(&prefix))
        .map(|i| i + 2)
}

fn check_frontmatter(
    config: &Config,
    rel: &str,
    kind: ArticleKind,
    frontmatter: &Frontmatter,
    yaml: &str,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let defaults = config.defaults_for(rel, kind);
    let yaml_lines: Vec<&str> = yaml.lines().collect();
    // missing keys are reported on the opening marker
    let line = |key: &str| key_line(key, &yaml_lines).unwrap_or(1);

    match frontmatter
        .layout_name()
        .or(defaults.layout.as_deref().map(str::trim).filter(|l| !l.is_empty()))
    {
        None => diagnostics.push(
            Diagnostic::error(
                "frontmatter.layout",
                "Front matter must declare a non-empty 'layout'",
            )
            .with_source(rel)
            .at_line(line("layout")),
        ),
        Some(name) if Layout::from_name(name).is_none() => diagnostics.push(
            Diagnostic::error(
                "layout.unknown",
                format!("Unknown layout '{}' (known: {})", name, Layout::names()),
            )
            .with_source(rel)
            .at_line(line("layout"))
            .with_context(name.to_string()),
        ),
        Some(_) => {}
    }

    if frontmatter.title().is_none() {
        diagnostics.push(
            Diagnostic::error(
                "frontmatter.title",
                "Front matter must declare a non-empty 'title'",
            )
            .with_source(rel)
            .at_line(line("title")),
        );
    }

    if let Some(raw) = frontmatter.date.as_deref() {
        if parse_date(raw).is_none() {
            diagnostics.push(
                Diagnostic::error(
                    "frontmatter.invalid",
                    format!("Invalid date '{}', expected YYYY-MM-DD", raw),
                )
                .with_source(rel)
                .at_line(line("date")),
            );
        }
    }

    diagnostics
}

/// Fenced code languages and relative markdown links in a body
fn check_body(
    rel: &str,
    body: &str,
    body_line: usize,
    known: &HashSet<String>,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let line_at = |offset: usize| body[..offset].matches('\n').count() + body_line;
    let parser = Parser::new_ext(body, Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES);

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) if lang.trim().is_empty() => {
                diagnostics.push(
                    Diagnostic::error("code.language", "Fenced code block has no language tag")
                        .with_source(rel)
                        .at_line(line_at(range.start)),
                );
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                if let Some(target) = relative_markdown_target(rel, &dest_url) {
                    if !known.contains(&target) {
                        diagnostics.push(
                            Diagnostic::error(
                                "link.broken",
                                format!("Link target '{}' does not exist", dest_url),
                            )
                            .with_source(rel)
                            .at_line(line_at(range.start))
                            .with_context(dest_url.to_string()),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    diagnostics
}

/// Site-relative path of a link to a markdown source, if it is one
fn relative_markdown_target(from: &str, dest: &str) -> Option<String> {
    if dest.contains("://") || dest.starts_with('#') || dest.starts_with("mailto:") {
        return None;
    }
    let path = dest.split(['#', '?']).next().unwrap_or(dest);
    let is_markdown = content::MARKDOWN_EXTENSIONS
        .iter()
        .any(|ext| path.ends_with(&format!(".{}", ext)));
    if !is_markdown {
        return None;
    }

    let mut parts: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = from.split('/').collect();
        dir.pop();
        dir
    };
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Outputs written twice, reported on the second writer
pub fn duplicate_outputs(articles: &[Article], static_files: &[StaticFile]) -> Vec<Diagnostic> {
    output_conflicts(articles, static_files)
        .into_iter()
        .map(|conflict| {
            let diagnostic = Diagnostic::error(
                "output.duplicate",
                format!(
                    "Output '{}' of {} is also written by {}",
                    conflict.path, conflict.second, conflict.first
                ),
            )
            .with_context(conflict.path.clone());
            match conflict.second.source_path() {
                Some(path) => diagnostic.with_source(path),
                None => diagnostic,
            }
        })
        .collect()
}
