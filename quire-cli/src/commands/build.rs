//! Build command implementation.

use super::{format_diagnostic, load_config};
use anyhow::{Context, Result};
use include_dir::{include_dir, Dir};
use quire_core::builder::TAG_INDEX_PATH;
use quire_core::permalink::{output_path_for, tag_output_path};
use quire_core::syndication::{atom_feed, sitemap};
use quire_core::{Config, DiagnosticSeverity, SiteBuilder, SiteIndex};
use quire_render::SiteContext;
use std::fs;
use std::path::Path;

// Built-in stylesheet, embedded so it is available after cargo install
static ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

/// Build the static site and discard the in-memory index
pub fn build_site(config_path: &Path, drafts: bool) -> Result<()> {
    let config = load_config(config_path)?;
    build_site_with_config(&config, drafts).map(|_| ())
}

/// Build the site from a loaded config, writing output and returning the index
pub fn build_site_with_config(config: &Config, drafts: bool) -> Result<SiteIndex> {
    tracing::info!("Building site: {}", config.title);

    let builder = SiteBuilder::new(config.clone()).with_drafts(drafts || config.show_drafts);
    let index = builder.build().context("Failed to build site")?;

    for diag in &index.diagnostics {
        match diag.severity {
            DiagnosticSeverity::Error => tracing::error!("{}", format_diagnostic(diag)),
            DiagnosticSeverity::Warning => tracing::warn!("{}", format_diagnostic(diag)),
            DiagnosticSeverity::Info => tracing::info!("{}", format_diagnostic(diag)),
        }
    }

    let output_dir = config.destination_dir();
    clean_destination(config, &output_dir)?;
    fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

    let writer = OutputWriter {
        output_dir: &output_dir,
        index: &index,
    };
    let ctx = SiteContext::new(config, &index);

    for article in &index.articles {
        let html = ctx.render_article(article)?;
        writer.write(&article.output_path, &html)?;
        tracing::debug!("Rendered: {} -> {}", article.source_path, article.output_path);
    }

    if writer.is_free("index.html") {
        writer.write("index.html", &ctx.render_home()?)?;
    }

    writer.write_generated(TAG_INDEX_PATH, &ctx.render_tags_index()?)?;
    for tag in index.tags.tags.keys() {
        writer.write_generated(&tag_output_path(tag), &ctx.render_tag(tag)?)?;
    }
    writer.write_generated("404.html", &ctx.render_not_found()?)?;

    if index.plugins.feed {
        let feed_path = output_path_for(&config.feed.path);
        writer.write_generated(&feed_path, &atom_feed(config, &index))?;
        tracing::info!("Generated {}", feed_path);
    }

    if index.plugins.sitemap {
        writer.write_generated("sitemap.xml", &sitemap(config, &index))?;
        tracing::info!("Generated sitemap.xml");
    }

    copy_static_files(&index, &output_dir)?;
    extract_embedded_assets(&output_dir)?;

    tracing::info!(
        "✓ Built {} pages ({} tags, {} static files)",
        index.articles.len(),
        index.tags.len(),
        index.static_files.len()
    );
    tracing::info!("✓ Output written to {:?}", output_dir);

    Ok(index)
}

/// Remove the previous build, refusing to delete the site source
fn clean_destination(config: &Config, output_dir: &Path) -> Result<()> {
    if !output_dir.exists() {
        return Ok(());
    }

    let output = output_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {:?}", output_dir))?;
    let source = config
        .source_dir()
        .canonicalize()
        .with_context(|| format!("Failed to resolve {:?}", config.source_dir()))?;
    anyhow::ensure!(
        !source.starts_with(&output),
        "Destination {:?} contains the site source; refusing to clear it",
        output_dir
    );

    fs::remove_dir_all(output_dir)
        .with_context(|| format!("Failed to clean existing {:?}", output_dir))?;
    tracing::debug!("Cleared {:?}", output_dir);
    Ok(())
}

struct OutputWriter<'a> {
    output_dir: &'a Path,
    index: &'a SiteIndex,
}

impl OutputWriter<'_> {
    /// Whether no article or static file already writes `rel_path`
    fn is_free(&self, rel_path: &str) -> bool {
        !self.index.writes_output(rel_path)
    }

    fn write(&self, rel_path: &str, contents: &str) -> Result<()> {
        let target = self.output_dir.join(rel_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        fs::write(&target, contents).with_context(|| format!("Failed to write {:?}", target))
    }

    /// Write a generated page unless the site provides the path itself
    fn write_generated(&self, rel_path: &str, contents: &str) -> Result<()> {
        if !self.is_free(rel_path) {
            tracing::warn!("{} is provided by the site; skipping the generated page", rel_path);
            return Ok(());
        }
        self.write(rel_path, contents)
    }
}

fn copy_static_files(index: &SiteIndex, output_dir: &Path) -> Result<()> {
    for file in &index.static_files {
        let target = output_dir.join(&file.rel_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&file.source, &target)
            .with_context(|| format!("Failed to copy {:?} to {:?}", file.source, target))?;
    }
    if !index.static_files.is_empty() {
        tracing::info!("Copied {} static files", index.static_files.len());
    }
    Ok(())
}

/// Write the built-in assets, leaving files the site provides itself untouched
fn extract_embedded_assets(output_dir: &Path) -> Result<()> {
    let dest = output_dir.join("assets");
    for entry in ASSETS.entries() {
        extract_entry(entry, &dest)?;
    }
    Ok(())
}

fn extract_entry(entry: &include_dir::DirEntry, dest: &Path) -> Result<()> {
    match entry {
        include_dir::DirEntry::Dir(dir) => {
            for sub_entry in dir.entries() {
                extract_entry(sub_entry, dest)?;
            }
        }
        include_dir::DirEntry::File(file) => {
            let target = dest.join(file.path());
            if target.exists() {
                tracing::debug!("Keeping site-provided {:?}", target);
                return Ok(());
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, file.contents())
                .with_context(|| format!("Failed to write embedded asset to {:?}", target))?;
        }
    }
    Ok(())
}
