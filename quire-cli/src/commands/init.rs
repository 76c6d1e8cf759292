//! Init command implementation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"title: My Blog
description: Notes on building things
author: Your Name
url: "https://example.com"
baseurl: ""
permalink: date

plugins:
  - jekyll-feed
  - jekyll-sitemap
  - jekyll-seo-tag

feed:
  path: feed.xml
  posts_limit: 10

defaults:
  - scope:
      path: ""
      type: posts
    values:
      layout: post
      toc: true
"#;

const DEFAULT_MANIFEST: &str = r#"source "https://rubygems.org"

gem "jekyll", "~> 4.3"

group :jekyll_plugins do
  gem "jekyll-feed", "~> 0.12"
  gem "jekyll-sitemap"
  gem "jekyll-seo-tag"
end

# Windows and JRuby do not include zoneinfo files
platforms :mingw, :x64_mingw, :mswin, :jruby do
  gem "tzinfo", ">= 1", "< 3"
  gem "tzinfo-data"
end

gem "wdm", "~> 0.1", :platforms => [:mingw, :x64_mingw, :mswin]
"#;

const ABOUT_PAGE: &str = r#"---
layout: page
title: About
permalink: /about/
---

This is a blog built with quire. Edit `about.md` to tell readers who you are.
"#;

const INDEX_PAGE: &str = r#"---
layout: home
title: Home
---
"#;

/// Scaffold a new site; existing files are left untouched
pub fn init_site(path: Option<&Path>) -> Result<()> {
    let root = path.unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(root).with_context(|| format!("Failed to create {:?}", root))?;

    let today = chrono::Local::now().date_naive();
    let welcome = format!("_posts/{}-welcome.md", today.format("%Y-%m-%d"));

    let files = [
        ("_config.yml", DEFAULT_CONFIG.to_string()),
        ("Gemfile", DEFAULT_MANIFEST.to_string()),
        (welcome.as_str(), welcome_post(&today.format("%Y-%m-%d").to_string())),
        ("about.md", ABOUT_PAGE.to_string()),
        ("index.md", INDEX_PAGE.to_string()),
    ];

    for (rel, contents) in files {
        write_new(root, rel, &contents)?;
    }
    fs::create_dir_all(root.join("_drafts"))?;

    println!("✓ quire site initialized in {:?}", root);
    println!("  - Edit _config.yml to customize site metadata");
    println!("  - Write posts in _posts/ (quire new \"Title\")");
    println!("  - Preview with quire serve");
    Ok(())
}

fn write_new(root: &Path, rel: &str, contents: &str) -> Result<()> {
    let path = root.join(rel);
    if path.exists() {
        println!("{} already exists, leaving it alone", rel);
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs::write(&path, contents).with_context(|| format!("Failed to write {:?}", path))?;
    println!("Created {}", rel);
    Ok(())
}

fn welcome_post(date: &str) -> String {
    format!(
        r#"---
layout: post
title: Welcome to quire
date: {date}
tags: [quire]
---

* TOC
{{:toc}}

## Writing posts

Posts live in `_posts/` and are named `YYYY-MM-DD-title.md`. Run:

```sh
quire build
quire serve
```

## Linking

Link to other posts with `{{% post_url {date}-welcome %}}`.
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{Config, SiteBuilder};
    use tempfile::tempdir;

    #[test]
    fn test_init_scaffolds_buildable_site() {
        let dir = tempdir().unwrap();
        init_site(Some(dir.path())).unwrap();

        for rel in ["_config.yml", "Gemfile", "about.md", "index.md"] {
            assert!(dir.path().join(rel).exists(), "{} missing", rel);
        }

        let config = Config::from_file(dir.path().join("_config.yml")).unwrap();
        let index = SiteBuilder::new(config).build().unwrap();
        assert_eq!(index.articles.len(), 3);
        assert!(index.plugins.feed);
        assert!(
            !index.has_errors(),
            "unexpected diagnostics: {:?}",
            index.diagnostics
        );
    }

    #[test]
    fn test_init_never_overwrites() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("about.md"), "mine").unwrap();
        init_site(Some(dir.path())).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("about.md")).unwrap(), "mine");
    }
}
