//! New command: create a dated post or a draft.

use super::load_config;
use anyhow::{Context, Result};
use quire_core::models::Layout;
use quire_core::slugify;
use std::fs;
use std::path::{Path, PathBuf};

pub struct NewPostOptions {
    pub draft: bool,
    pub layout: String,
    pub tags: Vec<String>,
}

/// Create `_posts/<today>-<slug>.md` (or `_drafts/<slug>.md`), returning its path
pub fn new_post(config_path: &Path, title: &str, opts: &NewPostOptions) -> Result<PathBuf> {
    let config = load_config(config_path)?;

    let slug = slugify(title);
    anyhow::ensure!(!slug.is_empty(), "Title {:?} has no usable characters", title);
    if Layout::from_name(&opts.layout).is_none() {
        tracing::warn!(
            "Layout '{}' is not one of {}; the post will fail lint",
            opts.layout,
            Layout::names()
        );
    }

    let now = chrono::Local::now();
    let (dir, file_name) = if opts.draft {
        ("_drafts", format!("{}.md", slug))
    } else {
        ("_posts", format!("{}-{}.md", now.format("%Y-%m-%d"), slug))
    };

    let path = config.source_dir().join(dir).join(file_name);
    anyhow::ensure!(!path.exists(), "{:?} already exists", path);

    let mut frontmatter = format!("---\nlayout: {}\ntitle: {}\n", opts.layout, yaml_string(title));
    if !opts.draft {
        frontmatter.push_str(&format!("date: {}\n", now.format("%Y-%m-%d %H:%M:%S %z")));
    }
    let tags: Vec<String> = opts
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(yaml_string)
        .collect();
    if !tags.is_empty() {
        frontmatter.push_str(&format!("tags: [{}]\n", tags.join(", ")));
    }
    frontmatter.push_str("---\n\n");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs::write(&path, frontmatter).with_context(|| format!("Failed to write {:?}", path))?;

    println!("Created {:?}", path);
    Ok(path)
}

/// Double-quoted YAML scalar
fn yaml_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::frontmatter::parse_frontmatter;
    use tempfile::tempdir;

    fn opts(draft: bool, tags: &[&str]) -> NewPostOptions {
        NewPostOptions {
            draft,
            layout: "post".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_new_post() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("_config.yml");

        let path =
            new_post(&config_path, "Hello: \"World\"", &opts(false, &["swift", " ui "])).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("-hello-world.md"));
        assert!(path.starts_with(dir.path().join("_posts")));

        let text = fs::read_to_string(&path).unwrap();
        let (fm, _) = parse_frontmatter(&text).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Hello: \"World\""));
        assert_eq!(fm.tags, vec!["swift", "ui"]);
        assert!(fm.date.is_some());

        assert!(new_post(&config_path, "Hello: \"World\"", &opts(false, &[])).is_err());
    }

    #[test]
    fn test_new_draft_has_no_date() {
        let dir = tempdir().unwrap();
        let path = new_post(&dir.path().join("_config.yml"), "Later", &opts(true, &[])).unwrap();
        assert_eq!(path, dir.path().join("_drafts/later.md"));
        assert!(!fs::read_to_string(&path).unwrap().contains("date:"));
    }
}
