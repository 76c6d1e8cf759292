//! # quire-core
//!
//! Core library for the quire static blog generator.
//!
//! This crate loads a Jekyll-style site (`_config.yml`, `_posts/`, `_drafts/`,
//! pages and a `Gemfile` manifest), renders article bodies, and checks the
//! content for structural problems.

pub mod builder;
pub mod config;
pub mod content;
pub mod frontmatter;
pub mod liquid;
pub mod lint;
pub mod manifest;
pub mod markdown;
pub mod models;
pub mod permalink;
pub mod plugins;
pub mod slug;
pub mod syndication;

pub use builder::{BuildError, SiteBuilder};
pub use config::Config;
pub use lint::{lint_site, LintReport};
pub use manifest::{HostPlatform, Manifest};
pub use models::{
    Article, ArticleKind, Diagnostic, DiagnosticSeverity, Frontmatter, Layout, SiteIndex,
    StaticFile, TagIndex,
};
pub use plugins::PluginSet;
pub use slug::slugify;
