//! Plugin resolution from the site config and the dependency manifest.

use crate::models::Diagnostic;
use serde::{Deserialize, Serialize};

pub const FEED_PLUGIN: &str = "jekyll-feed";
pub const SITEMAP_PLUGIN: &str = "jekyll-sitemap";
pub const SEO_PLUGIN: &str = "jekyll-seo-tag";

/// Output features switched on by plugins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSet {
    pub feed: bool,
    pub sitemap: bool,
    pub seo: bool,
}

impl PluginSet {
    /// Resolve plugin names into features.
    ///
    /// Unknown names are reported as info diagnostics and otherwise ignored.
    pub fn resolve<'a, I>(names: I) -> (Self, Vec<Diagnostic>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = PluginSet::default();
        let mut diagnostics = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for name in names {
            let name = name.trim();
            if name.is_empty() || seen.contains(&name) {
                continue;
            }
            seen.push(name);

            match name {
                FEED_PLUGIN => set.feed = true,
                SITEMAP_PLUGIN => set.sitemap = true,
                SEO_PLUGIN => set.seo = true,
                other => {
                    tracing::debug!("Ignoring unsupported plugin {}", other);
                    diagnostics.push(
                        Diagnostic::info(
                            "plugin.unknown",
                            format!("Plugin '{}' is not implemented and will be ignored", other),
                        )
                        .with_context(other.to_string()),
                    );
                }
            }
        }

        (set, diagnostics)
    }
}
