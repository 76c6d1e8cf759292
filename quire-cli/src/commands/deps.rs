//! Deps command: list manifest entries for a platform.

use super::load_config;
use anyhow::{Context, Result};
use quire_core::manifest::Dependency;
use quire_core::{HostPlatform, Manifest};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct DepsPayload<'a> {
    platform: &'a str,
    source: Option<&'a str>,
    ruby: Option<&'a str>,
    dependencies: Vec<DepEntry<'a>>,
}

#[derive(Serialize)]
struct DepEntry<'a> {
    name: &'a str,
    requirement: String,
    group: &'a str,
    guard: Option<String>,
    active: bool,
    require: bool,
    line: usize,
}

impl<'a> DepEntry<'a> {
    fn new(dep: &'a Dependency, host: &HostPlatform) -> Self {
        Self {
            name: &dep.name,
            requirement: dep.requirement_string(),
            group: dep.group.name(),
            guard: dep.platform.as_ref().map(|g| g.describe()),
            active: dep.is_active(host),
            require: dep.require,
            line: dep.line,
        }
    }
}

/// Print the manifest's dependencies that apply to `platform` (all with `all`)
pub fn list_deps(config_path: &Path, json: bool, all: bool, platform: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let manifest_path = config.manifest_path();
    let manifest = Manifest::load_optional(&manifest_path)
        .with_context(|| format!("Failed to read {:?}", manifest_path))?
        .with_context(|| format!("No manifest found at {:?}", manifest_path))?;

    let host = platform
        .map(HostPlatform::new)
        .unwrap_or_else(HostPlatform::current);
    tracing::debug!("Evaluating platform guards for {}", host.ruby_platform);

    let entries: Vec<DepEntry> = manifest
        .dependencies
        .iter()
        .map(|dep| DepEntry::new(dep, &host))
        .filter(|entry| all || entry.active)
        .collect();

    if json {
        let payload = DepsPayload {
            platform: &host.ruby_platform,
            source: manifest.source.as_deref(),
            ruby: manifest.ruby.as_deref(),
            dependencies: entries,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{}", render_table(&entries));
    println!(
        "{} of {} dependencies active on {}",
        manifest.active(&host).len(),
        manifest.dependencies.len(),
        host.ruby_platform
    );
    Ok(())
}

fn render_table(entries: &[DepEntry]) -> String {
    let name_width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
    let req_width = entries.iter().map(|e| e.requirement.len()).max().unwrap_or(0);
    let group_width = entries.iter().map(|e| e.group.len()).max().unwrap_or(0);

    entries
        .iter()
        .map(|e| {
            let mut line = format!(
                "{:name_width$}  {:req_width$}  {:group_width$}",
                e.name, e.requirement, e.group
            );
            if let Some(guard) = &e.guard {
                line.push_str("  ");
                line.push_str(guard);
            }
            if !e.active {
                line.push_str("  (inactive)");
            }
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_table() {
        let manifest = Manifest::parse(
            "gem \"jekyll\", \"~> 4.3\"\ngem \"wdm\", \"~> 0.1\", platforms: [:mingw]\n",
        )
        .unwrap();
        let host = HostPlatform::new("x86_64-linux");
        let entries: Vec<DepEntry> = manifest
            .dependencies
            .iter()
            .map(|d| DepEntry::new(d, &host))
            .collect();

        let table = render_table(&entries);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "jekyll  ~> 4.3  default");
        assert!(lines[1].starts_with("wdm     ~> 0.1  default  "));
        assert!(lines[1].ends_with("(inactive)"));
    }
}
