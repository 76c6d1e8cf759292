//! Dependency manifest: a Gemfile subset naming the generator and plugins.
//!
//! The manifest is parsed into [`Dependency`] entries tagged with their
//! group and platform guard. Structural problems (unterminated blocks,
//! unknown statements, malformed requirements) are [`ManifestError`]s with a
//! line number; semantic problems such as duplicate names come back from
//! [`Manifest::validate`] as diagnostics.

mod parser;
pub mod platform;
pub mod version;

use crate::config::MANIFEST_FILENAME;
use crate::models::Diagnostic;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use platform::{HostPlatform, PlatformGuard};
pub use version::{Op, Requirement, Version};

/// Gem name under which a manifest pins the generator version
pub const GENERATOR_GEM: &str = "quire";

/// Generator declarations inherited from Jekyll sites, accepted as-is
pub const COMPATIBLE_GENERATORS: &[&str] = &["jekyll", "github-pages"];

/// Name of the group whose gems are loaded as plugins
pub const PLUGIN_GROUP: &str = "jekyll_plugins";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unknown statement '{statement}'")]
    UnknownStatement { line: usize, statement: String },

    #[error("line {line}: malformed version requirement '{requirement}'")]
    MalformedRequirement { line: usize, requirement: String },

    #[error("line {line}: block is never closed with 'end'")]
    Unterminated { line: usize },

    #[error("line {line}: 'end' without an open block")]
    StrayEnd { line: usize },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

impl ManifestError {
    /// 1-based line the error refers to
    pub fn line(&self) -> Option<usize> {
        match self {
            ManifestError::Io { .. } => None,
            ManifestError::UnknownStatement { line, .. }
            | ManifestError::MalformedRequirement { line, .. }
            | ManifestError::Unterminated { line }
            | ManifestError::StrayEnd { line }
            | ManifestError::Syntax { line, .. } => Some(*line),
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let line = self.line();
        let diagnostic =
            Diagnostic::error("manifest.parse", self.to_string()).with_source(MANIFEST_FILENAME);
        match line {
            Some(line) => diagnostic.at_line(line),
            None => diagnostic,
        }
    }
}

/// Dependency group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Group {
    Default,
    /// `jekyll_plugins`: loaded as plugins
    Plugins,
    Named(String),
}

impl Group {
    /// Group for `group :a, :b do`; the plugin group wins when listed
    pub fn from_names(names: &[String]) -> Self {
        let names: Vec<&str> = names
            .iter()
            .map(|n| n.trim().trim_start_matches(':'))
            .collect();

        if names.contains(&PLUGIN_GROUP) {
            Group::Plugins
        } else if names.is_empty() || names == ["default"] {
            Group::Default
        } else {
            Group::Named(names.join(","))
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Group::Default => "default",
            Group::Plugins => PLUGIN_GROUP,
            Group::Named(name) => name,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Group {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// One `gem` entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dependency {
    pub name: String,
    pub requirements: Vec<Requirement>,
    pub group: Group,
    pub platform: Option<PlatformGuard>,
    /// False for `require: false`
    pub require: bool,
    /// 1-based line of the `gem` statement
    pub line: usize,
}

impl Dependency {
    pub fn is_active(&self, host: &HostPlatform) -> bool {
        self.platform
            .as_ref()
            .map(|guard| guard.is_active(host))
            .unwrap_or(true)
    }

    /// Whether every requirement accepts `version` (no requirements accept all)
    pub fn accepts(&self, version: &Version) -> bool {
        self.requirements.iter().all(|r| r.matches(version))
    }

    pub fn requirement_string(&self) -> String {
        self.requirements
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parsed dependency manifest
#[derive(Debug, Clone, Default, Serialize)]
pub struct Manifest {
    pub source: Option<String>,
    pub ruby: Option<String>,
    pub dependencies: Vec<Dependency>,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        parser::parse(text)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Load the manifest if the file exists
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>, ManifestError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::from_file(path).map(Some)
    }

    /// Semantic checks: duplicate names within a group and the generator version
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut seen: HashMap<(&Group, &str), usize> = HashMap::new();

        for dep in &self.dependencies {
            match seen.get(&(&dep.group, dep.name.as_str())) {
                Some(first_line) => diagnostics.push(
                    Diagnostic::error(
                        "manifest.duplicate",
                        format!(
                            "Gem '{}' is declared more than once in group '{}' (first on line {})",
                            dep.name, dep.group, first_line
                        ),
                    )
                    .with_source(MANIFEST_FILENAME)
                    .at_line(dep.line)
                    .with_context(dep.name.clone()),
                ),
                None => {
                    seen.insert((&dep.group, dep.name.as_str()), dep.line);
                }
            }
        }

        if let Some(generator) = self.generator() {
            if generator.name == GENERATOR_GEM {
                let ours = Version::parse(env!("CARGO_PKG_VERSION"));
                if let Some(ours) = ours.filter(|v| !generator.accepts(v)) {
                    diagnostics.push(
                        Diagnostic::warning(
                            "manifest.generator",
                            format!(
                                "quire {} does not satisfy the manifest requirement '{}'",
                                ours,
                                generator.requirement_string()
                            ),
                        )
                        .with_source(MANIFEST_FILENAME)
                        .at_line(generator.line),
                    );
                }
            }
        }

        diagnostics
    }

    /// The default-group entry that declares the generator
    pub fn generator(&self) -> Option<&Dependency> {
        let default_group = || self.dependencies.iter().filter(|d| d.group == Group::Default);
        default_group()
            .find(|d| d.name == GENERATOR_GEM)
            .or_else(|| default_group().find(|d| COMPATIBLE_GENERATORS.contains(&d.name.as_str())))
    }

    /// Entries whose platform guard holds on `host`
    pub fn active(&self, host: &HostPlatform) -> Vec<&Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.is_active(host))
            .collect()
    }

    /// Names of active plugin-group gems
    pub fn plugins(&self, host: &HostPlatform) -> Vec<&str> {
        self.active(host)
            .into_iter()
            .filter(|d| d.group == Group::Plugins)
            .map(|d| d.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiagnosticSeverity;

    const GEMFILE: &str = r#"source "https://rubygems.org"
ruby "3.2.0"

# the generator
gem "jekyll", "~> 4.3.2"

group :jekyll_plugins do
  gem "jekyll-feed", "~> 0.12"
  gem "jekyll-seo-tag"
end

platforms :mingw, :x64_mingw, :mswin, :jruby do
  gem "tzinfo", ">= 1", "< 3"
  gem "tzinfo-data"
end

gem "wdm", "~> 0.1.1", :platforms => [:mingw, :x64_mingw, :mswin]
gem "http_parser.rb", "~> 0.6.0", platforms: [:jruby]
gem "kramdown-parser-gfm", require: false

install_if -> { RUBY_PLATFORM =~ %r!darwin! } do
  gem "webrick"
end
"#;

    fn linux() -> HostPlatform {
        HostPlatform::new("x86_64-linux")
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = Manifest::parse(GEMFILE).unwrap();
        assert_eq!(manifest.source.as_deref(), Some("https://rubygems.org"));
        assert_eq!(manifest.ruby.as_deref(), Some("3.2.0"));
        assert_eq!(manifest.dependencies.len(), 9);

        let jekyll = &manifest.dependencies[0];
        assert_eq!(jekyll.name, "jekyll");
        assert_eq!(jekyll.group, Group::Default);
        assert_eq!(jekyll.line, 5);
        assert_eq!(jekyll.requirement_string(), "~> 4.3.2");

        let tzinfo = &manifest.dependencies[3];
        assert_eq!(tzinfo.requirements.len(), 2);
        assert!(matches!(tzinfo.platform, Some(PlatformGuard::Platforms(ref p)) if p.len() == 4));

        let kramdown = manifest
            .dependencies
            .iter()
            .find(|d| d.name == "kramdown-parser-gfm")
            .unwrap();
        assert!(!kramdown.require);

        let webrick = manifest.dependencies.last().unwrap();
        assert_eq!(
            webrick.platform,
            Some(PlatformGuard::InstallIf("RUBY_PLATFORM =~ %r!darwin!".to_string()))
        );
    }

    #[test]
    fn test_active_on_linux() {
        let manifest = Manifest::parse(GEMFILE).unwrap();
        let names: Vec<&str> = manifest
            .active(&linux())
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["jekyll", "jekyll-feed", "jekyll-seo-tag", "kramdown-parser-gfm"]
        );
        assert_eq!(
            manifest.plugins(&linux()),
            vec!["jekyll-feed", "jekyll-seo-tag"]
        );
    }

    #[test]
    fn test_active_on_windows_and_mac() {
        let manifest = Manifest::parse(GEMFILE).unwrap();
        let windows = HostPlatform::new("x64-mingw-ucrt");
        let names: Vec<&str> = manifest
            .active(&windows)
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert!(names.contains(&"tzinfo"));
        assert!(names.contains(&"wdm"));
        assert!(!names.contains(&"http_parser.rb"));
        assert!(!names.contains(&"webrick"));

        let mac = HostPlatform::new("arm64-darwin");
        assert!(manifest.active(&mac).iter().any(|d| d.name == "webrick"));
    }

    #[test]
    fn test_duplicates_within_group() {
        let text = concat!(
            "gem \"jekyll\"\ngroup :jekyll_plugins do\n",
            "  gem \"jekyll-feed\"\n  gem \"jekyll-feed\"\nend\ngem \"jekyll-feed\"\n"
        );
        let manifest = Manifest::parse(text).unwrap();
        let diagnostics = manifest.validate();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "manifest.duplicate");
        assert_eq!(diagnostics[0].line, Some(4));
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);
    }

    #[test]
    fn test_generator_version_check() {
        let manifest = Manifest::parse("gem \"quire\", \"< 0.0.1\"\n").unwrap();
        let diagnostics = manifest.validate();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "manifest.generator");
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);

        let ok = format!("gem \"quire\", \">= {}\"\n", env!("CARGO_PKG_VERSION"));
        assert!(Manifest::parse(&ok).unwrap().validate().is_empty());
        assert!(Manifest::parse(GEMFILE).unwrap().validate().is_empty());
    }

    #[test]
    fn test_parse_errors_carry_lines() {
        let err = Manifest::parse("gem \"a\"\ngroup :test do\n  gem \"b\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::Unterminated { line: 2 }));

        let err = Manifest::parse("gem \"a\"\nend\n").unwrap_err();
        assert!(matches!(err, ManifestError::StrayEnd { line: 2 }));

        let err = Manifest::parse("source \"x\"\ngemspec\n").unwrap_err();
        assert!(matches!(err, ManifestError::UnknownStatement { line: 2, .. }));

        let err = Manifest::parse("gem \"a\", \"~> banana\"\n").unwrap_err();
        assert!(matches!(err, ManifestError::MalformedRequirement { line: 1, .. }));
        assert_eq!(err.into_diagnostic().line, Some(1));
    }

    #[test]
    fn test_named_groups_and_gem_options() {
        let text = concat!(
            "group :development, :test do\n  gem \"rspec\"\nend\n",
            "gem \"jekyll-sitemap\", group: :jekyll_plugins\n"
        );
        let manifest = Manifest::parse(text).unwrap();
        assert_eq!(
            manifest.dependencies[0].group,
            Group::Named("development,test".into())
        );
        assert_eq!(manifest.dependencies[1].group, Group::Plugins);
        assert_eq!(manifest.plugins(&linux()), vec!["jekyll-sitemap"]);
    }
}
