//! Platform guards and host platform evaluation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// `RUBY_PLATFORM =~ /x/` or `RUBY_PLATFORM =~ %r!x!`
static PLATFORM_MATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"RUBY_PLATFORM\s*=~\s*(?:/((?:\\/|[^/])*)/|%r!([^!]*)!)[a-z]*").unwrap()
});

const WINDOWS_PLATFORMS: &[&str] = &["mingw", "x64_mingw", "mswin", "mswin64", "windows"];
const MRI_PLATFORMS: &[&str] = &["ruby", "mri"];

/// Condition that decides whether a dependency installs on a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum PlatformGuard {
    /// `platforms: [...]` or a `platforms ... do` block
    Platforms(Vec<String>),
    /// Body of an `install_if -> { ... }` lambda
    InstallIf(String),
}

impl PlatformGuard {
    pub fn is_active(&self, host: &HostPlatform) -> bool {
        match self {
            PlatformGuard::Platforms(names) => names.iter().any(|n| host.matches_platform(n)),
            PlatformGuard::InstallIf(expr) => host.evaluate_install_if(expr),
        }
    }

    /// Human-readable form used in listings
    pub fn describe(&self) -> String {
        match self {
            PlatformGuard::Platforms(names) => format!("platforms: {}", names.join(", ")),
            PlatformGuard::InstallIf(expr) => format!("install_if: {}", expr),
        }
    }
}

/// The machine manifest guards are evaluated against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub windows: bool,
    /// Ruby-style platform string: `x86_64-linux`, `arm64-darwin`, `x64-mingw-ucrt`
    pub ruby_platform: String,
}

impl HostPlatform {
    pub fn new(ruby_platform: impl Into<String>) -> Self {
        let ruby_platform = ruby_platform.into();
        let windows = ruby_platform.contains("mingw") || ruby_platform.contains("mswin");
        Self {
            windows,
            ruby_platform,
        }
    }

    /// The platform quire is running on
    pub fn current() -> Self {
        let os = std::env::consts::OS;
        let arch = std::env::consts::ARCH;

        let ruby_platform = match (os, arch) {
            ("windows", "x86_64") => "x64-mingw-ucrt".to_string(),
            ("windows", _) => format!("{}-mingw-ucrt", arch),
            ("macos", "aarch64") => "arm64-darwin".to_string(),
            ("macos", _) => format!("{}-darwin", arch),
            (os, arch) => format!("{}-{}", arch, os),
        };

        Self::new(ruby_platform)
    }

    /// Whether a Bundler platform name applies to this host
    pub fn matches_platform(&self, name: &str) -> bool {
        let name = name.trim().trim_start_matches(':');
        let base = strip_version_suffix(name);

        if self.windows {
            WINDOWS_PLATFORMS.contains(&base)
        } else {
            MRI_PLATFORMS.contains(&base)
        }
    }

    /// Evaluate an `install_if` body; expressions other than a
    /// `RUBY_PLATFORM` match are treated as true
    pub fn evaluate_install_if(&self, expr: &str) -> bool {
        let Some(caps) = PLATFORM_MATCH.captures(expr) else {
            return true;
        };
        let pattern = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().replace("\\/", "/"))
            .unwrap_or_default();

        match Regex::new(&pattern) {
            Ok(re) => re.is_match(&self.ruby_platform),
            Err(_) => self.ruby_platform.contains(&pattern),
        }
    }
}

/// `ruby_31` -> `ruby`, `x64_mingw_20` -> `x64_mingw`
fn strip_version_suffix(name: &str) -> &str {
    match name.rsplit_once('_') {
        Some((base, version))
            if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_host() {
        let host = HostPlatform::new("x86_64-linux");
        assert!(!host.windows);
        assert!(host.matches_platform("ruby"));
        assert!(host.matches_platform(":mri_31"));
        assert!(!host.matches_platform("mingw"));
        assert!(!host.matches_platform("jruby"));
        assert!(!host.matches_platform("truffleruby"));
    }

    #[test]
    fn test_windows_host() {
        let host = HostPlatform::new("x64-mingw-ucrt");
        assert!(host.windows);
        assert!(host.matches_platform("x64_mingw"));
        assert!(host.matches_platform("mswin64"));
        assert!(host.matches_platform("windows"));
        assert!(!host.matches_platform("ruby"));
        assert!(!host.matches_platform("jruby"));
    }

    #[test]
    fn test_install_if() {
        let mac = HostPlatform::new("arm64-darwin");
        let linux = HostPlatform::new("x86_64-linux");
        let expr = "RUBY_PLATFORM =~ %r!darwin!";
        assert!(mac.evaluate_install_if(expr));
        assert!(!linux.evaluate_install_if(expr));
        assert!(linux.evaluate_install_if("RUBY_PLATFORM =~ /linux/"));
        assert!(linux.evaluate_install_if("Gem.win_platform?"));
    }

    #[test]
    fn test_guard_activation() {
        let linux = HostPlatform::new("x86_64-linux");
        let windows_only = PlatformGuard::Platforms(vec!["mingw".into(), "x64_mingw".into()]);
        assert!(!windows_only.is_active(&linux));
        assert!(PlatformGuard::Platforms(vec!["ruby".into()]).is_active(&linux));
    }

    #[test]
    fn test_current_host_is_consistent() {
        let host = HostPlatform::current();
        assert_eq!(host.windows, cfg!(windows));
        assert!(!host.ruby_platform.is_empty());
    }
}
