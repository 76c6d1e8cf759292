//! CLI command implementations.

pub mod build;
pub mod deps;
pub mod init;
pub mod lint;
pub mod new;
pub mod serve;

pub use build::build_site;
pub use deps::list_deps;
pub use init::init_site;
pub use lint::lint;
pub use new::{new_post, NewPostOptions};
pub use serve::serve;

use anyhow::{Context, Result};
use quire_core::{Config, Diagnostic};
use std::path::Path;

/// Load the site configuration.
///
/// A missing `_config.yml` is not an error: the site then uses every default
/// and the file's directory as its source.
pub fn load_config(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        tracing::debug!("Loading config from {:?}", config_path);
        return Config::from_file(config_path)
            .with_context(|| format!("Failed to load configuration from {:?}", config_path));
    }

    let source = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    anyhow::ensure!(
        source.is_dir(),
        "Site directory {:?} does not exist",
        source
    );
    tracing::debug!("No {:?}; using default configuration", config_path);
    Ok(Config::for_source(source))
}

/// `path:line: severity [code] message`
pub fn format_diagnostic(diag: &Diagnostic) -> String {
    let location = match (&diag.source_path, diag.line) {
        (Some(path), Some(line)) => format!("{}:{}: ", path, line),
        (Some(path), None) => format!("{}: ", path),
        _ => String::new(),
    };
    let severity = match diag.severity {
        quire_core::DiagnosticSeverity::Error => "error",
        quire_core::DiagnosticSeverity::Warning => "warning",
        quire_core::DiagnosticSeverity::Info => "info",
    };
    format!("{}{} [{}] {}", location, severity, diag.code, diag.message)
}
