//! Lint command: check content and manifest, print diagnostics.

use super::{format_diagnostic, load_config};
use anyhow::{Context, Result};
use quire_core::{Diagnostic, DiagnosticSeverity, LintReport};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct LintSummary<'a> {
    documents: usize,
    errors: usize,
    warnings: usize,
    infos: usize,
    diagnostics: &'a [Diagnostic],
}

impl<'a> LintSummary<'a> {
    fn new(report: &'a LintReport) -> Self {
        Self {
            documents: report.documents,
            errors: report.errors(),
            warnings: report.warnings(),
            infos: report.count(DiagnosticSeverity::Info),
            diagnostics: &report.diagnostics,
        }
    }
}

/// Lint the site; fails when errors (or, with `deny_warnings`, warnings) are found
pub fn lint(config_path: &Path, json: bool, deny_warnings: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let report = quire_core::lint_site(&config).context("Failed to lint site")?;
    let summary = LintSummary::new(&report);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for diag in &report.diagnostics {
            println!("{}", format_diagnostic(diag));
            if let Some(ctx) = &diag.context {
                println!("  | {}", ctx);
            }
        }
        println!(
            "Checked {} documents: {} errors, {} warnings, {} info",
            summary.documents, summary.errors, summary.warnings, summary.infos
        );
    }

    if report.fails(deny_warnings) {
        anyhow::bail!(
            "lint failed with {} errors and {} warnings",
            summary.errors,
            summary.warnings
        );
    }
    Ok(())
}
