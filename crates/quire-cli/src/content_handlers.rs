//! Handlers for `quire classify` and `quire transcode`.
//!
//! Each handler splits into a pure function returning a report and a thin
//! printing wrapper, so the reports can be tested without capturing stdout.

use crate::cli::Target;
use quire_core::transcode::{MediaDiagnostic, TranscodeWarning};
use quire_core::{Classification, EditorConfig, Error, Result, Transcoder, classify_detailed};
use serde::Serialize;
use std::io::Read;
use std::path::Path;

/// Read `file`, or standard input when it is `-`.
pub fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    std::fs::read_to_string(file).map_err(|e| Error::io_with_path(e, Path::new(file)))
}

// ============================================================================
// Classify
// ============================================================================

/// Classify `text` and render the one-line verdict.
pub fn classify_report(text: &str) -> (Classification, String) {
    let classification = classify_detailed(text);
    let line = if classification.ambiguous {
        format!("{} (ambiguous)", classification.format)
    } else {
        classification.format.to_string()
    };
    (classification, line)
}

/// Handle `quire classify`.
pub fn handle_classify(file: &str) -> Result<()> {
    let text = read_input(file)?;
    let (classification, line) = classify_report(&text);
    tracing::debug!(
        file,
        format = %classification.format,
        ambiguous = classification.ambiguous,
        "Classified input"
    );
    println!("{line}");
    Ok(())
}

// ============================================================================
// Transcode
// ============================================================================

/// Everything a transcode run produced besides the converted text.
#[derive(Debug, Default, Serialize)]
pub struct TranscodeReport {
    /// Converted text.
    #[serde(skip)]
    pub output: String,
    /// Inline images carried across (markdown to markup only).
    pub recovered_media_count: usize,
    /// Inline images dropped by the integrity guard.
    pub dropped_count: usize,
    /// One record per dropped image.
    pub diagnostics: Vec<MediaDiagnostic>,
    /// Non-fatal problems.
    pub warnings: Vec<TranscodeWarning>,
}

/// Convert `text` towards `target`.
pub fn transcode_report(
    text: &str,
    target: Target,
    article_id: &str,
    config: &EditorConfig,
) -> TranscodeReport {
    let transcoder = Transcoder::from_config(config);
    match target {
        Target::Markup => {
            let out = transcoder.markdown_to_markup(text, article_id);
            TranscodeReport {
                output: out.markup,
                recovered_media_count: out.recovered_media_count,
                dropped_count: out.dropped_count,
                diagnostics: out.diagnostics,
                warnings: out.warnings,
            }
        }
        Target::Markdown => {
            let out = transcoder.markup_to_markdown(text);
            TranscodeReport {
                output: out.markdown,
                warnings: out.warnings,
                ..TranscodeReport::default()
            }
        }
    }
}

/// Handle `quire transcode`.
pub fn handle_transcode(
    file: &str,
    target: Target,
    article_id: &str,
    json: bool,
    config: &EditorConfig,
) -> Result<()> {
    let text = read_input(file)?;
    let report = transcode_report(&text, target, article_id, config);

    println!("{}", report.output.trim_end());

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::invalid_data(e.to_string()))?;
        eprintln!("{rendered}");
        return Ok(());
    }
    for diagnostic in &report.diagnostics {
        eprintln!(
            "dropped image #{} ({}, {} payload chars)",
            diagnostic.match_index, diagnostic.mime_type, diagnostic.payload_len
        );
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
