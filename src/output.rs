//! CLI output formatting for generation results.
//!
//! # Result-First Display
//!
//! The primary line for every entity is its identity (fingerprint prefix for
//! images, position for bulk items and history records) plus the outcome.
//! File paths, cache state and failure details follow as indented context
//! lines.
//!
//! # Output Format
//!
//! ## Generate
//!
//! ```text
//! 3f9a0c1e22b4d7a1 png (1832 bytes)
//!     File: qrcodes/3f9a0c1e22b4d7a1.png
//!     Cache: miss
//! ```
//!
//! ## Failure
//!
//! ```text
//! Failed: InvalidColorFormat
//!     colorDark: invalid color "notacolor"
//!     Retryable: no
//! ```
//!
//! ## Bulk
//!
//! ```text
//! 001 3f9a0c1e22b4d7a1 png (1832 bytes)
//!     Cache: hit
//! 002 Failed: LogoFetchFailure
//!     ...
//!
//! Generated 1 of 2 (1 cached, 1 failed)
//! ```
//!
//! ## History
//!
//! ```text
//! 001 2026-10-16 09:12:44 url https://example.com
//!     File: 3f9a0c1e22b4d7a1.png
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::cache::CacheStats;
use crate::history::GenerationRecord;
use crate::service::{Checked, Failure, Generated};

/// Longest content shown in a history line.
const CONTENT_PREVIEW: usize = 60;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn context(label: &str, value: impl std::fmt::Display) -> String {
    format!("    {label}: {value}")
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn generated_header(generated: &Generated) -> String {
    format!(
        "{} {} ({} bytes)",
        generated.fingerprint.short(),
        generated.format.extension(),
        generated.bytes.len()
    )
}

fn generated_context(generated: &Generated) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(file) = &generated.file {
        lines.push(context("File", file.display()));
    }
    lines.push(context(
        "Cache",
        if generated.cache_hit { "hit" } else { "miss" },
    ));
    lines
}

fn failure_context(failure: &Failure) -> Vec<String> {
    let mut lines = vec![format!("    {}", failure.message)];
    if let Some(secs) = failure.retry_after {
        lines.push(context("Retry after", format!("{secs}s")));
    }
    lines.push(context("Retryable", yes_no(failure.is_retryable())));
    lines
}

// ============================================================================
// Generate
// ============================================================================

pub fn format_generated(generated: &Generated) -> Vec<String> {
    let mut lines = vec![generated_header(generated)];
    lines.extend(generated_context(generated));
    lines
}

pub fn format_failure(failure: &Failure) -> Vec<String> {
    let mut lines = vec![format!("Failed: {}", failure.kind)];
    lines.extend(failure_context(failure));
    lines
}

pub fn format_result(result: &Result<Generated, Failure>) -> Vec<String> {
    match result {
        Ok(generated) => format_generated(generated),
        Err(failure) => format_failure(failure),
    }
}

pub fn print_result(result: &Result<Generated, Failure>) {
    for line in format_result(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Bulk
// ============================================================================

pub fn format_bulk(results: &[Result<Generated, Failure>]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cached = 0;
    let mut failed = 0;
    for (i, result) in results.iter().enumerate() {
        let index = format_index(i + 1);
        match result {
            Ok(generated) => {
                if generated.cache_hit {
                    cached += 1;
                }
                lines.push(format!("{index} {}", generated_header(generated)));
                lines.extend(generated_context(generated));
            }
            Err(failure) => {
                failed += 1;
                lines.push(format!("{index} Failed: {}", failure.kind));
                lines.extend(failure_context(failure));
            }
        }
    }
    if !results.is_empty() {
        lines.push(String::new());
    }
    let succeeded = results.len() - failed;
    let mut summary = format!("Generated {succeeded} of {}", results.len());
    let mut notes = Vec::new();
    if cached > 0 {
        notes.push(format!("{cached} cached"));
    }
    if failed > 0 {
        notes.push(format!("{failed} failed"));
    }
    if !notes.is_empty() {
        summary.push_str(&format!(" ({})", notes.join(", ")));
    }
    lines.push(summary);
    lines
}

pub fn print_bulk(results: &[Result<Generated, Failure>]) {
    for line in format_bulk(results) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check(checked: &Checked) -> Vec<String> {
    let style = &checked.style;
    let mut lines = vec![format!("Valid: {}", checked.fingerprint.short())];
    lines.push(context("Category", style.category.name()));
    lines.push(context(
        "Size",
        format!("{}x{} {}", style.size, style.size, style.format.extension()),
    ));
    match &style.gradient {
        Some(g) => lines.push(context(
            "Fill",
            format!("{} gradient {} → {}", g.kind.name(), g.start, g.end),
        )),
        None => lines.push(context("Fill", style.dark_color)),
    }
    if style.transparent_background {
        lines.push(context("Background", "transparent"));
    } else {
        lines.push(context("Background", style.background_color));
    }
    if let Some(eye) = &style.eye {
        lines.push(context(
            "Eyes",
            format!(
                "outer {} {}, inner {} {}",
                eye.outer_style.value(),
                eye.outer_color,
                eye.inner_style.value(),
                eye.inner_color
            ),
        ));
    }
    if let Some(logo) = &style.logo {
        let shown = if logo.starts_with("data:") {
            "data URI".to_string()
        } else {
            truncate(logo, CONTENT_PREVIEW)
        };
        lines.push(context("Logo", shown));
    }
    if let Some(frame) = &style.frame {
        let text = frame.text.as_deref().map(|t| format!(" \"{t}\"")).unwrap_or_default();
        lines.push(context("Frame", format!("{}{text}", frame.style)));
    }
    lines.push(context("Cached", yes_no(checked.cached)));
    lines
}

pub fn print_check(checked: &Checked) {
    for line in format_check(checked) {
        println!("{}", line);
    }
}

// ============================================================================
// History and cache
// ============================================================================

pub fn format_history(records: &[GenerationRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["No generations recorded".to_string()];
    }
    let mut lines = Vec::new();
    for (i, record) in records.iter().enumerate() {
        lines.push(format!(
            "{} {} {} {}",
            format_index(i + 1),
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.category,
            truncate(&record.content, CONTENT_PREVIEW)
        ));
        match &record.file_path {
            Some(file) => lines.push(context("File", file)),
            None => lines.push(context("Format", &record.output_format)),
        }
    }
    lines
}

pub fn print_history(records: &[GenerationRecord]) {
    for line in format_history(records) {
        println!("{}", line);
    }
}

pub fn format_cache_stats(stats: &CacheStats) -> String {
    format!("Cache: {stats}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Fingerprint;
    use crate::service::ErrorKind;
    use crate::style::{OutputFormat, StyleConfig};
    use crate::test_helpers::basic_request;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn generated(cache_hit: bool) -> Generated {
        let style = StyleConfig::plain(500);
        Generated {
            bytes: vec![0; 1832],
            cache_hit,
            file: Some(PathBuf::from("qrcodes/abc.png")),
            fingerprint: Fingerprint::compute(&style, "https://example.com").unwrap(),
            format: OutputFormat::Png,
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn truncate_long_text_on_char_boundary() {
        assert_eq!(truncate("héllo wörld", 4), "héll...");
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(7), "007");
        assert_eq!(format_index(123), "123");
    }

    // =========================================================================
    // Generate
    // =========================================================================

    #[test]
    fn generated_lines() {
        let g = generated(false);
        let lines = format_generated(&g);
        assert_eq!(
            lines[0],
            format!("{} png (1832 bytes)", g.fingerprint.short())
        );
        assert_eq!(lines[1], "    File: qrcodes/abc.png");
        assert_eq!(lines[2], "    Cache: miss");
    }

    #[test]
    fn failure_lines_include_retry_hint() {
        let failure = Failure {
            retry_after: Some(12),
            ..Failure::new(ErrorKind::RateLimitExceeded, "Rate limit exceeded; retry in 12s")
        };
        let lines = format_failure(&failure);
        assert_eq!(lines[0], "Failed: RateLimitExceeded");
        assert!(lines.contains(&"    Retry after: 12s".to_string()));
        assert_eq!(lines.last().unwrap(), "    Retryable: yes");
    }

    #[test]
    fn validation_failure_is_not_retryable() {
        let failure = Failure::new(ErrorKind::InvalidColorFormat, "colorDark: bad");
        let lines = format_result(&Err(failure));
        assert_eq!(lines, ["Failed: InvalidColorFormat", "    colorDark: bad", "    Retryable: no"]);
    }

    // =========================================================================
    // Bulk
    // =========================================================================

    #[test]
    fn bulk_numbers_items_and_summarizes() {
        let results = vec![
            Ok(generated(true)),
            Err(Failure::new(ErrorKind::LogoFetchFailure, "timed out")),
            Ok(generated(false)),
        ];
        let lines = format_bulk(&results);
        assert!(lines[0].starts_with("001 "));
        assert!(lines.iter().any(|l| l == "002 Failed: LogoFetchFailure"));
        assert!(lines.iter().any(|l| l.starts_with("003 ")));
        assert_eq!(lines.last().unwrap(), "Generated 2 of 3 (1 cached, 1 failed)");
    }

    #[test]
    fn bulk_empty_summary() {
        assert_eq!(format_bulk(&[]), ["Generated 0 of 0"]);
    }

    // =========================================================================
    // Check, history, cache
    // =========================================================================

    #[test]
    fn check_lists_style() {
        let style = basic_request().validate().unwrap();
        let checked = Checked {
            fingerprint: Fingerprint::compute(&style, "https://example.com").unwrap(),
            style,
            cached: false,
        };
        let lines = format_check(&checked);
        assert!(lines[0].starts_with("Valid: "));
        assert!(lines.contains(&"    Category: url".to_string()));
        assert!(lines.contains(&"    Size: 500x500 png".to_string()));
        assert!(lines.contains(&"    Cached: no".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Frame")));
    }

    #[test]
    fn history_lines() {
        let record = GenerationRecord {
            category: "text".into(),
            content: "x".repeat(80),
            configuration: serde_json::Value::Null,
            output_format: "svg".into(),
            file_path: None,
            created_at: Utc.with_ymd_and_hms(2026, 10, 16, 9, 12, 44).unwrap(),
        };
        let lines = format_history(&[record]);
        assert_eq!(
            lines[0],
            format!("001 2026-10-16 09:12:44 text {}...", "x".repeat(60))
        );
        assert_eq!(lines[1], "    Format: svg");
    }

    #[test]
    fn history_empty() {
        assert_eq!(format_history(&[]), ["No generations recorded"]);
    }

    #[test]
    fn cache_stats_line() {
        let stats = CacheStats {
            hits: 3,
            coalesced: 0,
            renders: 2,
        };
        assert_eq!(format_cache_stats(&stats), "Cache: 3 cached, 2 rendered (5 total)");
    }
}
