//! CLI output formatting for all pipeline stages.
//!
//! Each stage has a `format_*` function returning `Vec<String>` and, where
//! the CLI needs it, a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects, easy to test.
//!
//! # Output Format
//!
//! ## Load
//!
//! ```text
//! Poems
//! 001 dawn (2 images)
//!     Source: dawn.txt
//!     I woke before the birds, and the window
//!     001 sunrise.jpg
//!         Staged: dawn_sunrise.jpg
//!     002 fog.png
//!         Staged: dawn_fog.png
//! 002 ledger
//!     Source: ledger.txt
//!     Paid \$5 for a candle, 50\% off
//! ```
//!
//! ## Generate
//!
//! ```text
//! anthology.pdf (application/pdf, 48213 bytes) → out/anthology.pdf
//! anthology.tex (text/plain, 2210 bytes) → out/anthology.tex
//! ```
//!
//! ## Compile failure
//!
//! ```text
//! Compiler failed on pass 1 (exit status: 1)
//! Compiler stderr:
//! <stderr, verbatim>
//! Compiler output:
//! <stdout, verbatim>
//! ```

use crate::compile::Deliverable;
use crate::types::{Anthology, PoemEntry};
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Poem header: index, name, and image count when there are any.
fn poem_header(index: usize, poem: &PoemEntry) -> String {
    match poem.images.len() {
        0 => format!("{} {}", format_index(index), poem.name),
        1 => format!("{} {} (1 image)", format_index(index), poem.name),
        n => format!("{} {} ({} images)", format_index(index), poem.name, n),
    }
}

/// Truncate to `max` characters, appending `...` if anything was cut.
fn truncate_line(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((byte_pos, _)) => format!("{}...", &text[..byte_pos]),
    }
}

/// First non-blank line of a poem, for a one-line preview.
fn first_line(content: &str) -> Option<&str> {
    content.lines().map(str::trim).find(|l| !l.is_empty())
}

// ============================================================================
// Load output
// ============================================================================

/// Format the loaded anthology as an inventory.
pub fn format_load_output(anthology: &Anthology) -> Vec<String> {
    let mut lines = vec!["Poems".to_string()];

    for (i, poem) in anthology.iter().enumerate() {
        lines.push(poem_header(i + 1, poem));
        lines.push(format!("{}Source: {}", indent(1), poem.source_file));
        if let Some(line) = first_line(&poem.escaped_content) {
            lines.push(format!("{}{}", indent(1), truncate_line(line, 60)));
        }
        for (j, image) in poem.images.iter().enumerate() {
            lines.push(format!(
                "{}{} {}",
                indent(1),
                format_index(j + 1),
                image.source_name
            ));
            let staged = image
                .storage_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            lines.push(format!("{}Staged: {}", indent(2), staged));
        }
    }

    lines
}

/// Print the anthology inventory to stdout.
pub fn print_load_output(anthology: &Anthology) {
    for line in format_load_output(anthology) {
        println!("{}", line);
    }
}

/// Message shown when the poems directory has nothing to load.
pub fn format_no_poems(dir: &Path) -> String {
    format!(
        "No .txt poems found in {} (excluded files are skipped)",
        dir.display()
    )
}

/// Line shown for a poem file that could not be read.
pub fn format_skipped_poem(reason: &str) -> String {
    format!("Skipped poem: {}", reason)
}

/// Line shown for an attachment that could not be staged.
pub fn format_skipped_attachment(poem: &str, path: &Path, reason: &str) -> String {
    format!("Skipped {} for '{}': {}", path.display(), poem, reason)
}

/// Closing line of `check`.
pub fn format_check_summary(anthology: &Anthology) -> String {
    let poems = anthology.len();
    format!(
        "{} {} ready",
        poems,
        if poems == 1 { "poem" } else { "poems" }
    )
}

// ============================================================================
// Generate output
// ============================================================================

/// One line per written deliverable.
pub fn format_written(written: &[(&Deliverable, &Path)]) -> Vec<String> {
    written
        .iter()
        .map(|(d, path)| {
            format!(
                "{} ({}, {} bytes) → {}",
                d.file_name,
                d.content_type,
                d.bytes.len(),
                path.display()
            )
        })
        .collect()
}

/// Compiler failure report with both captured streams, unmodified.
pub fn format_compile_failure(pass: u32, status: &str, stdout: &str, stderr: &str) -> Vec<String> {
    let mut lines = vec![format!("Compiler failed on pass {} ({})", pass, status)];
    for (label, text) in [("Compiler stderr:", stderr), ("Compiler output:", stdout)] {
        if text.trim().is_empty() {
            continue;
        }
        lines.push(label.to_string());
        lines.extend(text.lines().map(str::to_string));
    }
    lines
}
