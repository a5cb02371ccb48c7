//! Shared test utilities for the anthology test suite.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let anthology = load_poems(tmp.path(), &default_exclusions())
//!     .unwrap()
//!     .into_anthology();
//!
//! let dawn = find_poem(&anthology, "dawn");
//! assert!(dawn.images.is_empty());
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::types::{Anthology, PoemEntry};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/poems/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/poems");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// Find a poem by name. Panics if not found.
pub fn find_poem<'a>(anthology: &'a Anthology, name: &str) -> &'a PoemEntry {
    anthology.get(name).unwrap_or_else(|| {
        panic!(
            "poem '{name}' not found. Available: {:?}",
            anthology.names()
        )
    })
}

/// Sanitized names of a poem's staged images, in order.
pub fn image_names(poem: &PoemEntry) -> Vec<&str> {
    poem.images
        .iter()
        .map(|i| i.sanitized_name.as_str())
        .collect()
}
