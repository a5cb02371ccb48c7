//! Poem loading.
//!
//! Stage 1 of the anthology pipeline. Reads every `.txt` file directly inside
//! the poems directory and turns each one into a [`PoemEntry`] with its text
//! LaTeX-escaped.
//!
//! ## Directory Layout
//!
//! ```text
//! poems/
//! ├── config.toml            # Optional, see `config`
//! ├── README.txt             # Excluded by default
//! ├── dawn.txt               # Poem "dawn"
//! ├── the-road.txt           # Poem "the-road"
//! ├── drafts/                # Subdirectories are not scanned
//! │   └── unfinished.txt
//! └── images/
//!     └── sunrise.jpg        # Attached via config or --attach
//! ```
//!
//! ## Rules
//!
//! - Only regular files with a `txt` extension (any case) are poems.
//! - Files named in the exclusion list are skipped, as are hidden files.
//! - Poems are ordered by file name; that order carries through to the
//!   rendered document.
//! - The poem name is the file stem. Two files with the same stem
//!   (`dawn.txt` and `dawn.TXT`) are an error rather than a silent overwrite.
//! - A poem that cannot be read (permissions, invalid UTF-8) is skipped and
//!   reported; the rest still load.
//! - An empty directory is not an error: the caller gets
//!   [`Loaded::NoPoemsFound`] and decides what to tell the user.

use crate::escape::escape_latex;
use crate::types::{Anthology, PoemEntry};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Not a valid directory: {0}")]
    InvalidDirectory(PathBuf),
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Duplicate poem name '{name}': {first} and {second}")]
    DuplicatePoemName {
        name: String,
        first: String,
        second: String,
    },
}

/// Outcome of a successful load.
#[derive(Debug)]
pub enum Loaded {
    /// Poem files were found. Files that could not be read are listed in
    /// `skipped` (always [`LoadError::Io`]) and left out of `anthology`.
    Poems {
        anthology: Anthology,
        skipped: Vec<LoadError>,
    },
    /// The directory was readable but held no eligible poem files.
    NoPoemsFound,
}

impl Loaded {
    /// The anthology, or an empty one for [`Loaded::NoPoemsFound`].
    pub fn into_anthology(self) -> Anthology {
        match self {
            Loaded::Poems { anthology, .. } => anthology,
            Loaded::NoPoemsFound => Anthology::new(),
        }
    }

    /// Poem files that could not be read.
    pub fn skipped(&self) -> &[LoadError] {
        match self {
            Loaded::Poems { skipped, .. } => skipped,
            Loaded::NoPoemsFound => &[],
        }
    }
}

const POEM_EXTENSION: &str = "txt";

/// Load every poem file in `directory`, skipping names in `excluded`.
///
/// A file that cannot be read does not stop the others from loading; it is
/// reported in the `skipped` list of [`Loaded::Poems`]. Duplicate names and a bad
/// `directory` are fatal.
pub fn load_poems<S: AsRef<str>>(directory: &Path, excluded: &[S]) -> Result<Loaded, LoadError> {
    if !directory.is_dir() {
        return Err(LoadError::InvalidDirectory(directory.to_path_buf()));
    }

    let poem_files = collect_poem_files(directory, excluded)?;
    if poem_files.is_empty() {
        tracing::debug!(dir = %directory.display(), "no poem files found");
        return Ok(Loaded::NoPoemsFound);
    }

    let mut anthology = Anthology::new();
    let mut skipped = Vec::new();
    for path in &poem_files {
        let poem = match read_poem(path) {
            Ok(poem) => poem,
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "skipping unreadable poem");
                skipped.push(err);
                continue;
            }
        };
        tracing::debug!(poem = %poem.name, file = %path.display(), "loaded poem");
        if let Err(rejected) = anthology.push(poem) {
            let first = anthology
                .get(&rejected.name)
                .map(|p| p.source_file.clone())
                .unwrap_or_default();
            return Err(LoadError::DuplicatePoemName {
                name: rejected.name,
                first,
                second: rejected.source_file,
            });
        }
    }

    Ok(Loaded::Poems { anthology, skipped })
}

/// Eligible poem files directly inside `directory`, sorted by file name.
fn collect_poem_files<S: AsRef<str>>(
    directory: &Path,
    excluded: &[S],
) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source: std::io::Error| LoadError::Io {
        path: directory.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(directory).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if name.starts_with('.') || excluded.iter().any(|e| e.as_ref() == name) {
            continue;
        }
        if path.is_file() && is_poem_file(&path) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn is_poem_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(POEM_EXTENSION))
        .unwrap_or(false)
}

fn read_poem(path: &Path) -> Result<PoemEntry, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source_file = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(PoemEntry::new(name, source_file, escape_latex(&content)))
}
