//! Image staging.
//!
//! Stage 2 of the anthology pipeline. Attached images are copied into the
//! session's staging directory under filesystem-safe names, so the LaTeX
//! source only ever references paths the compiler can read.
//!
//! ## Naming
//!
//! A staged file is named `<poem>_<image>`, both parts run through
//! [`sanitize_filename`]:
//!
//! ```text
//! dawn + "my photo #1.png"   →  staged_images/dawn_my_photo_1.png
//! dusk + "my photo #1.png"   →  staged_images/dusk_my_photo_1.png
//! ```
//!
//! Every call to [`StagingArea::store`] is a new image and never overwrites an
//! earlier one. Two images can still map to the same file name: the same
//! poem attaching `a/x.png` and `b/x.png`, or sanitizing merging two poem
//! names (`a b` + `x.png` and `a_b` + `x.png`). The [`StagingArea`] records
//! every path it has handed out, with its owning poem, and gives a colliding
//! image the next free numeric suffix (`dawn_x-2.png`).

use crate::types::StagedImage;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Image types the document template can embed.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "pdf"];

/// Directory name of the staging area inside the session work dir.
pub const STAGING_DIR: &str = "staged_images";

#[derive(Error, Debug)]
pub enum StageError {
    #[error("No poem named '{0}'")]
    UnknownPoem(String),
    #[error("Unsupported image type '{0}' (expected one of: png, jpg, jpeg, pdf)")]
    UnsupportedImageType(String),
    #[error("Could not read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not write staged image {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Make a file name safe for the filesystem and for `\includegraphics`.
///
/// Whitespace becomes `_`, then anything other than letters, digits, `_`,
/// `-` and `.` is dropped.
///
/// ```
/// use anthology::stage::sanitize_filename;
/// assert_eq!(sanitize_filename("my photo #1.png"), "my_photo_1.png");
/// ```
pub fn sanitize_filename(raw_name: &str) -> String {
    raw_name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|&c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect()
}

/// True if `name` ends in one of [`ALLOWED_IMAGE_EXTENSIONS`] (any case).
pub fn is_supported_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| {
            let ext = e.to_string_lossy().to_lowercase();
            ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// The session's staging directory plus a record of which poem owns which
/// staged file.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    owners: HashMap<PathBuf, String>,
}

impl StagingArea {
    /// A staging area rooted at `dir`. The directory is created lazily on
    /// the first write.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            owners: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First unclaimed storage path for `sanitized_name` under `poem_name`.
    fn claim_path(&self, poem_name: &str, sanitized_name: &str) -> PathBuf {
        let base = format!("{}_{}", sanitize_filename(poem_name), sanitized_name);
        let (stem, ext) = split_extension(&base);

        let mut attempt = 1;
        loop {
            let candidate = if attempt == 1 {
                self.dir.join(&base)
            } else {
                self.dir.join(format!("{stem}-{attempt}{ext}"))
            };
            match self.owners.get(&candidate) {
                None => return candidate,
                Some(owner) => {
                    tracing::debug!(path = %candidate.display(), owner = %owner, "staged name taken");
                    attempt += 1;
                }
            }
        }
    }

    /// Write `bytes` for `poem_name` and return the staged image.
    ///
    /// Nothing is recorded unless the write succeeds.
    pub fn store(
        &mut self,
        poem_name: &str,
        raw_name: &str,
        bytes: &[u8],
    ) -> Result<StagedImage, StageError> {
        if !is_supported_image(raw_name) {
            return Err(StageError::UnsupportedImageType(raw_name.to_string()));
        }

        let sanitized_name = sanitize_filename(raw_name);
        let path = self.claim_path(poem_name, &sanitized_name);

        let write_err = |source: std::io::Error| StageError::Write {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(write_err)?;
        fs::write(&path, bytes).map_err(write_err)?;

        tracing::debug!(poem = poem_name, path = %path.display(), bytes = bytes.len(), "staged image");
        self.owners.insert(path.clone(), poem_name.to_string());

        Ok(StagedImage {
            source_name: raw_name.to_string(),
            sanitized_name,
            storage_path: path,
        })
    }
}

/// Split `name` into stem and extension (with its dot), e.g.
/// `photo.tar.png` → (`photo.tar`, `.png`).
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_spaces_and_symbols() {
        assert_eq!(sanitize_filename("my photo #1.png"), "my_photo_1.png");
    }

    #[test]
    fn sanitize_keeps_safe_chars() {
        assert_eq!(sanitize_filename("a-b_c.d.JPG"), "a-b_c.d.JPG");
    }

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_filename(r"C:\img\x.png"), "Cimgx.png");
    }

    #[test]
    fn sanitize_other_whitespace() {
        assert_eq!(sanitize_filename("tab\there.png"), "tab_here.png");
    }

    #[test]
    fn sanitize_keeps_unicode_letters() {
        assert_eq!(sanitize_filename("café (1).png"), "café_1.png");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in [
            "my photo #1.png",
            "  leading and trailing  ",
            "{weird}$name%.jpeg",
            "already_safe-name.pdf",
            "",
        ] {
            let once = sanitize_filename(raw);
            assert_eq!(sanitize_filename(&once), once, "input: {raw:?}");
        }
    }

    #[test]
    fn supported_image_extensions() {
        assert!(is_supported_image("a.png"));
        assert!(is_supported_image("a.JPG"));
        assert!(is_supported_image("a.jpeg"));
        assert!(is_supported_image("scan.pdf"));
        assert!(!is_supported_image("a.gif"));
        assert!(!is_supported_image("png"));
        assert!(!is_supported_image("a.png.txt"));
    }

    #[test]
    fn store_writes_under_poem_prefix() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::new(tmp.path().join(STAGING_DIR));

        let img = area.store("dawn", "my photo #1.png", b"png bytes").unwrap();
        assert_eq!(img.source_name, "my photo #1.png");
        assert_eq!(img.sanitized_name, "my_photo_1.png");
        assert_eq!(
            img.storage_path,
            tmp.path().join(STAGING_DIR).join("dawn_my_photo_1.png")
        );
        assert_eq!(std::fs::read(&img.storage_path).unwrap(), b"png bytes");
    }

    #[test]
    fn same_name_different_poems_distinct_paths() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::new(tmp.path().join(STAGING_DIR));

        let a = area.store("dawn", "cover.png", b"dawn").unwrap();
        let b = area.store("dusk", "cover.png", b"dusk").unwrap();
        assert_ne!(a.storage_path, b.storage_path);
        assert_eq!(std::fs::read(&a.storage_path).unwrap(), b"dawn");
        assert_eq!(std::fs::read(&b.storage_path).unwrap(), b"dusk");
    }

    #[test]
    fn sanitized_poem_name_collision_gets_suffix() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::new(tmp.path().join(STAGING_DIR));

        let a = area.store("a b", "x.png", b"first").unwrap();
        let b = area.store("a_b", "x.png", b"second").unwrap();
        assert_eq!(a.storage_path.file_name().unwrap(), "a_b_x.png");
        assert_eq!(b.storage_path.file_name().unwrap(), "a_b_x-2.png");
        assert_eq!(std::fs::read(&a.storage_path).unwrap(), b"first");
    }

    #[test]
    fn same_name_twice_for_one_poem_keeps_both() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::new(tmp.path().join(STAGING_DIR));

        let a = area.store("dawn", "x.png", b"first").unwrap();
        let b = area.store("dawn", "x.png", b"second").unwrap();
        let c = area.store("dawn", "x.png", b"third").unwrap();
        assert_eq!(a.storage_path.file_name().unwrap(), "dawn_x.png");
        assert_eq!(b.storage_path.file_name().unwrap(), "dawn_x-2.png");
        assert_eq!(c.storage_path.file_name().unwrap(), "dawn_x-3.png");
        assert_eq!(std::fs::read(&a.storage_path).unwrap(), b"first");
        assert_eq!(std::fs::read(&b.storage_path).unwrap(), b"second");
    }

    #[test]
    fn unsupported_type_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut area = StagingArea::new(tmp.path().join(STAGING_DIR));

        let result = area.store("dawn", "clip.gif", b"gif");
        assert!(matches!(result, Err(StageError::UnsupportedImageType(_))));
        assert!(!area.dir().exists());
    }

    #[test]
    fn write_failure_reported() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the staging directory should be
        let blocker = tmp.path().join(STAGING_DIR);
        std::fs::write(&blocker, "not a dir").unwrap();
        let mut area = StagingArea::new(blocker);

        let result = area.store("dawn", "x.png", b"bytes");
        assert!(matches!(result, Err(StageError::Write { .. })));
    }

    #[test]
    fn split_extension_cases() {
        assert_eq!(split_extension("a.png"), ("a", ".png"));
        assert_eq!(split_extension("a.b.png"), ("a.b", ".png"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }
}
