//! Build session: the poem collection plus the scratch space it is built in.
//!
//! A [`Session`] is created once per run, after poems are loaded, and is
//! handed by reference to every later step: staging images, rendering, and
//! compiling. Nothing is kept in process-wide state.
//!
//! ## Work Directory
//!
//! ```text
//! /tmp/anthology-XXXXXX/        # Session::work_dir(), compiler cwd
//! ├── staged_images/            # StagingArea
//! │   ├── dawn_sunrise.jpg
//! │   └── dusk_sunrise.jpg
//! ├── anthology.tex             # written by compile_document
//! ├── anthology.aux, .log, .toc # compiler by-products
//! └── anthology.pdf
//! ```
//!
//! The directory is a [`tempfile::TempDir`] owned by the session, so it is
//! removed whenever the session goes away: [`Session::close`] on the happy
//! path (reporting any removal error), and the `TempDir` drop on early
//! returns, `?` propagation, and panics that unwind. Termination by signal
//! skips destructors and may leave the directory behind.

use crate::compile::{self, CompileError, CompiledDocument, Compiler};
use crate::config::DocumentConfig;
use crate::render::{self, RenderError, TemplateSource};
use crate::stage::{STAGING_DIR, StageError, StagingArea};
use crate::types::{Anthology, StagedImage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Could not create work directory: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Owns the poems being assembled and the temporary build directory.
#[derive(Debug)]
pub struct Session {
    work_dir: TempDir,
    staging: StagingArea,
    anthology: Anthology,
}

impl Session {
    /// Start a session for `anthology` with a fresh temporary work directory.
    pub fn new(anthology: Anthology) -> Result<Self, SessionError> {
        let work_dir = tempfile::Builder::new().prefix("anthology-").tempdir()?;
        tracing::debug!(dir = %work_dir.path().display(), "created session work dir");
        let staging = StagingArea::new(work_dir.path().join(STAGING_DIR));
        Ok(Self {
            work_dir,
            staging,
            anthology,
        })
    }

    pub fn anthology(&self) -> &Anthology {
        &self.anthology
    }

    /// Directory the compiler runs in; staged image paths are relative to it.
    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// Where `compile_document` writes the LaTeX source.
    pub fn source_path(&self) -> PathBuf {
        self.work_dir().join(compile::SOURCE_FILENAME)
    }

    /// Store `bytes` as an image of `poem_name` and append it to that poem.
    ///
    /// On error the anthology is unchanged.
    pub fn stage_image(
        &mut self,
        poem_name: &str,
        raw_name: &str,
        bytes: &[u8],
    ) -> Result<StagedImage, StageError> {
        if !self.anthology.contains(poem_name) {
            return Err(StageError::UnknownPoem(poem_name.to_string()));
        }
        let image = self.staging.store(poem_name, raw_name, bytes)?;
        if let Some(poem) = self.anthology.get_mut(poem_name) {
            poem.images.push(image.clone());
        }
        Ok(image)
    }

    /// Stage an image file from disk under its own file name.
    pub fn attach_file(&mut self, poem_name: &str, path: &Path) -> Result<StagedImage, StageError> {
        if !self.anthology.contains(poem_name) {
            return Err(StageError::UnknownPoem(poem_name.to_string()));
        }
        let raw_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = fs::read(path).map_err(|source| StageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.stage_image(poem_name, &raw_name, &bytes)
    }

    /// Stage every `(poem, path)` pair in order.
    ///
    /// A failing attachment does not stop the rest; the failures are
    /// returned with the inputs that caused them.
    pub fn attach_all<I>(&mut self, attachments: I) -> Vec<(String, PathBuf, StageError)>
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        let mut failed = Vec::new();
        for (poem, path) in attachments {
            match self.attach_file(&poem, &path) {
                Ok(image) => tracing::debug!(
                    poem = %poem,
                    staged = %image.storage_path.display(),
                    "attached image"
                ),
                Err(err) => {
                    tracing::warn!(poem = %poem, path = %path.display(), error = %err, "skipping attachment");
                    failed.push((poem, path, err));
                }
            }
        }
        failed
    }

    /// Copy the staged images to `<dir>/staged_images/`, so a `.tex`
    /// written to `dir` finds them at the same relative paths.
    pub fn export_staged_images(&self, dir: &Path) -> io::Result<()> {
        let staged = self.work_dir().join(STAGING_DIR);
        if !staged.is_dir() {
            return Ok(());
        }
        let target = dir.join(STAGING_DIR);
        fs::create_dir_all(&target)?;
        for entry in fs::read_dir(&staged)? {
            let entry = entry?;
            fs::copy(entry.path(), target.join(entry.file_name()))?;
        }
        Ok(())
    }

    /// Copy the last written `anthology.tex` into `dir`.
    ///
    /// Returns `None` if no source has been written yet.
    pub fn keep_source(&self, dir: &Path) -> io::Result<Option<PathBuf>> {
        let source = self.source_path();
        if !source.is_file() {
            return Ok(None);
        }
        fs::create_dir_all(dir)?;
        let kept = dir.join(compile::SOURCE_FILENAME);
        fs::copy(&source, &kept)?;
        Ok(Some(kept))
    }

    /// Render the LaTeX source for the current anthology.
    pub fn render(
        &self,
        template: &TemplateSource,
        document: &DocumentConfig,
    ) -> Result<String, RenderError> {
        render::render_document(&self.anthology, self.work_dir(), template, document)
    }

    /// Render and compile. Any failure aborts the whole generation.
    pub fn generate(
        &self,
        template: &TemplateSource,
        document: &DocumentConfig,
        compiler: &dyn Compiler,
    ) -> Result<CompiledDocument, SessionError> {
        let source = self.render(template, document)?;
        let compiled = compile::compile_document(&source, self.work_dir(), compiler)?;
        Ok(compiled)
    }

    /// End the session, removing the work directory.
    pub fn close(self) -> io::Result<()> {
        let dir = self.work_dir.path().to_path_buf();
        self.work_dir.close()?;
        tracing::debug!(dir = %dir.display(), "removed session work dir");
        Ok(())
    }
}
