//! LaTeX compilation.
//!
//! Stage 4 of the anthology pipeline. Writes the rendered source to
//! `anthology.tex` in the build directory, runs the external compiler on it
//! twice, and reads back the PDF and the source as [`Deliverable`]s.
//!
//! ## Why Two Passes
//!
//! LaTeX writes cross-reference data (table of contents, labels) to `.aux`
//! and `.toc` files during a run and only reads them on the next one. The
//! second pass picks up what the first emitted. A third pass is never needed
//! for the stock template, and a failed pass is never retried: compile
//! errors come from the content and need a human.
//!
//! ## The Compiler Seam
//!
//! [`Compiler`] abstracts a single invocation. [`ExternalCompiler`] spawns a
//! real process (default `pdflatex`) with stdin closed and both output
//! streams captured. Tests substitute a recording mock.
//!
//! ## Failure
//!
//! A non-zero exit stops immediately with [`CompileError::Failed`], carrying
//! the captured stdout and stderr verbatim. The source file is left where it
//! was written so it can be inspected. Output files are checked for
//! existence before they are read; a zero exit does not prove the PDF exists.

use crate::config::CompilerConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

/// File name of the generated LaTeX source.
pub const SOURCE_FILENAME: &str = "anthology.tex";

/// File name the compiler produces from [`SOURCE_FILENAME`].
pub const OUTPUT_FILENAME: &str = "anthology.pdf";

/// Number of compiler runs per build.
pub const COMPILE_PASSES: u32 = 2;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Could not write {path}: {source}")]
    WriteSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Compiler failed on pass {pass} ({status})")]
    Failed {
        pass: u32,
        status: String,
        stdout: String,
        stderr: String,
    },
    #[error("Expected output file missing: {0}")]
    MissingOutput(PathBuf),
    #[error("Could not read {path}: {source}")]
    ReadOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Captured result of one compiler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub success: bool,
    /// Human-readable exit status, e.g. `exit status: 1`.
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

/// A single invocation of the typesetting program.
pub trait Compiler {
    /// Run once on `source_file` (a bare file name) inside `work_dir`.
    ///
    /// `Err` means the program could not be started at all; a program that
    /// ran and failed is `Ok` with `success == false`.
    fn run(&self, work_dir: &Path, source_file: &str) -> io::Result<RunOutput>;

    /// Program name for error messages.
    fn program(&self) -> &str;
}

/// Runs an external program as `<program> [args...] <source_file>`.
#[derive(Debug, Clone)]
pub struct ExternalCompiler {
    program: String,
    args: Vec<String>,
}

impl ExternalCompiler {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

impl Compiler for ExternalCompiler {
    fn run(&self, work_dir: &Path, source_file: &str) -> io::Result<RunOutput> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source_file)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .output()?;

        Ok(RunOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn program(&self) -> &str {
        &self.program
    }
}

/// A downloadable file: fixed name, content type, and bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliverable {
    pub file_name: &'static str,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Deliverable {
    /// Write the payload to `dir/<file_name>`, creating `dir` if needed.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name);
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Both outputs of a successful build.
#[derive(Debug, Clone)]
pub struct CompiledDocument {
    /// The typeset PDF (`application/pdf`).
    pub document: Deliverable,
    /// The LaTeX source it was built from (`text/plain`).
    pub source: Deliverable,
}

impl CompiledDocument {
    pub fn deliverables(&self) -> [&Deliverable; 2] {
        [&self.document, &self.source]
    }
}

/// Write `source_text` into `work_dir` and compile it.
pub fn compile_document(
    source_text: &str,
    work_dir: &Path,
    compiler: &dyn Compiler,
) -> Result<CompiledDocument, CompileError> {
    let source_path = write_source(source_text, work_dir)?;

    for pass in 1..=COMPILE_PASSES {
        tracing::info!(program = compiler.program(), pass, "running compiler");
        let run = compiler
            .run(work_dir, SOURCE_FILENAME)
            .map_err(|source| CompileError::Spawn {
                program: compiler.program().to_string(),
                source,
            })?;
        if !run.success {
            tracing::warn!(pass, status = %run.status, "compiler failed");
            return Err(CompileError::Failed {
                pass,
                status: run.status,
                stdout: run.stdout,
                stderr: run.stderr,
            });
        }
    }

    let document = read_deliverable(
        &work_dir.join(OUTPUT_FILENAME),
        OUTPUT_FILENAME,
        "application/pdf",
    )?;
    let source = read_deliverable(&source_path, SOURCE_FILENAME, "text/plain")?;
    Ok(CompiledDocument { document, source })
}

/// Write the LaTeX source to its fixed location in `work_dir`.
pub fn write_source(source_text: &str, work_dir: &Path) -> Result<PathBuf, CompileError> {
    let path = work_dir.join(SOURCE_FILENAME);
    fs::write(&path, source_text).map_err(|source| CompileError::WriteSource {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn read_deliverable(
    path: &Path,
    file_name: &'static str,
    content_type: &'static str,
) -> Result<Deliverable, CompileError> {
    if !path.is_file() {
        return Err(CompileError::MissingOutput(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| CompileError::ReadOutput {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Deliverable {
        file_name,
        content_type,
        bytes,
    })
}
