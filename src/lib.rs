//! # Anthology
//!
//! Builds a typeset PDF anthology from a directory of plain-text poems.
//! Every `.txt` file becomes a chapter, images can be attached to individual
//! poems, and the whole book is compiled by an external LaTeX program.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! ```text
//! 1. Load     poems/*.txt     →  Anthology          (text → escaped entries)
//! 2. Stage    image files     →  staged_images/     (sanitized, per-poem names)
//! 3. Render   Anthology       →  anthology.tex      (Tera template)
//! 4. Compile  anthology.tex   →  anthology.pdf      (external compiler, two passes)
//! ```
//!
//! Stages 2 to 4 happen inside a [`session::Session`], which owns the
//! collection and a temporary build directory. The directory disappears with
//! the session.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`load`] | Stage 1: reads poem files, escapes them, builds the collection |
//! | [`stage`] | Stage 2: file name sanitizing and the staging area |
//! | [`render`] | Stage 3: fills the LaTeX template from the collection |
//! | [`compile`] | Stage 4: runs the compiler and collects the deliverables |
//! | [`session`] | Per-run state: the collection plus its build directory |
//! | [`escape`] | LaTeX special-character escaping and line-break conversion |
//! | [`config`] | `config.toml` loading, stock defaults, validation |
//! | [`types`] | `PoemEntry`, `StagedImage`, `Anthology` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Escape Once, at Load Time
//!
//! Poem text is escaped as soon as it is read, so an [`types::PoemEntry`]
//! never holds a raw LaTeX special character. The template engine runs with
//! autoescaping off and trusts what it is given. Line breaks are the one
//! transformation left for render time, since they are layout, not content.
//!
//! ## Images Are Namespaced by Poem
//!
//! Two poems can both attach `cover.png`. Staged files are named
//! `<poem>_<image>` and the staging area remembers which poem owns each path,
//! so neither attachment can overwrite the other.
//!
//! ## The Compiler Is a Trait
//!
//! [`compile::Compiler`] is the only place a process is spawned. Everything
//! up to and including the pass sequencing is tested against a mock.

pub mod compile;
pub mod config;
pub mod escape;
pub mod load;
pub mod output;
pub mod render;
pub mod session;
pub mod stage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
