//! LaTeX source rendering.
//!
//! Stage 3 of the anthology pipeline. Feeds the loaded poems and their staged
//! images through a Tera template and returns the complete `.tex` source.
//!
//! ## Template Lookup
//!
//! The template is always registered under the fixed name
//! [`TEMPLATE_NAME`]. It comes from one of two places:
//!
//! - [`TemplateSource::Stock`]: the template embedded in the binary
//!   (`templates/anthology_template.tex`), used when no `template_dir` is
//!   configured.
//! - [`TemplateSource::Directory`]: `<dir>/anthology_template.tex` on disk.
//!   A missing file is a [`RenderError::TemplateNotFound`], not a silent
//!   fallback to the stock template.
//!
//! ## Template Context
//!
//! ```text
//! title    escaped document title
//! author   escaped author ("" when unset)
//! poems    [{ name, title, content, images }, ...]   in anthology order
//! ```
//!
//! `content` already has its line breaks converted to `\\`, and `images` are
//! `/`-separated paths relative to the build directory, which is where the
//! compiler runs. Autoescaping is off: values are escaped for LaTeX before
//! they reach Tera.

use crate::config::DocumentConfig;
use crate::escape::{escape_latex, line_breaks};
use crate::types::Anthology;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use thiserror::Error;

/// Fixed name the template is registered and looked up under.
pub const TEMPLATE_NAME: &str = "anthology_template.tex";

/// The built-in template.
pub const STOCK_TEMPLATE: &str = include_str!("../templates/anthology_template.tex");

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template not found: {0}")]
    TemplateNotFound(PathBuf),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Staged image for '{poem}' is missing: {path}")]
    MissingImage { poem: String, path: PathBuf },
}

impl From<tera::Error> for RenderError {
    fn from(err: tera::Error) -> Self {
        RenderError::Template(error_chain(&err))
    }
}

/// Tera's top-level messages are terse ("Failed to render ..."); the useful
/// part is further down the source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Where the document template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Stock,
    Directory(PathBuf),
}

impl TemplateSource {
    /// Template source for a document config, resolving `template_dir`
    /// against `base_dir`.
    pub fn from_config(document: &DocumentConfig, base_dir: &Path) -> Self {
        match &document.template_dir {
            Some(dir) => TemplateSource::Directory(crate::config::resolve_path(base_dir, dir)),
            None => TemplateSource::Stock,
        }
    }

    /// Path of the template file, `None` for the stock template.
    pub fn path(&self) -> Option<PathBuf> {
        match self {
            TemplateSource::Stock => None,
            TemplateSource::Directory(dir) => Some(dir.join(TEMPLATE_NAME)),
        }
    }

    fn load(&self) -> Result<Tera, RenderError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        match self.path() {
            None => tera.add_raw_template(TEMPLATE_NAME, STOCK_TEMPLATE)?,
            Some(path) => {
                if !path.is_file() {
                    return Err(RenderError::TemplateNotFound(path));
                }
                tera.add_template_file(&path, Some(TEMPLATE_NAME))?;
            }
        }
        Ok(tera)
    }
}

#[derive(Debug, Serialize)]
struct TemplatePoem<'a> {
    name: &'a str,
    title: String,
    content: String,
    images: Vec<String>,
}

/// Render the anthology into LaTeX source.
///
/// `base_dir` is the directory the compiler will run in; image paths are
/// made relative to it.
pub fn render_document(
    anthology: &Anthology,
    base_dir: &Path,
    template: &TemplateSource,
    document: &DocumentConfig,
) -> Result<String, RenderError> {
    let tera = template.load()?;

    let mut poems = Vec::with_capacity(anthology.len());
    for poem in anthology {
        let mut images = Vec::with_capacity(poem.images.len());
        for image in &poem.images {
            if !image.storage_path.is_file() {
                return Err(RenderError::MissingImage {
                    poem: poem.name.clone(),
                    path: image.storage_path.clone(),
                });
            }
            images.push(tex_path(&image.storage_path, base_dir));
        }
        poems.push(TemplatePoem {
            name: &poem.name,
            title: escape_latex(&poem.name),
            content: line_breaks(&poem.escaped_content),
            images,
        });
    }

    let mut context = Context::new();
    context.insert("title", &escape_latex(&document.title));
    context.insert("author", &escape_latex(&document.author));
    context.insert("poems", &poems);

    let source = tera.render(TEMPLATE_NAME, &context)?;
    tracing::debug!(
        poems = poems.len(),
        bytes = source.len(),
        "rendered document source"
    );
    Ok(source)
}

/// Path as LaTeX wants it: relative to `base_dir` where possible, always
/// with `/` separators.
pub fn tex_path(path: &Path, base_dir: &Path) -> String {
    match path.strip_prefix(base_dir) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}
