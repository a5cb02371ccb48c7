//! Shared types passed between pipeline stages.
//!
//! The loader creates [`PoemEntry`] values, the stager appends
//! [`StagedImage`]s to them, and the renderer reads the whole [`Anthology`].

use serde::Serialize;
use std::path::PathBuf;

/// One poem: its escaped text and the images attached to it.
#[derive(Debug, Clone, Serialize)]
pub struct PoemEntry {
    /// File stem of the source file (`dawn.txt` → `dawn`). Unique per anthology.
    pub name: String,
    /// File name the poem was read from, for display.
    pub source_file: String,
    /// Full poem text with LaTeX specials escaped. Newlines are kept as-is
    /// and turned into `\\` markers at render time.
    pub escaped_content: String,
    /// Staged images in attach order.
    pub images: Vec<StagedImage>,
}

impl PoemEntry {
    pub fn new(name: impl Into<String>, source_file: impl Into<String>, escaped_content: String) -> Self {
        Self {
            name: name.into(),
            source_file: source_file.into(),
            escaped_content,
            images: Vec::new(),
        }
    }
}

/// An image file copied into the session's staging area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedImage {
    /// Name as supplied by the user (`my photo #1.png`).
    pub source_name: String,
    /// Filesystem-safe form of `source_name` (`my_photo_1.png`).
    pub sanitized_name: String,
    /// Absolute location of the stored bytes.
    pub storage_path: PathBuf,
}

/// Ordered poem collection.
///
/// Insertion order is the render order. Names are unique; the loader rejects
/// duplicates before they get here, and [`Anthology::push`] refuses them too.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Anthology {
    poems: Vec<PoemEntry>,
}

impl Anthology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a poem. Returns the poem back if its name is already taken.
    pub fn push(&mut self, poem: PoemEntry) -> Result<(), PoemEntry> {
        if self.contains(&poem.name) {
            return Err(poem);
        }
        self.poems.push(poem);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.poems.iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&PoemEntry> {
        self.poems.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PoemEntry> {
        self.poems.iter_mut().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoemEntry> {
        self.poems.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.poems.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.poems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poems.is_empty()
    }

    /// Total number of staged images across all poems.
    pub fn image_count(&self) -> usize {
        self.poems.iter().map(|p| p.images.len()).sum()
    }
}

impl<'a> IntoIterator for &'a Anthology {
    type Item = &'a PoemEntry;
    type IntoIter = std::slice::Iter<'a, PoemEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.poems.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poem(name: &str) -> PoemEntry {
        PoemEntry::new(name, format!("{name}.txt"), "text".to_string())
    }

    #[test]
    fn push_preserves_insertion_order() {
        let mut anthology = Anthology::new();
        anthology.push(poem("zebra")).unwrap();
        anthology.push(poem("apple")).unwrap();
        anthology.push(poem("mango")).unwrap();
        assert_eq!(anthology.names(), vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn push_rejects_duplicate_name() {
        let mut anthology = Anthology::new();
        anthology.push(poem("dawn")).unwrap();
        let rejected = anthology.push(poem("dawn")).unwrap_err();
        assert_eq!(rejected.name, "dawn");
        assert_eq!(anthology.len(), 1);
    }

    #[test]
    fn get_mut_allows_appending_images() {
        let mut anthology = Anthology::new();
        anthology.push(poem("dawn")).unwrap();
        anthology.get_mut("dawn").unwrap().images.push(StagedImage {
            source_name: "a.png".into(),
            sanitized_name: "a.png".into(),
            storage_path: PathBuf::from("/tmp/a.png"),
        });
        assert_eq!(anthology.image_count(), 1);
        assert!(anthology.get("missing").is_none());
    }
}
