use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use super::layout::KeyLabel;

pub const EXPORT_FILENAME: &str = "typed_text.txt";
pub const EXPORT_MIME: &str = "text/plain";

/// The session's typed text. Only [`TextBuffer::apply`] and the primitive
/// edits below mutate it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

/// Result of applying one key to the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Edited,
    /// Enter on a non-blank buffer. The caller exports `contents` and then
    /// clears the buffer.
    Submit { contents: String },
    Cleared,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn delete_last(&mut self) {
        self.text.pop();
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn apply(&mut self, label: KeyLabel) -> KeyAction {
        match label {
            KeyLabel::Char(ch) => {
                self.append(ch.encode_utf8(&mut [0; 4]));
                KeyAction::Edited
            }
            KeyLabel::Space => {
                self.append(" ");
                KeyAction::Edited
            }
            KeyLabel::Backspace => {
                self.delete_last();
                KeyAction::Edited
            }
            KeyLabel::Enter if self.is_blank() => {
                self.clear();
                KeyAction::Cleared
            }
            KeyLabel::Enter => KeyAction::Submit {
                contents: self.text.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportArtifact {
    pub path: PathBuf,
    pub mime: &'static str,
    pub bytes: usize,
}

/// Receives the buffer contents when the user submits with enter.
pub trait Exporter: Send {
    fn export(&mut self, contents: &str) -> Result<ExportArtifact>;
}

/// Writes `typed_text.txt` into a directory, picking `typed_text (n).txt`
/// when the name is taken, like a browser download would.
pub struct FileExporter {
    dir: PathBuf,
}

impl FileExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn next_free_path(&self) -> PathBuf {
        let first = self.dir.join(EXPORT_FILENAME);
        if !first.exists() {
            return first;
        }
        let stem = Path::new(EXPORT_FILENAME)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("typed_text");
        (1..)
            .map(|n| self.dir.join(format!("{stem} ({n}).txt")))
            .find(|path| !path.exists())
            .unwrap_or(first)
    }
}

impl Exporter for FileExporter {
    fn export(&mut self, contents: &str) -> Result<ExportArtifact> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create export directory {}", self.dir.display()))?;
        let path = self.next_free_path();
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("exported {} bytes to {}", contents.len(), path.display());

        Ok(ExportArtifact {
            path,
            mime: EXPORT_MIME,
            bytes: contents.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::{Arc, Mutex};

    use anyhow::{Result, bail};

    use super::{EXPORT_FILENAME, EXPORT_MIME, ExportArtifact, Exporter};

    /// Keeps exported contents in memory; can be told to fail.
    #[derive(Clone, Default)]
    pub struct RecordingExporter {
        pub exported: Arc<Mutex<Vec<String>>>,
        pub fail: bool,
    }

    impl RecordingExporter {
        pub fn exports(&self) -> Vec<String> {
            self.exported.lock().unwrap().clone()
        }
    }

    impl Exporter for RecordingExporter {
        fn export(&mut self, contents: &str) -> Result<ExportArtifact> {
            if self.fail {
                bail!("disk full");
            }
            self.exported.lock().unwrap().push(contents.to_string());
            Ok(ExportArtifact {
                path: EXPORT_FILENAME.into(),
                mime: EXPORT_MIME,
                bytes: contents.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(text: &str) -> TextBuffer {
        let mut buffer = TextBuffer::new();
        buffer.append(text);
        buffer
    }

    #[test]
    fn chars_and_space_append() {
        let mut buf = buffer("A");
        assert_eq!(buf.apply(KeyLabel::Space), KeyAction::Edited);
        assert_eq!(buf.as_str(), "A ");
        buf.apply(KeyLabel::Char('b'));
        assert_eq!(buf.as_str(), "A b");
    }

    #[test]
    fn backspace_removes_last_char() {
        let mut buf = buffer("AB");
        buf.apply(KeyLabel::Backspace);
        assert_eq!(buf.as_str(), "A");
    }

    #[test]
    fn delete_after_clear_is_noop() {
        let mut buf = buffer("Hello");
        buf.clear();
        buf.delete_last();
        assert_eq!(buf, TextBuffer::new());
        buf.apply(KeyLabel::Backspace);
        assert_eq!(buf.as_str(), "");
    }

    #[test]
    fn enter_submits_full_contents() {
        let mut buf = buffer("Hi");
        assert_eq!(
            buf.apply(KeyLabel::Enter),
            KeyAction::Submit {
                contents: "Hi".to_string()
            }
        );
    }

    #[test]
    fn enter_on_blank_buffer_only_clears() {
        let mut buf = buffer("   ");
        assert_eq!(buf.apply(KeyLabel::Enter), KeyAction::Cleared);
        assert_eq!(buf.as_str(), "");
    }

    #[test]
    fn file_exporter_never_overwrites() {
        let dir = std::env::temp_dir().join(format!("air-keys-export-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let mut exporter = FileExporter::new(&dir);

        let first = exporter.export("one").unwrap();
        let second = exporter.export("two").unwrap();
        assert_eq!(first.path, dir.join(EXPORT_FILENAME));
        assert_eq!(second.path, dir.join("typed_text (1).txt"));
        assert_eq!(first.mime, "text/plain");
        assert_eq!(fs::read_to_string(&first.path).unwrap(), "one");
        assert_eq!(fs::read_to_string(&second.path).unwrap(), "two");

        let _ = fs::remove_dir_all(&dir);
    }
}
