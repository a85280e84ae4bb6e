use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/*
 * Builds the text bundle produced by the copy action: the contents of every
 * selected file, each wrapped in a header with its repository path and a fenced
 * block, ready to paste into a prompt. Where file contents come from and where
 * the bundle goes are both abstracted behind traits.
 */

const BUNDLE_SEPARATOR: &str = "=============";

#[derive(Debug)]
pub enum BundleError {
    Io { path: String, source: io::Error },
    NotFound(String),
    InvalidPath(String),
}

impl std::fmt::Display for BundleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BundleError::Io { path, source } => write!(f, "Failed to read '{path}': {source}"),
            BundleError::NotFound(path) => write!(f, "File not found: {path}"),
            BundleError::InvalidPath(path) => write!(f, "Invalid repository path: {path}"),
        }
    }
}

impl std::error::Error for BundleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BundleError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BundleError>;

pub trait FileContentSourceOperations {
    fn fetch_content(&self, path: &str) -> Result<String>;
}

pub trait ClipboardSinkOperations {
    fn write_text(&self, text: &str) -> Result<()>;
}

/*
 * Reads file contents from a local checkout. Paths are repository paths
 * (`/`-separated, relative to the checkout root); anything that would climb out
 * of the root is rejected. Invalid UTF-8 is replaced rather than failing the copy.
 */
pub struct LocalFileContentSource {
    root: PathBuf,
}

impl LocalFileContentSource {
    pub fn new(root: &Path) -> Self {
        LocalFileContentSource {
            root: root.to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.trim().is_empty() || escapes {
            return Err(BundleError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl FileContentSourceOperations for LocalFileContentSource {
    fn fetch_content(&self, path: &str) -> Result<String> {
        let full_path = self.resolve(path)?;
        log::trace!("LocalFileContentSource: Reading {full_path:?}.");
        match fs::read(&full_path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BundleError::NotFound(path.to_string()))
            }
            Err(e) => Err(BundleError::Io {
                path: path.to_string(),
                source: e,
            }),
        }
    }
}

// Writes the bundle to a file, standing in for the system clipboard.
pub struct FileClipboardSink {
    path: PathBuf,
}

impl FileClipboardSink {
    pub fn new(path: &Path) -> Self {
        FileClipboardSink {
            path: path.to_path_buf(),
        }
    }
}

impl ClipboardSinkOperations for FileClipboardSink {
    fn write_text(&self, text: &str) -> Result<()> {
        fs::write(&self.path, text).map_err(|e| BundleError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        log::debug!(
            "FileClipboardSink: Wrote {} bytes to {:?}.",
            text.len(),
            self.path
        );
        Ok(())
    }
}

pub struct StdoutClipboardSink {}

impl StdoutClipboardSink {
    pub fn new() -> Self {
        StdoutClipboardSink {}
    }
}

impl Default for StdoutClipboardSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardSinkOperations for StdoutClipboardSink {
    fn write_text(&self, text: &str) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{text}")
            .and_then(|_| stdout.flush())
            .map_err(|e| BundleError::Io {
                path: "<stdout>".to_string(),
                source: e,
            })
    }
}

/*
 * Fetches every path in order and joins the formatted sections with a blank
 * line. The first fetch failure aborts the whole bundle.
 */
pub fn create_bundle(paths: &[String], source: &dyn FileContentSourceOperations) -> Result<String> {
    let mut sections = Vec::with_capacity(paths.len());
    for path in paths {
        let content = source.fetch_content(path).inspect_err(|e| {
            log::error!("Bundle: Aborting copy, failed to fetch '{path}': {e}");
        })?;
        sections.push(format!("{BUNDLE_SEPARATOR}\n{path}\n```\n{content}\n```"));
    }
    log::debug!("Bundle: Created bundle of {} file(s).", sections.len());
    Ok(sections.join("\n\n"))
}
