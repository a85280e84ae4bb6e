use super::repo_tree::RepoEntry;
use super::tree_node::NodeKind;
use ignore::WalkBuilder;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/*
 * This module lists the contents of a local repository checkout. It walks the
 * directory with the `ignore` crate (respecting .gitignore and friends, skipping
 * hidden entries) and produces a flat list of `RepoEntry` values with
 * `/`-separated paths relative to the checkout root, which is the same shape a
 * hosted git tree listing has.
 */

#[derive(Debug)]
pub enum FileSystemError {
    Io(io::Error),
    IgnoreError(ignore::Error),
    InvalidPath(PathBuf),
}

impl From<io::Error> for FileSystemError {
    fn from(err: io::Error) -> Self {
        FileSystemError::Io(err)
    }
}

impl From<ignore::Error> for FileSystemError {
    fn from(err: ignore::Error) -> Self {
        FileSystemError::IgnoreError(err)
    }
}

impl std::fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileSystemError::Io(e) => write!(f, "I/O error: {e}"),
            FileSystemError::IgnoreError(e) => write!(f, "Ignore pattern processing error: {e}"),
            FileSystemError::InvalidPath(p) => write!(f, "Invalid path: {p:?}"),
        }
    }
}

impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileSystemError::Io(e) => Some(e),
            FileSystemError::IgnoreError(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FileSystemError>;

/*
 * Produces the flat listing of a checkout. Implementations must return paths
 * relative to `root_path`, joined with `/`, and never include the root itself.
 */
pub trait RepositoryListingOperations: Send + Sync {
    fn list_entries(&self, root_path: &Path) -> Result<Vec<RepoEntry>>;
}

pub struct CoreRepositoryLister {}

impl CoreRepositoryLister {
    pub fn new() -> Self {
        CoreRepositoryLister {}
    }
}

impl Default for CoreRepositoryLister {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryListingOperations for CoreRepositoryLister {
    fn list_entries(&self, root_path: &Path) -> Result<Vec<RepoEntry>> {
        if !root_path.is_dir() {
            return Err(FileSystemError::InvalidPath(root_path.to_path_buf()));
        }
        log::debug!("RepositoryLister: Listing checkout {root_path:?}.");

        let mut walker_builder = WalkBuilder::new(root_path);
        walker_builder
            .standard_filters(true)
            .parents(true)
            .git_global(false) // Keep listings hermetic, independent of the user's global excludes.
            .git_ignore(true)
            .git_exclude(true)
            .ignore(true)
            .hidden(true)
            .sort_by_file_path(|a, b| a.cmp(b));

        let mut entries = Vec::new();
        for entry_result in walker_builder.build() {
            let entry = entry_result?;
            if entry.path() == root_path {
                continue;
            }
            let Some(relative) = relative_repo_path(root_path, entry.path()) else {
                log::trace!(
                    "RepositoryLister: Skipping {:?} outside the checkout.",
                    entry.path()
                );
                continue;
            };
            let kind = if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                NodeKind::Directory
            } else {
                NodeKind::File
            };
            entries.push(RepoEntry {
                path: relative,
                kind,
            });
        }

        log::debug!(
            "RepositoryLister: Found {} entries in {root_path:?}.",
            entries.len()
        );
        Ok(entries)
    }
}

// `/`-joined path of `path` below `root`, or None for the root itself and anything under `.git`.
fn relative_repo_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) if segment == ".git" => return None,
            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
            _ => return None,
        }
    }
    (!segments.is_empty()).then(|| segments.join("/"))
}

/*
 * Label for the repository root node: the checkout directory name, followed by
 * the current branch in parentheses when `.git/HEAD` names one.
 */
pub fn checkout_label(root_path: &Path) -> String {
    let name = root_path
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| root_path.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root_path.display().to_string());

    match current_branch(root_path) {
        Some(branch) => format!("{name} ({branch})"),
        None => name,
    }
}

fn current_branch(root_path: &Path) -> Option<String> {
    let head = fs::read_to_string(root_path.join(".git").join("HEAD")).ok()?;
    let branch = head.trim().strip_prefix("ref: refs/heads/")?;
    (!branch.is_empty()).then(|| branch.to_string())
}
