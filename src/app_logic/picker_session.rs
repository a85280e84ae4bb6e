use super::command_parser::{HELP_TEXT, UserCommand};
use crate::core::{
    BundleError, ClipboardSinkOperations, ConfigError, ConfigurationError,
    FileContentSourceOperations, IgnoreRules, NodeDescriptor, NodeKind, ROOT_NODE_ID, RepoEntry,
    SelectionTree, Settings, SettingsManagerOperations, TextMountHost, TextTreeSurface,
    TokenCounterOperations, TreeOptions, build_node_descriptors, create_bundle, repository_root,
};
use glob::Pattern;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub const TREE_MOUNT_POINT: &str = "#repo-tree";
pub const NOTHING_SELECTED_MESSAGE: &str = "Please select at least one file to copy";

pub fn copy_button_label(file_count: usize) -> String {
    format!("Copy {file_count} Files to Clipboard")
}

fn selected_file_count(tree: &SelectionTree<TextTreeSurface>) -> usize {
    tree.selected_nodes()
        .iter()
        .filter(|node| node.kind == NodeKind::File)
        .count()
}

#[derive(Debug)]
pub enum SessionError {
    Tree(ConfigurationError),
    NothingSelected,
    Bundle(BundleError),
    Settings(ConfigError),
    InvalidPattern(glob::PatternError),
}

impl From<ConfigurationError> for SessionError {
    fn from(err: ConfigurationError) -> Self {
        SessionError::Tree(err)
    }
}

impl From<BundleError> for SessionError {
    fn from(err: BundleError) -> Self {
        SessionError::Bundle(err)
    }
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        SessionError::Settings(err)
    }
}

impl From<glob::PatternError> for SessionError {
    fn from(err: glob::PatternError) -> Self {
        SessionError::InvalidPattern(err)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Tree(e) => write!(f, "{e}"),
            SessionError::NothingSelected => write!(f, "{NOTHING_SELECTED_MESSAGE}"),
            SessionError::Bundle(e) => write!(f, "Error fetching file contents: {e}"),
            SessionError::Settings(e) => write!(f, "{e}"),
            SessionError::InvalidPattern(e) => write!(f, "Invalid glob pattern: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Tree(e) => Some(e),
            SessionError::Bundle(e) => Some(e),
            SessionError::Settings(e) => Some(e),
            SessionError::InvalidPattern(e) => Some(e),
            SessionError::NothingSelected => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

// The collaborators a session talks to. Everything is injectable for tests.
#[derive(Clone)]
pub struct PickerServices {
    pub settings_manager: Arc<dyn SettingsManagerOperations>,
    pub content_source: Arc<dyn FileContentSourceOperations>,
    pub clipboard: Arc<dyn ClipboardSinkOperations>,
    pub token_counter: Arc<dyn TokenCounterOperations>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub copied_paths: Vec<String>,
    pub skipped_ignored: Vec<String>,
    pub token_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReply {
    Message(String),
    Quit,
}

/*
 * Presenter for one picking session over one repository. It owns the selection
 * tree (rendered into a text surface), the ignore rules from the saved settings
 * and the copy-button label, which the tree's change hook keeps current.
 *
 * Ignored paths stay selectable; they are flagged on the surface and left out
 * when the bundle is built.
 */
pub struct PickerSession {
    pub(crate) tree: SelectionTree<TextTreeSurface>,
    pub(crate) copy_label: Rc<RefCell<String>>,
    pub(crate) ignore_rules: IgnoreRules,
    pub(crate) settings: Settings,
    pub(crate) services: PickerServices,
}

impl PickerSession {
    /*
     * Loads settings (falling back to defaults if they cannot be read), builds
     * the tree data from `entries` under a root labelled `repo_label`, and mounts
     * it at `TREE_MOUNT_POINT` on `host`.
     */
    pub fn start(
        host: &mut TextMountHost,
        repo_label: &str,
        entries: &[RepoEntry],
        services: PickerServices,
    ) -> Result<Self> {
        Self::start_filtered(host, repo_label, entries, services, None)
    }

    // Like `start`, but only paths matching `only` (and their ancestors) enter the tree.
    pub fn start_filtered(
        host: &mut TextMountHost,
        repo_label: &str,
        entries: &[RepoEntry],
        services: PickerServices,
        only: Option<&Pattern>,
    ) -> Result<Self> {
        let settings = services.settings_manager.load_settings().unwrap_or_else(|e| {
            log::warn!("PickerSession: Could not load settings ({e}), using defaults.");
            Settings::default()
        });
        let ignore_rules = IgnoreRules::parse(&settings.ignore_patterns);

        let mut forest = build_node_descriptors(entries);
        if let Some(pattern) = only {
            forest = NodeDescriptor::filter_by_glob(&forest, pattern);
        }
        let data = vec![repository_root(repo_label, forest)];
        let copy_label = Rc::new(RefCell::new(copy_button_label(0)));
        let label_for_hook = Rc::clone(&copy_label);
        let mut options =
            TreeOptions::new(data).on_change(move |tree: &SelectionTree<TextTreeSurface>| {
                *label_for_hook.borrow_mut() = copy_button_label(selected_file_count(tree));
            });
        if let Some(depth) = settings.close_depth {
            options = options.close_depth(depth);
        }

        let tree = SelectionTree::mount(host, TREE_MOUNT_POINT, options)?;
        let mut session = PickerSession {
            tree,
            copy_label,
            ignore_rules,
            settings,
            services,
        };
        session.refresh_ignored_marks();
        log::debug!(
            "PickerSession: Started for '{repo_label}' with {} entries.",
            entries.len()
        );
        Ok(session)
    }

    pub fn tree(&self) -> &SelectionTree<TextTreeSurface> {
        &self.tree
    }

    pub fn copy_label(&self) -> String {
        self.copy_label.borrow().clone()
    }

    pub fn render(&self) -> String {
        format!("{}\n[{}]", self.tree.surface().render(), self.copy_label())
    }

    pub fn handle_command(&mut self, command: UserCommand) -> Result<SessionReply> {
        log::trace!("PickerSession: Handling {command:?}.");
        let reply = match command {
            UserCommand::Toggle(id) => {
                if self.tree.on_item_click(&id) {
                    self.render()
                } else {
                    format!("'{id}' is not a selectable node.")
                }
            }
            UserCommand::Open(id) => {
                self.tree.on_switcher_click(&id);
                self.render()
            }
            UserCommand::ExpandAll => {
                self.tree.expand_all();
                self.render()
            }
            UserCommand::CollapseAll => {
                self.tree.collapse_all();
                self.render()
            }
            UserCommand::Select(glob) => {
                let matched = self.select_matching(&glob)?;
                format!("Selected {matched} node(s) matching '{glob}'.\n{}", self.render())
            }
            UserCommand::Clear => {
                self.tree.set_values::<&str>(&[]);
                self.render()
            }
            UserCommand::Ignore(pattern) => {
                self.add_ignore_pattern(&pattern)?;
                format!("Added ignore pattern '{pattern}'.\n{}", self.render())
            }
            UserCommand::Copy => {
                let report = self.copy_selection()?;
                format_copy_report(&report)
            }
            UserCommand::Show => self.render(),
            UserCommand::Help => HELP_TEXT.to_string(),
            UserCommand::Quit => return Ok(SessionReply::Quit),
        };
        Ok(SessionReply::Message(reply))
    }

    // Replaces the selection with every node whose path or label matches `glob`.
    pub fn select_matching(&mut self, glob: &str) -> Result<usize> {
        let pattern = Pattern::new(glob)?;
        let ids = self.tree.ids_matching(&pattern);
        self.tree.set_values(&ids);
        Ok(ids.len())
    }

    /*
     * Appends a pattern to the saved ignore rules. The settings are persisted
     * before the in-memory rules change, so a failed save leaves both untouched.
     */
    pub fn add_ignore_pattern(&mut self, pattern: &str) -> Result<()> {
        let mut updated = self.settings.clone();
        if !updated.ignore_patterns.is_empty() && !updated.ignore_patterns.ends_with('\n') {
            updated.ignore_patterns.push('\n');
        }
        updated.ignore_patterns.push_str(pattern.trim());
        updated.ignore_patterns.push('\n');
        self.services.settings_manager.save_settings(&updated)?;

        self.ignore_rules = IgnoreRules::parse(&updated.ignore_patterns);
        self.settings = updated;
        self.refresh_ignored_marks();
        Ok(())
    }

    /*
     * Gathers the selected file nodes in tree order, drops ignored ones, and
     * writes the bundle of their contents to the clipboard sink.
     */
    pub fn copy_selection(&self) -> Result<CopyReport> {
        let (skipped_ignored, copied_paths): (Vec<String>, Vec<String>) = self
            .tree
            .selected_nodes()
            .into_iter()
            .filter(|node| node.kind == NodeKind::File)
            .map(|node| node.id)
            .partition(|id| self.ignore_rules.is_ignored(id, false));

        if copied_paths.is_empty() {
            log::debug!("PickerSession: Copy requested with no eligible files selected.");
            return Err(SessionError::NothingSelected);
        }

        let bundle = create_bundle(&copied_paths, self.services.content_source.as_ref())?;
        self.services.clipboard.write_text(&bundle)?;
        let token_count = self.services.token_counter.count_tokens(&bundle);
        log::debug!(
            "PickerSession: Copied {} file(s), ~{token_count} tokens, skipped {} ignored.",
            copied_paths.len(),
            skipped_ignored.len()
        );
        Ok(CopyReport {
            copied_paths,
            skipped_ignored,
            token_count,
        })
    }

    fn refresh_ignored_marks(&mut self) {
        let marks: Vec<(String, bool)> = self
            .tree
            .ids()
            .filter(|id| *id != ROOT_NODE_ID)
            .map(|id| {
                let is_dir = self
                    .tree
                    .node(id)
                    .is_some_and(|node| node.kind == NodeKind::Directory);
                (id.to_string(), self.ignore_rules.is_ignored(id, is_dir))
            })
            .collect();
        let surface = self.tree.surface_mut();
        for (id, ignored) in &marks {
            surface.set_ignored(id, *ignored);
        }
        log::trace!(
            "PickerSession: {} node(s) marked ignored.",
            marks.iter().filter(|(_, ignored)| *ignored).count()
        );
    }
}

fn format_copy_report(report: &CopyReport) -> String {
    let mut out = format!(
        "Successfully copied these files to clipboard:\n{}\n(~{} tokens)",
        report.copied_paths.join("\n"),
        report.token_count
    );
    if !report.skipped_ignored.is_empty() {
        out.push_str(&format!(
            "\nSkipped ignored files:\n{}",
            report.skipped_ignored.join("\n")
        ));
    }
    out
}
