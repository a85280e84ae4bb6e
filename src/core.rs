/*
 * This module consolidates the platform-agnostic logic of the picker: the
 * tri-state selection tree and its visual surface, turning a repository listing
 * into tree data, ignore rules, persisted settings, and building the copied
 * bundle. Collaborators that touch the outside world (listing, settings storage,
 * file contents, clipboard, token counting) are exposed through `*Operations`
 * traits with `Core*` implementations.
 */
pub mod bundle;
pub mod file_system;
pub mod ignore_rules;
pub mod repo_tree;
pub mod selection_tree;
pub mod settings;
pub mod tokenizer_utils;
pub mod tree_node;
pub mod tree_surface;

pub use tree_node::{NodeDescriptor, NodeKind};
pub use tree_surface::{TextMountHost, TextTreeSurface};

pub use selection_tree::{ConfigurationError, SelectionTree, TreeOptions};

pub use repo_tree::{ROOT_NODE_ID, RepoEntry, build_node_descriptors, repository_root};

pub use file_system::{CoreRepositoryLister, RepositoryListingOperations, checkout_label};

pub use ignore_rules::IgnoreRules;

pub use settings::{ConfigError, CoreSettingsManager, Settings, SettingsManagerOperations};

pub use bundle::{
    BundleError, ClipboardSinkOperations, FileClipboardSink, FileContentSourceOperations,
    LocalFileContentSource, StdoutClipboardSink, create_bundle,
};

pub use tokenizer_utils::{CoreTikTokenCounter, TokenCounterOperations};
