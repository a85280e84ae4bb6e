use super::tree_node::{NodeDescriptor, NodeKind};
use std::cmp::Ordering;
use std::collections::HashMap;

/*
 * Turns a flat repository listing (one entry per path, like a git tree listing)
 * into the nested descriptor forest the selection tree consumes. Node ids are
 * the full `/`-joined paths so they stay unique across directories; labels are
 * the last path segment.
 */

// Listing paths are relative and never start with `/`, so this cannot collide.
pub const ROOT_NODE_ID: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEntry {
    pub path: String,
    pub kind: NodeKind,
}

impl RepoEntry {
    pub fn file(path: &str) -> Self {
        RepoEntry {
            path: path.to_string(),
            kind: NodeKind::File,
        }
    }

    pub fn directory(path: &str) -> Self {
        RepoEntry {
            path: path.to_string(),
            kind: NodeKind::Directory,
        }
    }
}

#[derive(Debug)]
struct PendingNode {
    path: String,
    name: String,
    kind: NodeKind,
    children: HashMap<String, PendingNode>,
}

impl PendingNode {
    fn new(path: String, name: &str, kind: NodeKind) -> Self {
        PendingNode {
            path,
            name: name.to_string(),
            kind,
            children: HashMap::new(),
        }
    }

    fn into_descriptor(self) -> NodeDescriptor {
        match self.kind {
            NodeKind::File => NodeDescriptor::file(&self.path, &self.name),
            NodeKind::Directory => {
                let children = into_sorted_descriptors(self.children);
                NodeDescriptor::directory(&self.path, &self.name, children)
            }
        }
    }
}

// Directories first, then by name ignoring case; exact name breaks ties.
fn compare_pending(a: &PendingNode, b: &PendingNode) -> Ordering {
    match (a.kind, b.kind) {
        (NodeKind::Directory, NodeKind::File) => Ordering::Less,
        (NodeKind::File, NodeKind::Directory) => Ordering::Greater,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    }
}

fn into_sorted_descriptors(nodes: HashMap<String, PendingNode>) -> Vec<NodeDescriptor> {
    let mut nodes: Vec<PendingNode> = nodes.into_values().collect();
    nodes.sort_by(compare_pending);
    nodes.into_iter().map(PendingNode::into_descriptor).collect()
}

/*
 * Builds the nested forest from `entries`. Missing intermediate directories are
 * synthesized, so a listing that only names files still produces a full tree.
 * Entries with an empty path are skipped with a warning. A path listed as a file
 * that also has entries below it is treated as a directory.
 */
pub fn build_node_descriptors(entries: &[RepoEntry]) -> Vec<NodeDescriptor> {
    let mut top_level: HashMap<String, PendingNode> = HashMap::new();

    for entry in entries {
        let segments: Vec<&str> = entry
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let Some((last, parents)) = segments.split_last() else {
            log::warn!("RepoTree: Skipping repository entry without a path: {entry:?}");
            continue;
        };

        let mut level = &mut top_level;
        let mut path = String::new();
        for segment in parents {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
            let node = level
                .entry(segment.to_string())
                .or_insert_with(|| PendingNode::new(path.clone(), segment, NodeKind::Directory));
            node.kind = NodeKind::Directory;
            level = &mut node.children;
        }

        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(last);
        let node = level
            .entry(last.to_string())
            .or_insert_with(|| PendingNode::new(path, last, entry.kind));
        if entry.kind == NodeKind::Directory || !node.children.is_empty() {
            node.kind = NodeKind::Directory;
        }
    }

    let forest = into_sorted_descriptors(top_level);
    log::debug!(
        "RepoTree: Built {} top-level node(s) from {} entries.",
        forest.len(),
        entries.len()
    );
    forest
}

// Wraps the forest in the single repository root node.
pub fn repository_root(label: &str, children: Vec<NodeDescriptor>) -> NodeDescriptor {
    NodeDescriptor::directory(ROOT_NODE_ID, label, children)
}
