use glob::Pattern;
use serde::{Deserialize, Serialize};

/*
 * The tri-state selection status of a node in the selection tree.
 * `HalfChecked` is only meaningful for nodes with children and means that some,
 * but not all, eligible descendants are checked. The numeric values match the
 * classic checkbox-tree convention (0 = unchecked, 1 = half, 2 = checked).
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeStatus {
    #[default]
    Unchecked = 0,
    HalfChecked = 1,
    Checked = 2,
}

impl NodeStatus {
    pub fn is_selected(self) -> bool {
        matches!(self, NodeStatus::HalfChecked | NodeStatus::Checked)
    }
}

/*
 * Whether a node stands for a directory or a file in the repository listing.
 * The selection engine itself does not care; the copy action only picks files.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    #[default]
    File,
}

/*
 * Caller-supplied description of one node and its subtree.
 * `checked` and `disabled` are only seeds: the tree collects them into its
 * initial value/disable lists and applies them through the bulk setters, so
 * parent aggregates never come from the caller directly. A missing `id` is
 * tolerated and replaced by a synthesized one during parsing.
 */
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub children: Vec<NodeDescriptor>,
}

impl NodeDescriptor {
    pub fn file(id: &str, text: &str) -> Self {
        NodeDescriptor {
            id: Some(id.to_string()),
            text: text.to_string(),
            kind: NodeKind::File,
            ..Default::default()
        }
    }

    pub fn directory(id: &str, text: &str, children: Vec<NodeDescriptor>) -> Self {
        NodeDescriptor {
            id: Some(id.to_string()),
            text: text.to_string(),
            kind: NodeKind::Directory,
            children,
            ..Default::default()
        }
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /*
     * Keeps the descriptors whose label or id matches `pattern`, together with
     * every ancestor needed to reach them, so the result still forms a valid
     * forest. A matching directory is kept whole.
     */
    pub fn filter_by_glob(nodes: &[NodeDescriptor], pattern: &Pattern) -> Vec<NodeDescriptor> {
        let mut kept = Vec::new();
        for node in nodes {
            let id_matches = node.id.as_deref().is_some_and(|id| pattern.matches(id));
            if id_matches || pattern.matches(&node.text) {
                kept.push(node.clone());
                continue;
            }
            let children = Self::filter_by_glob(&node.children, pattern);
            if !children.is_empty() {
                kept.push(NodeDescriptor {
                    children,
                    ..node.clone()
                });
            }
        }
        kept
    }
}

/*
 * A plain snapshot of one node, detached from the tree's internal links.
 * Returned by `selected_nodes`, `disabled_nodes` and `node` so callers never hold
 * references into the arena.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    pub id: String,
    pub text: String,
    pub kind: NodeKind,
    pub status: NodeStatus,
    pub disabled: bool,
    pub depth: usize,
    pub is_leaf: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_forest() -> Vec<NodeDescriptor> {
        vec![
            NodeDescriptor::directory(
                "src",
                "src",
                vec![
                    NodeDescriptor::file("src/main.rs", "main.rs"),
                    NodeDescriptor::directory(
                        "src/core",
                        "core",
                        vec![NodeDescriptor::file("src/core/tree.rs", "tree.rs")],
                    ),
                ],
            ),
            NodeDescriptor::file("README.md", "README.md"),
        ]
    }

    #[test]
    fn test_status_is_selected() {
        assert!(!NodeStatus::Unchecked.is_selected());
        assert!(NodeStatus::HalfChecked.is_selected());
        assert!(NodeStatus::Checked.is_selected());
        assert_eq!(NodeStatus::default(), NodeStatus::Unchecked);
        assert_eq!(NodeStatus::HalfChecked as u8, 1);
    }

    #[test]
    fn test_descriptor_deserializes_with_defaults() {
        let json = r#"[{"id":"docs","text":"docs","kind":"directory","children":[{"text":"a.md","checked":true}]}]"#;
        let nodes: Vec<NodeDescriptor> = serde_json::from_str(json).unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].kind, NodeKind::Directory);
        assert!(!nodes[0].disabled);
        let child = &nodes[0].children[0];
        assert_eq!(child.id, None);
        assert!(child.checked);
        assert_eq!(child.kind, NodeKind::File);
    }

    #[test]
    fn test_filter_by_glob_keeps_ancestors_of_matches() {
        let pattern = Pattern::new("*.rs").unwrap();
        let filtered = NodeDescriptor::filter_by_glob(&sample_forest(), &pattern);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].text, "src");
        assert_eq!(filtered[0].children.len(), 2);
        assert_eq!(filtered[0].children[1].children[0].text, "tree.rs");
    }

    #[test]
    fn test_filter_by_glob_matches_full_ids() {
        let pattern = Pattern::new("src/core").unwrap();
        let filtered = NodeDescriptor::filter_by_glob(&sample_forest(), &pattern);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].children.len(), 1);
        assert_eq!(filtered[0].children[0].id.as_deref(), Some("src/core"));
        // A matching directory keeps its whole subtree.
        assert_eq!(filtered[0].children[0].children.len(), 1);
    }

    #[test]
    fn test_filter_by_glob_without_matches_is_empty() {
        let pattern = Pattern::new("*.py").unwrap();
        assert!(NodeDescriptor::filter_by_glob(&sample_forest(), &pattern).is_empty());
    }
}
