/*
 * The hierarchical tri-state selection tree. It owns a forest of nodes parsed
 * from caller-supplied descriptors, renders it once into a `TreeSurface`, and
 * keeps parent/child checkbox state consistent under clicks and bulk updates.
 *
 * Nodes live in a flat arena in pre-order. Parents are indices, children are
 * ordered index lists, and `nodes_by_id` gives O(1) lookup by id. A status change
 * propagates upward (each ancestor re-aggregates from its non-disabled children,
 * stopping at the first ancestor that does not change) and downward (the value is
 * forced onto every non-disabled descendant). Every node touched is queued in
 * `pending_updates`; one flush per transaction patches the surface.
 */
use super::tree_node::{NodeDescriptor, NodeKind, NodeRecord, NodeStatus};
use super::tree_surface::{
    MountHost, NodeView, PatchFields, SWITCH_ANIMATION_DURATION, SurfaceError, SwitchStep,
    TreeSurface,
};
use glob::Pattern;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

pub type NodeId = String;

const SYNTHESIZED_ID_PREFIX: &str = "tree-node-";
const SYNTHESIZED_ID_LEN: usize = 9;

#[derive(Debug)]
pub enum ConfigurationError {
    MountPointNotFound(String),
    Render(SurfaceError),
    DuplicateNodeId(String),
}

impl From<SurfaceError> for ConfigurationError {
    fn from(err: SurfaceError) -> Self {
        ConfigurationError::Render(err)
    }
}

impl std::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::MountPointNotFound(selector) => {
                write!(f, "Tree mount point not found: {selector}")
            }
            ConfigurationError::Render(e) => write!(f, "Failed to render tree: {e}"),
            ConfigurationError::DuplicateNodeId(id) => {
                write!(f, "Duplicate node id in tree data: {id}")
            }
        }
    }
}

impl std::error::Error for ConfigurationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigurationError::Render(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigurationError>;

pub type ChangeCallback<S> = Box<dyn FnMut(&SelectionTree<S>)>;
pub type LoadedCallback<S> = Box<dyn FnOnce(&SelectionTree<S>)>;

/*
 * Construction options. `values` and `disables` override the `checked` and
 * `disabled` seeds found in `data` when they are non-empty. `close_depth`
 * renders every node at that depth or deeper collapsed (roots are depth 0).
 */
pub struct TreeOptions<S: TreeSurface> {
    data: Vec<NodeDescriptor>,
    close_depth: Option<usize>,
    values: Vec<NodeId>,
    disables: Vec<NodeId>,
    on_change: Option<ChangeCallback<S>>,
    loaded: Option<LoadedCallback<S>>,
    before_load: Option<Box<dyn FnOnce()>>,
}

impl<S: TreeSurface> TreeOptions<S> {
    pub fn new(data: Vec<NodeDescriptor>) -> Self {
        TreeOptions {
            data,
            close_depth: None,
            values: Vec::new(),
            disables: Vec::new(),
            on_change: None,
            loaded: None,
            before_load: None,
        }
    }

    pub fn close_depth(mut self, depth: usize) -> Self {
        self.close_depth = Some(depth);
        self
    }

    pub fn values(mut self, values: Vec<NodeId>) -> Self {
        self.values = values;
        self
    }

    pub fn disables(mut self, disables: Vec<NodeId>) -> Self {
        self.disables = disables;
        self
    }

    pub fn on_change(mut self, callback: impl FnMut(&SelectionTree<S>) + 'static) -> Self {
        self.on_change = Some(Box::new(callback));
        self
    }

    pub fn loaded(mut self, callback: impl FnOnce(&SelectionTree<S>) + 'static) -> Self {
        self.loaded = Some(Box::new(callback));
        self
    }

    pub fn before_load(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.before_load = Some(Box::new(callback));
        self
    }
}

#[derive(Debug, Clone)]
struct TreeNode {
    id: NodeId,
    text: String,
    kind: NodeKind,
    status: NodeStatus,
    disabled: bool,
    depth: usize,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl TreeNode {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn view(&self) -> NodeView<'_> {
        NodeView {
            id: &self.id,
            text: &self.text,
            kind: self.kind,
            status: self.status,
            disabled: self.disabled,
            has_children: !self.children.is_empty(),
        }
    }

    fn record(&self) -> NodeRecord {
        NodeRecord {
            id: self.id.clone(),
            text: self.text.clone(),
            kind: self.kind,
            status: self.status,
            disabled: self.disabled,
            depth: self.depth,
            is_leaf: self.is_leaf(),
        }
    }
}

// Result of parsing descriptors into the arena, before anything is rendered.
#[derive(Debug, Default)]
struct ParsedForest {
    nodes: Vec<TreeNode>,
    roots: Vec<usize>,
    nodes_by_id: HashMap<NodeId, usize>,
    leaf_nodes: Vec<usize>,
    default_values: Vec<NodeId>,
    default_disables: Vec<NodeId>,
}

impl ParsedForest {
    /*
     * Copies the descriptors into the arena field by field, so nothing the caller
     * holds is shared with the tree. Statuses all start unchecked; `checked` and
     * `disabled` seeds are only collected here.
     */
    fn parse(data: &[NodeDescriptor]) -> Result<Self> {
        let mut forest = ParsedForest::default();
        forest.roots = forest.walk(data, None, 0)?;
        forest.default_values = unique_ids(&forest.default_values);
        forest.default_disables = unique_ids(&forest.default_disables);
        Ok(forest)
    }

    fn walk(
        &mut self,
        descriptors: &[NodeDescriptor],
        parent: Option<usize>,
        depth: usize,
    ) -> Result<Vec<usize>> {
        let mut level = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let id = match descriptor.id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    let id = self.synthesize_id();
                    log::warn!(
                        "SelectionTree: Node '{}' has no id, using synthesized id '{id}'.",
                        descriptor.text
                    );
                    id
                }
            };
            if self.nodes_by_id.contains_key(&id) {
                log::error!("SelectionTree: Duplicate node id '{id}' in tree data.");
                return Err(ConfigurationError::DuplicateNodeId(id));
            }

            let index = self.nodes.len();
            self.nodes.push(TreeNode {
                id: id.clone(),
                text: descriptor.text.clone(),
                kind: descriptor.kind,
                status: NodeStatus::Unchecked,
                disabled: false,
                depth,
                parent,
                children: Vec::new(),
            });
            self.nodes_by_id.insert(id.clone(), index);
            if descriptor.checked {
                self.default_values.push(id.clone());
            }
            if descriptor.disabled {
                self.default_disables.push(id);
            }

            let children = self.walk(&descriptor.children, Some(index), depth + 1)?;
            if children.is_empty() {
                self.leaf_nodes.push(index);
            }
            self.nodes[index].children = children;
            level.push(index);
        }
        Ok(level)
    }

    fn synthesize_id(&self) -> NodeId {
        loop {
            let token: String = rand::rng()
                .sample_iter(&Alphanumeric)
                .take(SYNTHESIZED_ID_LEN)
                .map(char::from)
                .collect();
            let id = format!("{SYNTHESIZED_ID_PREFIX}{}", token.to_lowercase());
            if !self.nodes_by_id.contains_key(&id) {
                return id;
            }
        }
    }
}

fn unique_ids<T: AsRef<str>>(ids: &[T]) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.as_ref())
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

pub struct SelectionTree<S: TreeSurface> {
    surface: S,
    nodes: Vec<TreeNode>,
    roots: Vec<usize>,
    nodes_by_id: HashMap<NodeId, usize>,
    leaf_nodes: Vec<usize>,
    pending_updates: BTreeMap<usize, PatchFields>,
    close_depth: Option<usize>,
    on_change: Option<ChangeCallback<S>>,
}

impl<S: TreeSurface> SelectionTree<S> {
    /*
     * Resolves `selector` through the host and builds the tree into it.
     * Fails with `MountPointNotFound` if the host has no such mount point.
     */
    pub fn mount<H>(host: &mut H, selector: &str, options: TreeOptions<S>) -> Result<Self>
    where
        H: MountHost<Surface = S>,
    {
        let surface = host.take_mount_point(selector).ok_or_else(|| {
            log::error!("SelectionTree: Mount point '{selector}' not found.");
            ConfigurationError::MountPointNotFound(selector.to_string())
        })?;
        Self::with_surface(surface, options)
    }

    /*
     * Parses the data, renders every node, then applies the initial disables
     * followed by the initial values through the same bulk setters used at
     * runtime, so parent aggregates are computed rather than trusted.
     */
    pub fn with_surface(surface: S, options: TreeOptions<S>) -> Result<Self> {
        let started = Instant::now();
        let TreeOptions {
            data,
            close_depth,
            values,
            disables,
            on_change,
            loaded,
            before_load,
        } = options;

        if let Some(hook) = before_load {
            hook();
        }

        let ParsedForest {
            nodes,
            roots,
            nodes_by_id,
            leaf_nodes,
            default_values,
            default_disables,
        } = ParsedForest::parse(&data)?;

        let mut tree = SelectionTree {
            surface,
            nodes,
            roots,
            nodes_by_id,
            leaf_nodes,
            pending_updates: BTreeMap::new(),
            close_depth,
            on_change,
        };
        tree.render()?;

        let initial_disables = if disables.is_empty() {
            default_disables
        } else {
            disables
        };
        if !initial_disables.is_empty() {
            tree.set_disables(&initial_disables);
        }

        let initial_values = if values.is_empty() {
            default_values
        } else {
            values
        };
        if !initial_values.is_empty() {
            tree.set_values(&initial_values);
        }

        if let Some(hook) = loaded {
            hook(&tree);
        }
        log::debug!(
            "SelectionTree: Initialized {} nodes ({} leaves) in {:?}.",
            tree.nodes.len(),
            tree.leaf_nodes.len(),
            started.elapsed()
        );
        Ok(tree)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // --- Read access ---

    // Ids of leaves whose status is checked (or half, which a leaf never has), in tree order.
    pub fn values(&self) -> Vec<NodeId> {
        self.leaf_nodes
            .iter()
            .map(|&index| &self.nodes[index])
            .filter(|node| node.status.is_selected())
            .map(|node| node.id.clone())
            .collect()
    }

    pub fn disables(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.disabled)
            .map(|node| node.id.clone())
            .collect()
    }

    pub fn selected_nodes(&self) -> Vec<NodeRecord> {
        self.nodes
            .iter()
            .filter(|node| node.status.is_selected())
            .map(TreeNode::record)
            .collect()
    }

    pub fn disabled_nodes(&self) -> Vec<NodeRecord> {
        self.nodes
            .iter()
            .filter(|node| node.disabled)
            .map(TreeNode::record)
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<NodeRecord> {
        self.lookup(id).map(TreeNode::record)
    }

    pub fn status(&self, id: &str) -> Option<NodeStatus> {
        self.lookup(id).map(|node| node.status)
    }

    pub fn is_disabled(&self, id: &str) -> Option<bool> {
        self.lookup(id).map(|node| node.disabled)
    }

    pub fn parent_id(&self, id: &str) -> Option<&str> {
        self.lookup(id)
            .and_then(|node| node.parent)
            .map(|parent| self.nodes[parent].id.as_str())
    }

    pub fn children_ids(&self, id: &str) -> Vec<&str> {
        self.lookup(id)
            .map(|node| {
                node.children
                    .iter()
                    .map(|&child| self.nodes[child].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    // Every node id in pre-order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().map(|node| node.id.as_str())
    }

    pub fn root_ids(&self) -> Vec<&str> {
        self.roots
            .iter()
            .map(|&root| self.nodes[root].id.as_str())
            .collect()
    }

    pub fn leaf_ids(&self) -> Vec<&str> {
        self.leaf_nodes
            .iter()
            .map(|&index| self.nodes[index].id.as_str())
            .collect()
    }

    // Ids of every node whose id or label matches the pattern, in tree order.
    pub fn ids_matching(&self, pattern: &Pattern) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| pattern.matches(&node.id) || pattern.matches(&node.text))
            .map(|node| node.id.clone())
            .collect()
    }

    fn lookup(&self, id: &str) -> Option<&TreeNode> {
        self.nodes_by_id.get(id).map(|&index| &self.nodes[index])
    }

    // --- Bulk updates ---

    /*
     * Replaces the checked set. Clears every selected node first, then force-checks
     * each known, enabled target. Unknown and disabled ids are skipped. One patch
     * pass and one change notification cover the whole batch.
     */
    pub fn set_values<T: AsRef<str>>(&mut self, ids: &[T]) {
        let targets = unique_ids(ids);
        log::trace!("SelectionTree: Setting {} value(s).", targets.len());
        self.empty_nodes_check_status();
        for id in &targets {
            match self.nodes_by_id.get(id.as_str()) {
                Some(&index) => self.force_check(index),
                None => log::trace!("SelectionTree: Ignoring unknown value '{id}'."),
            }
        }
        self.update_surface();
        self.notify_change();
    }

    /*
     * Replaces the disabled set with the same batch pattern as `set_values`.
     * Disabling propagates down unconditionally and up only when every sibling is
     * disabled. Aggregates are recomputed afterwards since disabled children no
     * longer count towards their parent's status.
     */
    pub fn set_disables<T: AsRef<str>>(&mut self, ids: &[T]) {
        let targets = unique_ids(ids);
        log::trace!("SelectionTree: Setting {} disable(s).", targets.len());
        self.empty_nodes_disable();
        for id in &targets {
            match self.nodes_by_id.get(id.as_str()) {
                Some(&index) => self.set_disabled(index, true),
                None => log::trace!("SelectionTree: Ignoring unknown disable '{id}'."),
            }
        }
        self.refresh_aggregates();
        self.update_surface();
        self.notify_change();
    }

    // --- Single-node interaction ---

    /*
     * Toggles one node as a user click would: a checked or half-checked node
     * becomes unchecked, an unchecked node becomes checked. Unknown and disabled
     * ids are a no-op. Returns whether anything happened.
     */
    pub fn on_item_click(&mut self, id: &str) -> bool {
        let Some(&index) = self.nodes_by_id.get(id) else {
            log::trace!("SelectionTree: Click on unknown node '{id}' ignored.");
            return false;
        };
        if self.nodes[index].disabled {
            log::trace!("SelectionTree: Click on disabled node '{id}' ignored.");
            return false;
        }
        self.toggle_node(index);
        self.update_surface();
        self.notify_change();
        true
    }

    pub fn set_value(&mut self, id: &str) -> bool {
        self.on_item_click(id)
    }

    // --- Expand / collapse (presentation only) ---

    pub fn on_switcher_click(&mut self, id: &str) {
        let Some(&index) = self.nodes_by_id.get(id) else {
            return;
        };
        if self.nodes[index].is_leaf() {
            return;
        }
        let closing = !self.surface.is_collapsed(id);
        if !closing {
            self.surface.set_collapsed(id, false);
        }
        for step in [SwitchStep::Enter, SwitchStep::Active, SwitchStep::Leave] {
            self.surface
                .animate_switch(id, step, closing, SWITCH_ANIMATION_DURATION);
        }
        if closing {
            self.surface.set_collapsed(id, true);
        }
    }

    pub fn collapse_all(&mut self) {
        let leaves = self.leaf_nodes.clone();
        for leaf in leaves {
            let mut current = self.nodes[leaf].parent;
            while let Some(parent) = current {
                let parent_id = self.nodes[parent].id.clone();
                if !self.surface.is_collapsed(&parent_id) {
                    self.on_switcher_click(&parent_id);
                }
                current = self.nodes[parent].parent;
            }
        }
    }

    pub fn expand_all(&mut self) {
        let expandable: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|node| !node.is_leaf())
            .map(|node| node.id.clone())
            .collect();
        for id in expandable {
            if self.surface.is_collapsed(&id) {
                self.on_switcher_click(&id);
            }
        }
    }

    // --- Rendering ---

    fn render(&mut self) -> Result<()> {
        self.surface.clear();
        let roots = self.roots.clone();
        self.build_tree(None, &roots)
    }

    fn build_tree(&mut self, parent: Option<usize>, level: &[usize]) -> Result<()> {
        for &index in level {
            let collapsed = self
                .close_depth
                .is_some_and(|depth| self.nodes[index].depth >= depth);
            self.surface.create(&self.nodes[index].view(), collapsed)?;
            let children = self.nodes[index].children.clone();
            if !children.is_empty() {
                self.build_tree(Some(index), &children)?;
            }
        }
        let ids: Vec<&str> = level
            .iter()
            .map(|&index| self.nodes[index].id.as_str())
            .collect();
        let parent_id = parent.map(|index| self.nodes[index].id.as_str());
        self.surface.mount_children(parent_id, &ids)?;
        Ok(())
    }

    fn mark_for_update(&mut self, index: usize, changed: PatchFields) {
        let entry = self.pending_updates.entry(index).or_default();
        *entry = entry.merge(changed);
    }

    // Patches every queued node once and empties the queue.
    fn update_surface(&mut self) {
        let pending = std::mem::take(&mut self.pending_updates);
        log::trace!("SelectionTree: Patching {} node(s).", pending.len());
        for (index, changed) in pending {
            self.surface.patch(&self.nodes[index].view(), changed);
        }
    }

    fn notify_change(&mut self) {
        if let Some(mut callback) = self.on_change.take() {
            callback(&*self);
            self.on_change = Some(callback);
        }
    }

    // --- Status propagation ---

    fn set_status(&mut self, index: usize, status: NodeStatus) {
        self.nodes[index].status = status;
        self.mark_for_update(
            index,
            PatchFields {
                status: true,
                disabled: false,
            },
        );
    }

    fn toggle_node(&mut self, index: usize) {
        let new_status = if self.nodes[index].status.is_selected() {
            NodeStatus::Unchecked
        } else {
            NodeStatus::Checked
        };
        self.set_status(index, new_status);
        self.walk_up_status(index);
        self.walk_down_status(index);
    }

    fn force_check(&mut self, index: usize) {
        if self.nodes[index].disabled {
            log::trace!(
                "SelectionTree: Not checking disabled node '{}'.",
                self.nodes[index].id
            );
            return;
        }
        if self.nodes[index].status != NodeStatus::Checked {
            self.set_status(index, NodeStatus::Checked);
            self.walk_up_status(index);
            self.walk_down_status(index);
        }
    }

    fn empty_nodes_check_status(&mut self) {
        for index in 0..self.nodes.len() {
            let node = &self.nodes[index];
            if node.disabled || node.status == NodeStatus::Unchecked {
                continue;
            }
            self.set_status(index, NodeStatus::Unchecked);
            self.walk_up_status(index);
        }
    }

    // Aggregate over non-disabled children. No eligible children means unchecked.
    fn aggregate_status(&self, index: usize) -> NodeStatus {
        let mut eligible = 0;
        let mut checked = 0;
        let mut half_checked = 0;
        for &child in &self.nodes[index].children {
            let child = &self.nodes[child];
            if child.disabled {
                continue;
            }
            eligible += 1;
            match child.status {
                NodeStatus::Checked => checked += 1,
                NodeStatus::HalfChecked => half_checked += 1,
                NodeStatus::Unchecked => {}
            }
        }
        if eligible == 0 {
            NodeStatus::Unchecked
        } else if checked == eligible {
            NodeStatus::Checked
        } else if checked > 0 || half_checked > 0 {
            NodeStatus::HalfChecked
        } else {
            NodeStatus::Unchecked
        }
    }

    fn walk_up_status(&mut self, index: usize) {
        let mut current = index;
        while let Some(parent) = self.nodes[current].parent {
            let aggregate = self.aggregate_status(parent);
            if self.nodes[parent].status == aggregate {
                break;
            }
            self.set_status(parent, aggregate);
            current = parent;
        }
    }

    // Pushes the node's status onto enabled descendants. Disabled subtrees keep theirs.
    fn walk_down_status(&mut self, index: usize) {
        let value = self.nodes[index].status;
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            for position in 0..self.nodes[current].children.len() {
                let child = self.nodes[current].children[position];
                if self.nodes[child].disabled || self.nodes[child].status == value {
                    continue;
                }
                self.set_status(child, value);
                stack.push(child);
            }
        }
    }

    // Recomputes every non-leaf aggregate, children before parents.
    fn refresh_aggregates(&mut self) {
        for index in (0..self.nodes.len()).rev() {
            if self.nodes[index].is_leaf() {
                continue;
            }
            let aggregate = self.aggregate_status(index);
            if self.nodes[index].status != aggregate {
                self.set_status(index, aggregate);
            }
        }
    }

    // --- Disabled propagation ---

    fn set_disabled(&mut self, index: usize, disabled: bool) {
        if self.nodes[index].disabled == disabled {
            return;
        }
        self.apply_disabled(index, disabled);
        self.walk_up_disabled(index);
        self.walk_down_disabled(index);
    }

    fn apply_disabled(&mut self, index: usize, disabled: bool) {
        self.nodes[index].disabled = disabled;
        self.mark_for_update(
            index,
            PatchFields {
                status: false,
                disabled: true,
            },
        );
    }

    fn empty_nodes_disable(&mut self) {
        for index in 0..self.nodes.len() {
            if self.nodes[index].disabled {
                self.set_disabled(index, false);
            }
        }
    }

    // A parent is disabled exactly when all of its children are.
    fn walk_up_disabled(&mut self, index: usize) {
        let mut current = index;
        while let Some(parent) = self.nodes[current].parent {
            let all_disabled = self.nodes[parent]
                .children
                .iter()
                .all(|&child| self.nodes[child].disabled);
            if self.nodes[parent].disabled == all_disabled {
                break;
            }
            self.apply_disabled(parent, all_disabled);
            current = parent;
        }
    }

    fn walk_down_disabled(&mut self, index: usize) {
        let value = self.nodes[index].disabled;
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            for position in 0..self.nodes[current].children.len() {
                let child = self.nodes[current].children[position];
                if self.nodes[child].disabled == value {
                    continue;
                }
                self.apply_disabled(child, value);
                stack.push(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree_surface::{TextMountHost, TextTreeSurface};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type TextTree = SelectionTree<TextTreeSurface>;

    const MOUNT: &str = "#repo-tree";

    // root{A{a1,a2}, B{b1}}
    fn scenario_data() -> Vec<NodeDescriptor> {
        vec![NodeDescriptor::directory(
            "root",
            "root",
            vec![
                NodeDescriptor::directory(
                    "A",
                    "A",
                    vec![
                        NodeDescriptor::file("a1", "a1"),
                        NodeDescriptor::file("a2", "a2"),
                    ],
                ),
                NodeDescriptor::directory("B", "B", vec![NodeDescriptor::file("b1", "b1")]),
            ],
        )]
    }

    fn mount(options: TreeOptions<TextTreeSurface>) -> TextTree {
        let mut host = TextMountHost::new().with_mount_point(MOUNT);
        SelectionTree::mount(&mut host, MOUNT, options).expect("tree should mount")
    }

    fn scenario_tree() -> TextTree {
        mount(TreeOptions::new(scenario_data()))
    }

    fn status_of(tree: &TextTree, id: &str) -> NodeStatus {
        tree.status(id).expect("node should exist")
    }

    fn all_statuses(tree: &TextTree) -> Vec<(String, NodeStatus, bool)> {
        let mut ids: Vec<&str> = Vec::new();
        let mut stack: Vec<&str> = tree.root_ids();
        while let Some(id) = stack.pop() {
            ids.push(id);
            stack.extend(tree.children_ids(id));
        }
        ids.into_iter()
            .map(|id| {
                (
                    id.to_string(),
                    status_of(tree, id),
                    tree.is_disabled(id).unwrap(),
                )
            })
            .collect()
    }

    // Checks leaf tri-state, aggregate correctness and the all-disabled policy.
    fn assert_invariants(tree: &TextTree) {
        for (id, status, _) in all_statuses(tree) {
            let children = tree.children_ids(&id);
            if children.is_empty() {
                assert_ne!(status, NodeStatus::HalfChecked, "leaf {id} is half-checked");
                continue;
            }
            let eligible: Vec<NodeStatus> = children
                .iter()
                .filter(|child| !tree.is_disabled(child).unwrap())
                .map(|child| status_of(tree, child))
                .collect();
            let expected = if eligible.is_empty() {
                NodeStatus::Unchecked
            } else if eligible.iter().all(|s| *s == NodeStatus::Checked) {
                NodeStatus::Checked
            } else if eligible.iter().all(|s| *s == NodeStatus::Unchecked) {
                NodeStatus::Unchecked
            } else {
                NodeStatus::HalfChecked
            };
            assert_eq!(status, expected, "aggregate mismatch at {id}");
        }
    }

    #[test]
    fn test_mount_fails_without_mount_point() {
        let mut host = TextMountHost::new();
        let result = SelectionTree::mount(&mut host, "#nowhere", TreeOptions::new(scenario_data()));
        assert!(matches!(
            result,
            Err(ConfigurationError::MountPointNotFound(ref s)) if s == "#nowhere"
        ));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let data = vec![
            NodeDescriptor::file("same", "one"),
            NodeDescriptor::directory("dir", "dir", vec![NodeDescriptor::file("same", "two")]),
        ];
        let mut host = TextMountHost::new().with_mount_point(MOUNT);
        let result = SelectionTree::mount(&mut host, MOUNT, TreeOptions::new(data));
        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateNodeId(ref id)) if id == "same"
        ));
    }

    #[test]
    fn test_missing_ids_are_synthesized() {
        let data = vec![NodeDescriptor {
            text: "anonymous".to_string(),
            ..Default::default()
        }];
        let tree = mount(TreeOptions::new(data));

        let leaves = tree.leaf_ids();
        assert_eq!(leaves.len(), 1);
        assert!(leaves[0].starts_with(SYNTHESIZED_ID_PREFIX));
        assert_eq!(leaves[0].len(), SYNTHESIZED_ID_PREFIX.len() + SYNTHESIZED_ID_LEN);
        assert_eq!(tree.node(leaves[0]).unwrap().text, "anonymous");
    }

    #[test]
    fn test_parse_links_parents_and_indexes_leaves() {
        let tree = scenario_tree();

        assert_eq!(tree.len(), 6);
        assert_eq!(tree.root_ids(), vec!["root"]);
        assert_eq!(tree.parent_id("a1"), Some("A"));
        assert_eq!(tree.parent_id("root"), None);
        assert_eq!(tree.children_ids("root"), vec!["A", "B"]);
        assert_eq!(tree.leaf_ids(), vec!["a1", "a2", "b1"]);
        assert_eq!(tree.node("a2").unwrap().depth, 2);
        assert!(tree.node("B").map(|n| !n.is_leaf).unwrap());
    }

    #[test]
    fn test_scenario_set_then_clicks() {
        let mut tree = scenario_tree();

        // Set values = [a1]
        tree.set_values(&["a1"]);
        assert_eq!(status_of(&tree, "a1"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "a2"), NodeStatus::Unchecked);
        assert_eq!(status_of(&tree, "A"), NodeStatus::HalfChecked);
        assert_eq!(status_of(&tree, "b1"), NodeStatus::Unchecked);
        assert_eq!(status_of(&tree, "B"), NodeStatus::Unchecked);
        assert_eq!(status_of(&tree, "root"), NodeStatus::HalfChecked);

        // Click a2
        assert!(tree.on_item_click("a2"));
        assert_eq!(status_of(&tree, "a1"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "a2"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "A"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "root"), NodeStatus::HalfChecked);

        // Click b1
        assert!(tree.on_item_click("b1"));
        assert_eq!(status_of(&tree, "A"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "B"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "root"), NodeStatus::Checked);
        assert_eq!(tree.values(), vec!["a1", "a2", "b1"]);
        assert_invariants(&tree);
    }

    #[test]
    fn test_disabled_node_is_not_force_checked() {
        let mut tree = scenario_tree();
        tree.set_disables(&["a1"]);
        tree.set_values(&["a1", "a2"]);

        assert_eq!(status_of(&tree, "a1"), NodeStatus::Unchecked);
        assert_eq!(status_of(&tree, "a2"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "A"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "root"), NodeStatus::HalfChecked);
        assert_invariants(&tree);
    }

    #[test]
    fn test_clicking_half_checked_node_clears_it() {
        let mut tree = scenario_tree();
        tree.set_values(&["a1"]);

        assert!(tree.on_item_click("root"));

        assert!(tree.values().is_empty());
        for (id, status, _) in all_statuses(&tree) {
            assert_eq!(status, NodeStatus::Unchecked, "{id} should be cleared");
        }
    }

    #[test]
    fn test_set_value_toggles_like_a_click() {
        let mut tree = scenario_tree();

        assert!(tree.set_value("A"));
        assert_eq!(tree.values(), vec!["a1", "a2"]);
        assert_eq!(status_of(&tree, "root"), NodeStatus::HalfChecked);

        assert!(tree.set_value("A"));
        assert!(tree.values().is_empty());
        assert!(!tree.set_value("missing"));
        assert_invariants(&tree);
    }

    #[test]
    fn test_clicking_parent_checks_enabled_descendants_only() {
        let mut tree = scenario_tree();
        tree.set_disables(&["a2"]);

        assert!(tree.on_item_click("root"));

        assert_eq!(tree.values(), vec!["a1", "b1"]);
        assert_eq!(status_of(&tree, "a2"), NodeStatus::Unchecked);
        assert_eq!(status_of(&tree, "A"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "root"), NodeStatus::Checked);
        assert_invariants(&tree);
    }

    #[test]
    fn test_toggle_symmetry_restores_previous_state() {
        let mut tree = scenario_tree();
        tree.set_values(&["a1"]);
        let before = all_statuses(&tree);

        tree.on_item_click("b1");
        assert_ne!(all_statuses(&tree), before);
        tree.on_item_click("b1");

        assert_eq!(all_statuses(&tree), before);
    }

    #[test]
    fn test_click_on_disabled_or_unknown_node_is_noop() {
        // Arrange
        let changes = Rc::new(Cell::new(0));
        let counter = changes.clone();
        let mut tree = mount(
            TreeOptions::new(scenario_data())
                .disables(vec!["b1".to_string()])
                .on_change(move |_| counter.set(counter.get() + 1)),
        );
        let changes_after_init = changes.get();
        let statuses_before = all_statuses(&tree);
        let patches_before = tree.surface().patch_count();
        let render_before = tree.surface().render();

        // Act
        let clicked_disabled = tree.on_item_click("b1");
        let clicked_unknown = tree.on_item_click("does/not/exist");

        // Assert
        assert!(!clicked_disabled);
        assert!(!clicked_unknown);
        assert_eq!(changes.get(), changes_after_init);
        assert_eq!(all_statuses(&tree), statuses_before);
        assert_eq!(tree.surface().patch_count(), patches_before);
        assert_eq!(tree.surface().render(), render_before);
        assert_eq!(tree.disables(), vec!["B", "b1"]);
    }

    #[test]
    fn test_set_values_is_idempotent() {
        let mut tree = scenario_tree();
        tree.set_disables(&["b1"]);

        tree.set_values(&["A", "b1"]);
        let once = all_statuses(&tree);
        tree.set_values(&["A", "b1"]);

        assert_eq!(all_statuses(&tree), once);
        assert_invariants(&tree);
    }

    #[test]
    fn test_set_values_force_checks_instead_of_toggling() {
        let mut tree = scenario_tree();

        // a1 is already checked by the time it is processed.
        tree.set_values(&["A", "a1", "a1"]);

        assert_eq!(tree.values(), vec!["a1", "a2"]);
        assert_eq!(status_of(&tree, "A"), NodeStatus::Checked);
    }

    #[test]
    fn test_set_values_replaces_previous_selection() {
        let mut tree = scenario_tree();
        tree.set_values(&["A"]);
        tree.set_values(&["b1", "unknown"]);

        assert_eq!(tree.values(), vec!["b1"]);
        assert_eq!(status_of(&tree, "A"), NodeStatus::Unchecked);
        assert_eq!(status_of(&tree, "root"), NodeStatus::HalfChecked);
        assert_invariants(&tree);
    }

    #[test]
    fn test_set_values_notifies_once_and_patches_in_one_pass() {
        // Arrange
        let changes = Rc::new(Cell::new(0));
        let counter = changes.clone();
        let mut tree = mount(
            TreeOptions::new(scenario_data()).on_change(move |_| counter.set(counter.get() + 1)),
        );
        let patches_before = tree.surface().patch_count();

        // Act
        tree.set_values(&["a1", "b1"]);

        // Assert: a1, A, root, b1, B each patched exactly once.
        assert_eq!(changes.get(), 1);
        assert_eq!(tree.surface().patch_count() - patches_before, 5);
        assert_eq!(tree.surface().status_marker("root"), Some("[-]"));
        assert_eq!(tree.surface().status_marker("B"), Some("[x]"));
        assert_eq!(tree.surface().status_marker("a2"), Some("[ ]"));
    }

    #[test]
    fn test_on_change_sees_updated_tree() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut tree = mount(
            TreeOptions::new(scenario_data())
                .on_change(move |tree: &TextTree| sink.borrow_mut().push(tree.values())),
        );

        tree.on_item_click("a2");
        tree.on_item_click("B");

        assert_eq!(
            *seen.borrow(),
            vec![vec!["a2".to_string()], vec!["a2".to_string(), "b1".to_string()]]
        );
    }

    #[test]
    fn test_disabling_all_children_disables_parent_and_unchecks_it() {
        let mut tree = scenario_tree();
        tree.set_values(&["A"]);

        tree.set_disables(&["a1", "a2"]);

        assert_eq!(tree.is_disabled("A"), Some(true));
        assert_eq!(status_of(&tree, "A"), NodeStatus::Unchecked);
        // Disabled leaves keep their underlying status.
        assert_eq!(status_of(&tree, "a1"), NodeStatus::Checked);
        assert_eq!(tree.is_disabled("root"), Some(false));
        assert_eq!(status_of(&tree, "root"), NodeStatus::Unchecked);
        assert_invariants(&tree);
    }

    #[test]
    fn test_disabling_parent_disables_descendants_and_clearing_restores() {
        let mut tree = scenario_tree();
        tree.set_values(&["a1"]);

        tree.set_disables(&["A"]);
        assert_eq!(tree.disables(), vec!["A", "a1", "a2"]);
        assert_eq!(status_of(&tree, "root"), NodeStatus::Unchecked);
        assert_eq!(tree.surface().is_marked_disabled("a2"), Some(true));

        tree.set_disables::<&str>(&[]);
        assert!(tree.disables().is_empty());
        assert_eq!(status_of(&tree, "A"), NodeStatus::HalfChecked);
        assert_eq!(status_of(&tree, "root"), NodeStatus::HalfChecked);
        assert_eq!(tree.surface().is_marked_disabled("a2"), Some(false));
        assert_invariants(&tree);
    }

    #[test]
    fn test_seeds_from_data_are_applied_through_bulk_setters() {
        let data = vec![NodeDescriptor::directory(
            "docs",
            "docs",
            vec![
                NodeDescriptor::file("docs/a.md", "a.md").with_checked(true),
                NodeDescriptor::file("docs/b.md", "b.md").with_disabled(true),
                NodeDescriptor::file("docs/c.md", "c.md"),
            ],
        )];
        let tree = mount(TreeOptions::new(data));

        assert_eq!(tree.values(), vec!["docs/a.md"]);
        assert_eq!(tree.disables(), vec!["docs/b.md"]);
        assert_eq!(status_of(&tree, "docs"), NodeStatus::HalfChecked);
        assert_invariants(&tree);
    }

    #[test]
    fn test_option_values_override_data_seeds() {
        let data = vec![
            NodeDescriptor::file("x", "x").with_checked(true),
            NodeDescriptor::file("y", "y"),
        ];
        let tree = mount(TreeOptions::new(data).values(vec!["y".to_string()]));
        assert_eq!(tree.values(), vec!["y"]);
    }

    #[test]
    fn test_seeded_checked_and_disabled_node_stays_unchecked() {
        let data = vec![NodeDescriptor::directory(
            "d",
            "d",
            vec![
                NodeDescriptor::file("d/1", "1")
                    .with_checked(true)
                    .with_disabled(true),
                NodeDescriptor::file("d/2", "2"),
            ],
        )];
        let tree = mount(TreeOptions::new(data));

        assert!(tree.values().is_empty());
        assert_eq!(status_of(&tree, "d"), NodeStatus::Unchecked);
    }

    #[test]
    fn test_empty_directory_behaves_as_leaf() {
        let data = vec![NodeDescriptor::directory(
            "repo",
            "repo",
            vec![
                NodeDescriptor::directory("repo/empty", "empty", vec![]),
                NodeDescriptor::file("repo/file", "file"),
            ],
        )];
        let mut tree = mount(TreeOptions::new(data));

        assert_eq!(tree.leaf_ids(), vec!["repo/empty", "repo/file"]);
        tree.on_item_click("repo/empty");
        assert_eq!(status_of(&tree, "repo/empty"), NodeStatus::Checked);
        assert_eq!(status_of(&tree, "repo"), NodeStatus::HalfChecked);
    }

    #[test]
    fn test_selected_and_disabled_node_snapshots() {
        let mut tree = scenario_tree();
        tree.set_disables(&["b1"]);
        tree.set_values(&["a1"]);

        let selected: Vec<String> = tree.selected_nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(selected, vec!["root", "A", "a1"]);

        let disabled = tree.disabled_nodes();
        assert_eq!(disabled.len(), 2);
        assert_eq!(disabled[0].id, "B");
        assert_eq!(disabled[0].kind, NodeKind::Directory);
        assert!(!disabled[0].is_leaf);
        assert_eq!(disabled[1].status, NodeStatus::Unchecked);
    }

    #[test]
    fn test_ids_matching_glob() {
        let tree = scenario_tree();
        let pattern = Pattern::new("a?").unwrap();
        assert_eq!(tree.ids_matching(&pattern), vec!["a1", "a2"]);
    }

    #[test]
    fn test_close_depth_and_switcher_animation() {
        let mut tree = mount(TreeOptions::new(scenario_data()).close_depth(1));
        assert!(!tree.surface().is_collapsed("root"));
        assert!(tree.surface().is_collapsed("A"));
        assert_eq!(tree.surface().render(), "v [ ] root/\n  > [ ] A/\n  > [ ] B/\n");

        tree.on_switcher_click("A");
        assert!(!tree.surface().is_collapsed("A"));
        assert_eq!(tree.surface().last_switch_step("A"), Some(SwitchStep::Leave));

        tree.on_switcher_click("A");
        assert!(tree.surface().is_collapsed("A"));

        // Leaves have no switcher.
        tree.on_switcher_click("a1");
        assert_eq!(tree.surface().last_switch_step("a1"), None);
    }

    #[test]
    fn test_collapse_and_expand_all_leave_status_untouched() {
        let mut tree = scenario_tree();
        tree.set_values(&["a1"]);
        let before = all_statuses(&tree);

        tree.collapse_all();
        for id in ["root", "A", "B"] {
            assert!(tree.surface().is_collapsed(id), "{id} should be collapsed");
        }
        assert_eq!(tree.surface().render(), "> [-] root/\n");

        tree.expand_all();
        for id in ["root", "A", "B"] {
            assert!(!tree.surface().is_collapsed(id), "{id} should be expanded");
        }
        assert_eq!(all_statuses(&tree), before);
    }

    #[test]
    fn test_lifecycle_hooks_run_in_order() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let before = events.clone();
        let loaded = events.clone();
        let _tree = mount(
            TreeOptions::new(scenario_data())
                .values(vec!["a1".to_string()])
                .before_load(move || before.borrow_mut().push("before_load".to_string()))
                .loaded(move |tree: &TextTree| {
                    loaded
                        .borrow_mut()
                        .push(format!("loaded:{}", tree.values().join(",")))
                }),
        );

        assert_eq!(*events.borrow(), vec!["before_load", "loaded:a1"]);
    }

    fn random_forest(rng: &mut StdRng, prefix: &str, depth: usize) -> Vec<NodeDescriptor> {
        let count = rng.random_range(1..4);
        (0..count)
            .map(|i| {
                let id = format!("{prefix}/{i}");
                if depth < 3 && rng.random_bool(0.5) {
                    let children = random_forest(rng, &id, depth + 1);
                    NodeDescriptor::directory(&id, &id, children)
                } else {
                    NodeDescriptor::file(&id, &id)
                }
            })
            .collect()
    }

    #[test]
    fn test_invariants_hold_under_random_operations() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..20 {
            let data = random_forest(&mut rng, "r", 0);
            let mut tree = mount(TreeOptions::new(data));
            let ids: Vec<String> = all_statuses(&tree).into_iter().map(|(id, _, _)| id).collect();

            for _ in 0..40 {
                let pick = |rng: &mut StdRng| ids[rng.random_range(0..ids.len())].clone();
                match rng.random_range(0..3) {
                    0 => {
                        let id = pick(&mut rng);
                        tree.on_item_click(&id);
                    }
                    1 => {
                        let values = vec![pick(&mut rng), pick(&mut rng)];
                        tree.set_values(&values);
                    }
                    _ => {
                        let disables = if rng.random_bool(0.3) {
                            Vec::new()
                        } else {
                            vec![pick(&mut rng)]
                        };
                        tree.set_disables(&disables);
                    }
                }
                assert_invariants(&tree);
            }
        }
    }
}
