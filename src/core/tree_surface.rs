/*
 * This module defines the visual side of the selection tree. The `TreeSurface`
 * trait is the only thing the selection engine knows about presentation: it
 * creates one visual handle per node, mounts handles under their parent, and
 * patches handles whose status or disabled flag changed. Expand/collapse lives
 * here too, since it is purely presentational.
 *
 * `TextTreeSurface` is the concrete implementation used by the terminal picker.
 * It keeps an in-memory nested list and renders it to a string with checkbox
 * markers. `MountHost` resolves a named mount point to a fresh surface.
 */
use super::tree_node::{NodeKind, NodeStatus};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::time::Duration;

pub const SWITCH_ANIMATION_DURATION: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    DuplicateHandle(String),
    UnknownHandle(String),
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::DuplicateHandle(id) => {
                write!(f, "Visual handle already exists for node '{id}'")
            }
            SurfaceError::UnknownHandle(id) => write!(f, "No visual handle for node '{id}'"),
        }
    }
}

impl std::error::Error for SurfaceError {}

pub type Result<T> = std::result::Result<T, SurfaceError>;

// What a surface needs to know to draw a node. Borrowed from the tree's arena.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub kind: NodeKind,
    pub status: NodeStatus,
    pub disabled: bool,
    pub has_children: bool,
}

// Which fields of a node changed since its handle was last patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatchFields {
    pub status: bool,
    pub disabled: bool,
}

impl PatchFields {
    pub fn merge(self, other: PatchFields) -> PatchFields {
        PatchFields {
            status: self.status || other.status,
            disabled: self.disabled || other.disabled,
        }
    }
}

/*
 * One step of the expand/collapse transition. A switch runs Enter, Active and
 * Leave in that order; `closing` tells the surface which direction it is going.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchStep {
    Enter,
    Active,
    Leave,
}

pub trait TreeSurface {
    // Drops every handle so a new forest can be rendered.
    fn clear(&mut self);

    fn create(&mut self, node: &NodeView<'_>, collapsed: bool) -> Result<()>;

    // `parent == None` mounts at the surface root.
    fn mount_children(&mut self, parent: Option<&str>, children: &[&str]) -> Result<()>;

    fn patch(&mut self, node: &NodeView<'_>, changed: PatchFields);

    fn is_collapsed(&self, id: &str) -> bool;

    fn set_collapsed(&mut self, id: &str, collapsed: bool);

    fn animate_switch(&mut self, id: &str, step: SwitchStep, closing: bool, duration: Duration);
}

/*
 * Resolves a selector (the name of a place in the UI) to a surface the tree can
 * render into. Returning `None` means the mount point does not exist.
 */
pub trait MountHost {
    type Surface: TreeSurface;

    fn take_mount_point(&mut self, selector: &str) -> Option<Self::Surface>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TextItem {
    text: String,
    kind: NodeKind,
    status: NodeStatus,
    disabled: bool,
    ignored: bool,
    has_children: bool,
    collapsed: bool,
    last_switch_step: Option<SwitchStep>,
    children: Vec<String>,
}

/*
 * A nested-list text rendering of the tree. Each line shows the switcher
 * (`v` open, `>` closed, blank for leaves), the checkbox marker and the label,
 * followed by annotations for disabled or ignored nodes.
 */
#[derive(Debug, Default)]
pub struct TextTreeSurface {
    name: String,
    items: HashMap<String, TextItem>,
    roots: Vec<String>,
    patch_count: usize,
}

impl TextTreeSurface {
    pub fn new(name: &str) -> Self {
        TextTreeSurface {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // Number of handle patches applied since creation. Used to observe batching.
    pub fn patch_count(&self) -> usize {
        self.patch_count
    }

    pub fn status_marker(&self, id: &str) -> Option<&'static str> {
        self.items.get(id).map(|item| Self::marker_for(item.status))
    }

    pub fn is_marked_disabled(&self, id: &str) -> Option<bool> {
        self.items.get(id).map(|item| item.disabled)
    }

    pub fn last_switch_step(&self, id: &str) -> Option<SwitchStep> {
        self.items.get(id).and_then(|item| item.last_switch_step)
    }

    /*
     * Flags a node as ignored by the ignore rules. This is a presentation concern
     * only; it never touches the node's status or disabled flag.
     */
    pub fn set_ignored(&mut self, id: &str, ignored: bool) {
        if let Some(item) = self.items.get_mut(id) {
            item.ignored = ignored;
        }
    }

    pub fn is_marked_ignored(&self, id: &str) -> Option<bool> {
        self.items.get(id).map(|item| item.ignored)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            self.render_item(root, 0, &mut out);
        }
        out
    }

    fn marker_for(status: NodeStatus) -> &'static str {
        match status {
            NodeStatus::Unchecked => "[ ]",
            NodeStatus::HalfChecked => "[-]",
            NodeStatus::Checked => "[x]",
        }
    }

    fn render_item(&self, id: &str, depth: usize, out: &mut String) {
        let Some(item) = self.items.get(id) else {
            return;
        };
        let switcher = match (item.has_children, item.collapsed) {
            (false, _) => ' ',
            (true, true) => '>',
            (true, false) => 'v',
        };
        let suffix = if item.kind == NodeKind::Directory { "/" } else { "" };
        let _ = write!(
            out,
            "{}{} {} {}{}",
            "  ".repeat(depth),
            switcher,
            Self::marker_for(item.status),
            item.text,
            suffix
        );
        if item.disabled {
            out.push_str(" (disabled)");
        }
        if item.ignored {
            out.push_str(" (ignored)");
        }
        out.push('\n');

        if !item.collapsed {
            for child in &item.children {
                self.render_item(child, depth + 1, out);
            }
        }
    }
}

impl TreeSurface for TextTreeSurface {
    fn clear(&mut self) {
        self.items.clear();
        self.roots.clear();
    }

    fn create(&mut self, node: &NodeView<'_>, collapsed: bool) -> Result<()> {
        if self.items.contains_key(node.id) {
            return Err(SurfaceError::DuplicateHandle(node.id.to_string()));
        }
        self.items.insert(
            node.id.to_string(),
            TextItem {
                text: node.text.to_string(),
                kind: node.kind,
                status: node.status,
                disabled: node.disabled,
                ignored: false,
                has_children: node.has_children,
                collapsed: collapsed && node.has_children,
                last_switch_step: None,
                children: Vec::new(),
            },
        );
        Ok(())
    }

    fn mount_children(&mut self, parent: Option<&str>, children: &[&str]) -> Result<()> {
        if let Some(missing) = children.iter().find(|id| !self.items.contains_key(**id)) {
            return Err(SurfaceError::UnknownHandle(missing.to_string()));
        }
        let ids = children.iter().map(|id| id.to_string());
        match parent {
            None => self.roots.extend(ids),
            Some(parent_id) => self
                .items
                .get_mut(parent_id)
                .ok_or_else(|| SurfaceError::UnknownHandle(parent_id.to_string()))?
                .children
                .extend(ids),
        }
        Ok(())
    }

    fn patch(&mut self, node: &NodeView<'_>, changed: PatchFields) {
        let Some(item) = self.items.get_mut(node.id) else {
            log::warn!(
                "TextTreeSurface: Patch requested for unknown handle '{}'.",
                node.id
            );
            return;
        };
        if changed.status {
            item.status = node.status;
        }
        if changed.disabled {
            item.disabled = node.disabled;
        }
        self.patch_count += 1;
    }

    fn is_collapsed(&self, id: &str) -> bool {
        self.items.get(id).is_some_and(|item| item.collapsed)
    }

    fn set_collapsed(&mut self, id: &str, collapsed: bool) {
        if let Some(item) = self.items.get_mut(id) {
            item.collapsed = collapsed && item.has_children;
        }
    }

    fn animate_switch(&mut self, id: &str, step: SwitchStep, closing: bool, duration: Duration) {
        log::trace!(
            "TextTreeSurface: Switch step {step:?} for '{id}' (closing: {closing}, {duration:?})."
        );
        if let Some(item) = self.items.get_mut(id) {
            item.last_switch_step = Some(step);
        }
    }
}

/*
 * Registry of the mount points available to text surfaces. A selector must be
 * registered before a tree can be mounted into it.
 */
#[derive(Debug, Default)]
pub struct TextMountHost {
    mount_points: HashSet<String>,
}

impl TextMountHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mount_point(mut self, selector: &str) -> Self {
        self.register(selector);
        self
    }

    pub fn register(&mut self, selector: &str) {
        self.mount_points.insert(selector.to_string());
    }
}

impl MountHost for TextMountHost {
    type Surface = TextTreeSurface;

    fn take_mount_point(&mut self, selector: &str) -> Option<TextTreeSurface> {
        self.mount_points
            .contains(selector)
            .then(|| TextTreeSurface::new(selector))
    }
}
