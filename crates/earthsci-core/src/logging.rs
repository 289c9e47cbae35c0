//! Logging and debugging facilities.
//!
//! This module provides:
//! - Target names for filtering the `tracing` output of each subsystem
//! - Debug visualization for layer trees
//! - Performance spans for profiling sync operations
//!
//! # Tracing Integration
//!
//! The crates use `tracing` for instrumentation. Install a subscriber in the
//! host application to see the output:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("earthsci_core::load=debug,earthsci_catalog=info")
//!     .init();
//! ```
//!
//! # Debug Visualization
//!
//! ```
//! use earthsci_core::LayerTree;
//! use earthsci_core::logging::LayerTreeDebug;
//!
//! let tree = LayerTree::new();
//! let folder = tree.create_folder("Imagery", None);
//! tree.add_child(tree.root(), folder).unwrap();
//!
//! let output = LayerTreeDebug::new().format_subtree(&tree, tree.root()).unwrap();
//! assert!(output.contains("Imagery"));
//! ```

use std::fmt::Write as FmtWrite;

use crate::error::TreeResult;
use crate::tree::{LayerTree, NodeId, NodeKind};

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Layer tree structure target.
    pub const TREE: &str = "earthsci_core::tree";
    /// Cached aggregate rebuilds.
    pub const CACHE: &str = "earthsci_core::cache";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "earthsci_core::signal";
    /// Load state machine target.
    pub const LOAD: &str = "earthsci_core::load";
    /// Background resolver target.
    pub const WORKER: &str = "earthsci_core::worker";
    /// User notifications target.
    pub const NOTIFY: &str = "earthsci_core::notification";
    /// Prompt answers target.
    pub const PROMPT: &str = "earthsci_core::prompt";
    /// Performance spans target.
    pub const PERF: &str = "earthsci_core::perf";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node IDs.
    pub show_ids: bool,
    /// Whether to show node kinds.
    pub show_kinds: bool,
    /// Whether to show URI, enabled state and status.
    pub show_details: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_kinds: true,
            show_details: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_details: true,
            ..Default::default()
        }
    }

    /// Options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_kinds: false,
            show_details: false,
            ..Default::default()
        }
    }
}

/// Renders a layer tree as indented text.
#[derive(Debug, Clone, Default)]
pub struct LayerTreeDebug {
    options: TreeFormatOptions,
}

impl LayerTreeDebug {
    /// Create a visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a visualizer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format the subtree rooted at `root`.
    pub fn format_subtree(&self, tree: &LayerTree, root: NodeId) -> TreeResult<String> {
        let mut output = String::new();
        self.format_into(tree, root, 0, true, &mut Vec::new(), &mut output)?;
        Ok(output)
    }

    fn format_into(
        &self,
        tree: &LayerTree,
        id: NodeId,
        depth: usize,
        is_last: bool,
        ancestors_last: &mut Vec<bool>,
        output: &mut String,
    ) -> TreeResult<()> {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return Ok(());
        }

        if depth > 0 {
            output.push_str(&self.build_prefix(ancestors_last, is_last));
        }
        let name = tree.label_or_name(id)?;
        output.push_str(if name.is_empty() { "(unnamed)" } else { &name });

        // Writing to a String never fails.
        if self.options.show_ids {
            let _ = write!(output, " [{id:?}]");
        }
        if self.options.show_kinds {
            let kind = match tree.kind(id)? {
                NodeKind::Root => "root",
                NodeKind::Folder => "folder",
                NodeKind::Layer => "layer",
            };
            let _ = write!(output, " ({kind})");
        }
        if self.options.show_details {
            if let Some(uri) = tree.uri(id)? {
                let _ = write!(output, " <{uri}>");
            }
            match tree.is_enabled(id)? {
                Some(true) => output.push_str(" on"),
                Some(false) => output.push_str(" off"),
                None => {}
            }
            if let Some(message) = tree.status(id)?.message() {
                let _ = write!(output, " !{message}");
            }
        }
        output.push('\n');

        let children = tree.children(id)?;
        let count = children.len();
        // The root draws no column of its own.
        if depth > 0 {
            ancestors_last.push(is_last);
        }
        for (i, child) in children.into_iter().enumerate() {
            self.format_into(tree, child, depth + 1, i + 1 == count, ancestors_last, output)?;
        }
        if depth > 0 {
            ancestors_last.pop();
        }
        Ok(())
    }

    /// Prefix for a node below the root. `ancestors_last` holds, per
    /// ancestor level below the root, whether that ancestor closed its
    /// sibling list; closed levels get blank padding instead of a branch.
    fn build_prefix(&self, ancestors_last: &[bool], is_last: bool) -> String {
        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+-- ", "`-- "),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
            TreeStyle::Compact => ("", "- ", "- "),
        };

        let mut prefix = String::new();
        for &closed in ancestors_last {
            if closed {
                prefix.extend(std::iter::repeat_n(' ', branch.chars().count()));
            } else {
                prefix.push_str(branch);
            }
            prefix.extend(std::iter::repeat_n(' ', self.options.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Used to time whole sync operations.
#[derive(Debug)]
pub struct PerfSpan {
    _span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation = name);
        Self {
            _span: span.entered(),
        }
    }
}
