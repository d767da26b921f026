//! Structural skeleton extraction
//!
//! The live document is walked in the page with an explicit work stack and
//! shipped back as a flat pre-order list of `[tagName, childElementCount]`.
//! Rust rebuilds the nested [`DomNode`] from that list, again without
//! recursion, enforcing the same [`TreeLimits`] on both sides.

use crate::browser::PageHandle;
use crate::error::{ExtractionError, Result};
use crate::extraction::PageSnapshot;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Default maximum number of elements in one tree
pub const DEFAULT_MAX_NODES: usize = 200_000;

/// Default maximum nesting depth (levels, body = 1)
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// One element of the structural skeleton
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomNode {
    /// Canonical upper-case tag name
    pub tag: String,
    /// Child elements in document order
    #[serde(default)]
    pub children: Vec<DomNode>,
}

impl DomNode {
    /// A childless node; the tag is canonicalized to upper case
    pub fn new<S: AsRef<str>>(tag: S) -> Self {
        Self {
            tag: tag.as_ref().to_ascii_uppercase(),
            children: Vec::new(),
        }
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }

    /// Total number of elements, this one included
    pub fn node_count(&self) -> usize {
        self.tags().count()
    }

    /// Number of levels in the tree (a leaf has depth 1)
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, level)) = stack.pop() {
            max = max.max(level);
            stack.extend(node.children.iter().map(|c| (c, level + 1)));
        }
        max
    }

    /// Tags in pre-order (document order)
    pub fn tags(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Rebuild a tree from its pre-order `(tag, child_count)` encoding.
    pub fn from_preorder<I>(entries: I, limits: &TreeLimits) -> std::result::Result<Self, ExtractionError>
    where
        I: IntoIterator<Item = (String, usize)>,
    {
        let mut iter = entries.into_iter();
        let (tag, count) = iter
            .next()
            .ok_or_else(|| ExtractionError::Malformed("empty node list".to_string()))?;

        if limits.max_depth == 0 {
            return Err(limits.too_deep());
        }

        let mut seen = 1usize;
        let mut stack: Vec<(DomNode, usize)> = vec![(DomNode::new(tag), count)];

        loop {
            while matches!(stack.last(), Some((_, 0))) {
                let Some((node, _)) = stack.pop() else { break };
                match stack.last_mut() {
                    Some((parent, remaining)) => {
                        parent.children.push(node);
                        *remaining -= 1;
                    }
                    None => {
                        if iter.next().is_some() {
                            return Err(ExtractionError::Malformed(
                                "entries after the root closed".to_string(),
                            ));
                        }
                        return Ok(node);
                    }
                }
            }

            let (tag, count) = iter.next().ok_or_else(|| {
                ExtractionError::Malformed(format!("node list truncated after {} entries", seen))
            })?;

            seen += 1;
            if seen > limits.max_nodes {
                return Err(limits.too_many());
            }
            if stack.len() + 1 > limits.max_depth {
                return Err(limits.too_deep());
            }
            stack.push((DomNode::new(tag), count));
        }
    }
}

/// Pre-order iterator over tag names
pub struct Preorder<'a> {
    stack: Vec<&'a DomNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node.tag.as_str())
    }
}

/// Guards against adversarially large documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLimits {
    /// Maximum number of elements
    pub max_nodes: usize,
    /// Maximum nesting depth in levels
    pub max_depth: usize,
}

impl Default for TreeLimits {
    fn default() -> Self {
        Self {
            max_nodes: DEFAULT_MAX_NODES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl TreeLimits {
    /// Limits with explicit values
    pub fn new(max_nodes: usize, max_depth: usize) -> Self {
        Self {
            max_nodes,
            max_depth,
        }
    }

    fn too_many(&self) -> ExtractionError {
        ExtractionError::TreeTooLarge {
            reason: "nodes".to_string(),
            limit: self.max_nodes,
        }
    }

    fn too_deep(&self) -> ExtractionError {
        ExtractionError::TreeTooLarge {
            reason: "depth".to_string(),
            limit: self.max_depth,
        }
    }

    /// In-page traversal script with these limits baked in
    pub fn traversal_script(&self) -> String {
        TRAVERSAL_SCRIPT
            .replace("__MAX_NODES__", &self.max_nodes.to_string())
            .replace("__MAX_DEPTH__", &self.max_depth.to_string())
    }
}

const TRAVERSAL_SCRIPT: &str = r#"
    (() => {
        const maxNodes = __MAX_NODES__;
        const maxDepth = __MAX_DEPTH__;
        const title = document.title || '';
        const root = document.body;
        if (!root) {
            return { ok: false, reason: 'nobody', title, nodes: [] };
        }
        const nodes = [];
        const stack = [[root, 1]];
        while (stack.length > 0) {
            const [el, depth] = stack.pop();
            if (depth > maxDepth) {
                return { ok: false, reason: 'depth', title, nodes: [] };
            }
            const kids = el.children;
            if (nodes.length + 1 + stack.length + kids.length > maxNodes) {
                return { ok: false, reason: 'nodes', title, nodes: [] };
            }
            nodes.push([el.tagName, kids.length]);
            for (let i = kids.length - 1; i >= 0; i--) {
                stack.push([kids[i], depth + 1]);
            }
        }
        return { ok: true, reason: null, title, nodes };
    })()
"#;

/// Raw traversal result as returned by the page
#[derive(Debug, Deserialize)]
pub(crate) struct RawTraversal {
    pub ok: bool,
    pub reason: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<(String, usize)>,
}

impl RawTraversal {
    pub(crate) fn into_snapshot(self, limits: &TreeLimits) -> std::result::Result<PageSnapshot, ExtractionError> {
        if !self.ok {
            return Err(match self.reason.as_deref() {
                Some("nobody") => ExtractionError::NoBody,
                Some("depth") => limits.too_deep(),
                Some("nodes") => limits.too_many(),
                other => ExtractionError::Malformed(format!("traversal failed: {:?}", other)),
            });
        }
        let root = DomNode::from_preorder(self.nodes, limits)?;
        Ok(PageSnapshot::new(self.title, root))
    }
}

/// Walks the live rendered document
pub struct DomTreeExtractor;

impl DomTreeExtractor {
    /// Extract the title and structural skeleton rooted at `document.body`
    #[instrument(skip(page))]
    pub async fn snapshot(page: &PageHandle, limits: &TreeLimits) -> Result<PageSnapshot> {
        info!("Extracting DOM skeleton");

        let raw: RawTraversal = page
            .page
            .evaluate(limits.traversal_script())
            .await
            .map_err(|e| ExtractionError::JsExecutionFailed(e.to_string()))?
            .into_value()
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        let snapshot = raw.into_snapshot(limits)?;
        debug!(
            "Extracted {} elements, depth {}",
            snapshot.root.node_count(),
            snapshot.root.depth()
        );
        Ok(snapshot)
    }

    /// Extract only the skeleton
    pub async fn extract(page: &PageHandle, limits: &TreeLimits) -> Result<DomNode> {
        Ok(Self::snapshot(page, limits).await?.root)
    }
}
