//! Page snapshot document
//!
//! The serialized form consumed by the downstream structural scorer:
//!
//! ```text
//! { "title": string, "dom": { "tag": string, "children": [ <dom>, ... ] } }
//! ```

use crate::error::{ExtractionError, Result};
use crate::extraction::{DomNode, TreeLimits};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Title plus structural skeleton of one loaded page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// `document.title` at capture time, possibly empty
    #[serde(default)]
    pub title: String,
    /// Skeleton rooted at the body element
    #[serde(rename = "dom")]
    pub root: DomNode,
}

impl PageSnapshot {
    /// Create a snapshot
    pub fn new<S: Into<String>>(title: S, root: DomNode) -> Self {
        Self {
            title: title.into(),
            root,
        }
    }

    /// Pretty JSON with two-space indentation.
    ///
    /// Identical snapshots always produce identical bytes.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parse a snapshot, also accepting the legacy bare-tree form
    /// (`{ "tag", "children" }` with no title).
    pub fn from_json(bytes: &[u8], limits: &TreeLimits) -> Result<Self> {
        // Each tree level is one object plus one children array.
        let max_nesting = limits.max_depth.saturating_mul(2).saturating_add(2);
        let nesting = json_nesting_depth(bytes);
        if nesting > max_nesting {
            return Err(ExtractionError::TreeTooLarge {
                reason: "depth".to_string(),
                limit: limits.max_depth,
            }
            .into());
        }

        let snapshot = match parse_unbounded::<PageSnapshot>(bytes) {
            Ok(snapshot) => snapshot,
            Err(current) => match parse_unbounded::<DomNode>(bytes) {
                Ok(root) => PageSnapshot::new("", root),
                Err(legacy) => {
                    return Err(ExtractionError::Malformed(format!(
                        "not a snapshot: {}; not a bare tree either: {}",
                        current, legacy
                    ))
                    .into())
                }
            },
        };

        if snapshot.root.node_count() > limits.max_nodes {
            return Err(ExtractionError::TreeTooLarge {
                reason: "nodes".to_string(),
                limit: limits.max_nodes,
            }
            .into());
        }
        Ok(snapshot)
    }

    /// Load a snapshot file
    pub fn load<P: AsRef<Path>>(path: P, limits: &TreeLimits) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes, limits)
    }
}

fn parse_unbounded<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> serde_json::Result<T> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.disable_recursion_limit();
    let value = T::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

/// Maximum bracket nesting in a JSON document, ignoring string contents
fn json_nesting_depth(bytes: &[u8]) -> usize {
    let mut depth = 0usize;
    let mut max = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for &b in bytes {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                max = max.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}
