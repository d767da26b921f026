//! Structural extraction module
//!
//! This module turns the live rendered document into the canonical
//! element-only skeleton used for structural comparison.

pub mod dom;
pub mod snapshot;

pub use dom::{DomNode, DomTreeExtractor, Preorder, TreeLimits};
pub use snapshot::PageSnapshot;
