//! Property tests for tree reconstruction

use pagesnap::extraction::{DomNode, TreeLimits};
use proptest::prelude::*;

const TAGS: &[&str] = &["DIV", "SPAN", "A", "P", "UL", "LI", "FORM", "INPUT", "svg"];

fn arb_tree() -> impl Strategy<Value = DomNode> {
    let leaf = prop::sample::select(TAGS).prop_map(DomNode::new);
    leaf.prop_recursive(6, 64, 5, |inner| {
        (
            prop::sample::select(TAGS),
            prop::collection::vec(inner, 0..5),
        )
            .prop_map(|(tag, children)| {
                children
                    .into_iter()
                    .fold(DomNode::new(tag), DomNode::with_child)
            })
    })
}

/// Encode a tree the way the in-page walk does
fn encode(root: &DomNode) -> Vec<(String, usize)> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        out.push((node.tag.clone(), node.children.len()));
        stack.extend(node.children.iter().rev());
    }
    out
}

proptest! {
    #[test]
    fn rebuild_restores_the_tree(children in prop::collection::vec(arb_tree(), 0..6)) {
        let root = children.into_iter().fold(DomNode::new("body"), DomNode::with_child);
        let rebuilt = DomNode::from_preorder(encode(&root), &TreeLimits::default()).unwrap();

        prop_assert_eq!(&rebuilt, &root);
        prop_assert_eq!(rebuilt.node_count(), encode(&root).len());
        prop_assert!(rebuilt.tags().eq(encode(&root).iter().map(|(t, _)| t.as_str())));
    }

    #[test]
    fn tags_are_upper_case(tree in arb_tree()) {
        prop_assert!(tree.tags().all(|t| t == t.to_ascii_uppercase()));
    }

    #[test]
    fn limits_are_enforced(tree in arb_tree(), max_nodes in 1usize..40, max_depth in 1usize..8) {
        let limits = TreeLimits::new(max_nodes, max_depth);
        let result = DomNode::from_preorder(encode(&tree), &limits);
        let fits = tree.node_count() <= max_nodes && tree.depth() <= max_depth;
        prop_assert_eq!(result.is_ok(), fits);
    }
}
