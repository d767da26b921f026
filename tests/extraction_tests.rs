//! Extraction module tests
//!
//! Tree reconstruction, limits, and the structure file format.

use pagesnap::browser::CaptureFormat;
use pagesnap::error::{Error, ExtractionError, WriteError};
use pagesnap::extraction::{DomNode, PageSnapshot, TreeLimits};
use pagesnap::ArtifactWriter;
use pretty_assertions::assert_eq;
use std::path::Path;

fn entry(tag: &str, children: usize) -> (String, usize) {
    (tag.to_string(), children)
}

fn login_form() -> DomNode {
    DomNode::new("body")
        .with_child(DomNode::new("header").with_child(DomNode::new("img")))
        .with_child(
            DomNode::new("form")
                .with_child(DomNode::new("input"))
                .with_child(DomNode::new("input"))
                .with_child(DomNode::new("button")),
        )
}

#[test]
fn test_preorder_rebuild_matches_document_order() {
    let entries = vec![
        entry("BODY", 2),
        entry("HEADER", 1),
        entry("IMG", 0),
        entry("FORM", 3),
        entry("INPUT", 0),
        entry("INPUT", 0),
        entry("BUTTON", 0),
    ];
    let tree = DomNode::from_preorder(entries, &TreeLimits::default()).unwrap();

    assert_eq!(tree, login_form());
    assert_eq!(tree.node_count(), 7);
    assert_eq!(tree.depth(), 3);
    assert_eq!(
        tree.tags().collect::<Vec<_>>(),
        vec!["BODY", "HEADER", "IMG", "FORM", "INPUT", "INPUT", "BUTTON"]
    );
}

#[test]
fn test_empty_body() {
    let tree = DomNode::from_preorder(vec![entry("BODY", 0)], &TreeLimits::default()).unwrap();
    assert_eq!(tree.tag, "BODY");
    assert!(tree.children.is_empty());
    assert_eq!(tree.node_count(), 1);
}

#[test]
fn test_limits_reject_oversized_trees() {
    let wide: Vec<_> = std::iter::once(entry("BODY", 10))
        .chain((0..10).map(|_| entry("P", 0)))
        .collect();
    let err = DomNode::from_preorder(wide, &TreeLimits::new(5, 512)).unwrap_err();
    assert!(matches!(err, ExtractionError::TreeTooLarge { ref reason, limit: 5 } if reason == "nodes"));

    let deep: Vec<_> = (0..10).map(|i| entry("DIV", usize::from(i < 9))).collect();
    let err = DomNode::from_preorder(deep, &TreeLimits::new(1000, 4)).unwrap_err();
    assert!(matches!(err, ExtractionError::TreeTooLarge { ref reason, limit: 4 } if reason == "depth"));
}

#[test]
fn test_malformed_encodings() {
    let limits = TreeLimits::default();
    assert!(matches!(
        DomNode::from_preorder(Vec::new(), &limits),
        Err(ExtractionError::Malformed(_))
    ));
    assert!(matches!(
        DomNode::from_preorder(vec![entry("BODY", 2), entry("P", 0)], &limits),
        Err(ExtractionError::Malformed(_))
    ));
    assert!(matches!(
        DomNode::from_preorder(vec![entry("BODY", 0), entry("P", 0)], &limits),
        Err(ExtractionError::Malformed(_))
    ));
}

#[test]
fn test_snapshot_json_format() {
    let snapshot = PageSnapshot::new(
        "Sign in",
        DomNode::new("body").with_child(DomNode::new("div")),
    );
    let json = String::from_utf8(snapshot.to_json_pretty().unwrap()).unwrap();
    let expected = r#"{
  "title": "Sign in",
  "dom": {
    "tag": "BODY",
    "children": [
      {
        "tag": "DIV",
        "children": []
      }
    ]
  }
}"#;
    assert_eq!(json, expected);
}

#[test]
fn test_snapshot_serialization_is_deterministic() {
    let a = PageSnapshot::new("Login", login_form()).to_json_pretty().unwrap();
    let b = PageSnapshot::new("Login", login_form()).to_json_pretty().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_snapshot_reads_both_formats() {
    let limits = TreeLimits::default();
    let current = PageSnapshot::new("Login", login_form());
    let parsed = PageSnapshot::from_json(&current.to_json_pretty().unwrap(), &limits).unwrap();
    assert_eq!(parsed, current);

    let legacy = br#"{"tag":"BODY","children":[{"tag":"A","children":[]}]}"#;
    let parsed = PageSnapshot::from_json(legacy, &limits).unwrap();
    assert_eq!(parsed.title, "");
    assert_eq!(parsed.root.tags().collect::<Vec<_>>(), vec!["BODY", "A"]);
}

#[test]
fn test_snapshot_rejects_deep_json() {
    let mut json = String::new();
    for _ in 0..50 {
        json.push_str(r#"{"tag":"DIV","children":["#);
    }
    json.push_str(r#"{"tag":"P","children":[]}"#);
    for _ in 0..50 {
        json.push_str("]}");
    }
    let err = PageSnapshot::from_json(json.as_bytes(), &TreeLimits::new(1000, 10)).unwrap_err();
    assert!(matches!(err, Error::Extraction(ExtractionError::TreeTooLarge { .. })));

    let ok = PageSnapshot::from_json(json.as_bytes(), &TreeLimits::new(1000, 64)).unwrap();
    assert_eq!(ok.root.depth(), 51);
}

#[test]
fn test_snapshot_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.json");
    let snapshot = PageSnapshot::new("Login", login_form());
    std::fs::write(&path, snapshot.to_json_pretty().unwrap()).unwrap();

    let loaded = PageSnapshot::load(&path, &TreeLimits::default()).unwrap();
    assert_eq!(loaded, snapshot);
}

#[test]
fn test_artifact_paths_are_confined() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ArtifactWriter::new(dir.path());

    let paths = writer.paths_for(Path::new("runs/login"), CaptureFormat::Png).unwrap();
    assert_eq!(paths.structure, dir.path().join("runs/login.json"));
    assert_eq!(paths.image, dir.path().join("runs/login.png"));

    assert!(matches!(
        writer.resolve(Path::new("../escape")),
        Err(WriteError::OutsideOutputDir(_))
    ));
    assert!(matches!(
        writer.resolve(Path::new("/etc/passwd")),
        Err(WriteError::OutsideOutputDir(_))
    ));
}

#[test]
fn test_artifact_base_must_name_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let writer = ArtifactWriter::new(dir.path());

    let err = writer
        .paths_for(Path::new("sub/"), CaptureFormat::Png)
        .unwrap_err();
    assert!(matches!(err, WriteError::InvalidBase(_)));

    let paths = writer.paths_for(Path::new("sub/page"), CaptureFormat::Png).unwrap();
    assert_eq!(paths.structure.parent(), paths.image.parent());
    assert_eq!(paths.structure.file_stem(), paths.image.file_stem());
}
