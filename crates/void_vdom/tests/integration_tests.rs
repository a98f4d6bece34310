//! Integration tests for void_vdom crate
//!
//! Builds trees from JSON fixtures and drives them through the mutation API

use std::sync::Arc;
use void_vdom::*;

fn fixture() -> Node {
    serde_json::from_str(
        r#"{
            "component_name": "Window",
            "key": "win",
            "props": { "title": "Inbox", "size": [800, 600] },
            "children": [
                { "component_name": "Sidebar", "key": "side" },
                { "component_name": "Messages", "key": "msgs", "children": [
                    { "component_name": "Message", "key": "m1", "props": { "unread": true } },
                    { "component_name": "Message", "key": "m2", "props": { "unread": false } }
                ]}
            ]
        }"#,
    )
    .expect("fixture should parse")
}

#[test]
fn test_fixture_round_trips_through_tree() {
    let tree = Tree::from_root(fixture()).unwrap();

    assert_eq!(tree.node_count(), 5);
    assert_eq!(tree.to_node(), Some(fixture()));
    assert_eq!(
        tree.lookup("win").and_then(|n| n.props().get("size").cloned()),
        Some(Value::from(vec![800, 600]))
    );
}

#[test]
fn test_mutation_sequence_matches_rebuilt_tree() {
    let mut tree = Tree::from_root(fixture()).unwrap();

    tree.detach_subtree("m1").unwrap();
    tree.attach_node(
        Node::keyed("Message", "m3").with_prop("unread", true),
        Some("msgs"),
        0,
        true,
    )
    .unwrap();
    tree.move_node("side", 1).unwrap();
    tree.update_node_props("win", &PropsDelta::new().with_remove("size"))
        .unwrap();

    let expected = Node::keyed("Window", "win")
        .with_prop("title", "Inbox")
        .with_children([
            Node::keyed("Messages", "msgs").with_children([
                Node::keyed("Message", "m3").with_prop("unread", true),
                Node::keyed("Message", "m2").with_prop("unread", false),
            ]),
            Node::keyed("Sidebar", "side"),
        ]);

    assert_eq!(tree.to_node(), Some(expected.clone()));
    let rebuilt = Tree::from_root(expected).unwrap();
    assert_eq!(
        tree.root().and_then(|n| n.subtree_hash()),
        rebuilt.root().and_then(|n| n.subtree_hash())
    );
}

#[derive(Debug)]
struct Label(String);

impl HostObject for Label {}

struct LabelHooks;

impl HostHooks for LabelHooks {
    fn create(&self, node: NodeRef<'_>) -> std::result::Result<Option<HostHandle>, HostError> {
        Ok(Some(Arc::new(Label(node.component_name().to_string()))))
    }
}

#[test]
fn test_host_hooks_travel_with_clones() {
    let tree = Tree::from_root(fixture())
        .unwrap()
        .with_namespace("tty")
        .with_host_hooks(Arc::new(LabelHooks));
    let copy = tree.clone();

    let hooks = copy.host_hooks().expect("hooks should be cloned");
    let host = hooks.create(copy.lookup("m2").unwrap()).unwrap();
    assert!(host.is_some());
    assert_eq!(copy.namespace(), "tty");
}

#[test]
fn test_default_hooks_are_no_ops() {
    struct Nothing;
    impl HostHooks for Nothing {}

    let tree = Tree::from_root(fixture()).unwrap();
    let hooks = Nothing;
    assert!(hooks.create(tree.root().unwrap()).unwrap().is_none());

    let handle: HostHandle = Arc::new(Label("x".into()));
    assert!(hooks.apply_props(&handle, &PropsDelta::new()).is_ok());
    assert!(hooks.move_to(&handle, 3).is_ok());
    assert!(handle.destroy().is_ok());
}
