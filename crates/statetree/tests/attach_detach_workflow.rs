mod common;

use common::{Counter, LifecycleLog};
use statetree::{FeatureKind, NodeChange, StateTree, Tracker, TreeError};

#[test]
fn attach_is_pre_order_and_detach_is_post_order() {
    let tree = StateTree::new();
    let (a, b, c) = common::small_subtree(&tree);
    let log = LifecycleLog::default();
    for node in [&a, &b, &c] {
        log.watch(node);
    }
    let root_children = tree.root().element_children().unwrap();

    root_children.append(&a).unwrap();
    assert_eq!(
        log.take(),
        vec![format!("+{}", a.id()), format!("+{}", b.id()), format!("+{}", c.id())]
    );

    root_children.remove(0).unwrap();
    assert_eq!(
        log.take(),
        vec![format!("-{}", b.id()), format!("-{}", c.id()), format!("-{}", a.id())]
    );
}

#[test]
fn detached_subtree_stays_linked_but_unattached() {
    let tree = StateTree::new();
    let (a, b, _c) = common::small_subtree(&tree);
    let root_children = tree.root().element_children().unwrap();

    root_children.append(&a).unwrap();
    assert!(b.is_attached());
    assert_eq!(tree.node(b.id()), Some(b.clone()));

    root_children.clear().unwrap();
    assert!(!a.is_attached());
    assert!(!b.is_attached());
    assert_eq!(b.parent(), Some(a.clone()), "inner links survive");
    assert!(tree.node(b.id()).is_none());
    assert_eq!(tree.attached_count(), 1);
}

#[test]
fn building_under_detached_parent_attaches_nothing() {
    let tree = StateTree::new();
    let (a, b, c) = common::small_subtree(&tree);
    for node in [&a, &b, &c] {
        assert!(!node.is_attached());
    }

    let late = common::element(&tree);
    b.element_children().unwrap().append(&late).unwrap();
    tree.root().element_children().unwrap().append(&a).unwrap();
    assert!(late.is_attached());
}

#[test]
fn adding_under_attached_parent_attaches_immediately() {
    let tree = StateTree::new();
    let (a, b, _c) = common::small_subtree(&tree);
    tree.root().virtual_children().unwrap().append(&a).unwrap();

    let late = common::element(&tree);
    let attached = Counter::new();
    let at = attached.clone();
    late.add_attach_listener(move |_| at.bump());

    b.element_children().unwrap().append(&late).unwrap();
    assert_eq!(attached.get(), 1);
    assert!(late.is_attached());
}

#[test]
fn attached_node_cannot_get_a_second_parent() {
    let tree = StateTree::new();
    let (a, b, _c) = common::small_subtree(&tree);
    tree.root().element_children().unwrap().append(&a).unwrap();
    let other = common::element(&tree);

    let err = other.element_children().unwrap().append(&b).unwrap_err();
    assert_eq!(
        err,
        TreeError::AlreadyHasParent {
            node: b.id(),
            parent: a.id()
        }
    );
    assert!(b.is_attached());
    assert_eq!(b.parent(), Some(a));
}

#[test]
fn attach_state_is_a_reactive_source() {
    let tree = StateTree::new();
    let node = common::element(&tree);
    let runs = Counter::new();
    let states = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

    let (n, r, s) = (node.clone(), runs.clone(), states.clone());
    tree.run_when_dependencies_change(move |cx: &Tracker| {
        r.bump();
        s.borrow_mut().push(n.attached(cx));
    });
    tree.flush().unwrap();

    let root_children = tree.root().element_children().unwrap();
    root_children.append(&node).unwrap();
    tree.flush().unwrap();
    root_children.clear().unwrap();
    tree.flush().unwrap();
    tree.flush().unwrap();

    assert_eq!(runs.get(), 3);
    assert_eq!(*states.borrow(), vec![false, true, false]);
}

#[test]
fn removed_reference_can_be_reinserted_in_another_list() {
    let tree = StateTree::new();
    let parent = common::element(&tree);
    tree.root().element_children().unwrap().append(&parent).unwrap();
    let child = common::element(&tree);
    let children = parent.element_children().unwrap();
    children.append(&child).unwrap();

    let reference = children.remove(0).unwrap();
    assert!(!child.is_attached());

    let virtual_children = parent.virtual_children().unwrap();
    virtual_children.insert_reference(0, reference).unwrap();
    assert_eq!(child.parent(), Some(parent.clone()));
    assert!(child.is_attached());

    virtual_children.clear().unwrap();
    assert!(!child.is_attached());
}

#[test]
fn attach_listener_removing_its_node_leaves_no_attached_descendants() {
    let tree = StateTree::new();
    let (a, b, c) = common::small_subtree(&tree);
    let log = LifecycleLog::default();
    for node in [&a, &b, &c] {
        log.watch(node);
    }
    let root_children = tree.root().element_children().unwrap();
    let list = root_children.clone();
    a.add_attach_listener(move |_| {
        list.remove(0).unwrap();
    });

    root_children.append(&a).unwrap();

    assert!(!a.is_attached());
    assert_eq!(a.parent(), None);
    assert!(!b.is_attached());
    assert!(!c.is_attached());
    assert_eq!(b.parent(), Some(a.clone()));
    assert_eq!(tree.attached_count(), 1);
    assert_eq!(
        log.take(),
        vec![format!("+{}", a.id()), format!("-{}", a.id())],
        "b and c never reported a state they no longer have"
    );
}

#[test]
fn listener_mutations_are_recorded_after_the_change_that_triggered_them() {
    let tree = StateTree::new();
    let (a, _b, _c) = common::small_subtree(&tree);
    let root_children = tree.root().element_children().unwrap();
    let list = root_children.clone();
    a.add_attach_listener(move |_| {
        list.remove(0).unwrap();
    });

    root_children.append(&a).unwrap();

    let splices: Vec<_> = tree
        .collect_changes()
        .into_iter()
        .filter(|change| change.node() == StateTree::ROOT_ID)
        .collect();
    assert_eq!(splices.len(), 2);
    assert!(matches!(
        splices[0],
        NodeChange::Splice { feature: FeatureKind::ElementChildren, index: 0, remove: 0, .. }
    ));
    assert!(matches!(
        splices[1],
        NodeChange::Splice { index: 0, remove: 1, .. }
    ));
}

#[test]
fn child_attach_listener_can_detach_an_ancestor() {
    let tree = StateTree::new();
    let (a, b, c) = common::small_subtree(&tree);
    let root_children = tree.root().element_children().unwrap();
    let list = root_children.clone();
    b.add_attach_listener(move |_| {
        list.clear().unwrap();
    });

    root_children.append(&a).unwrap();

    for node in [&a, &b, &c] {
        assert!(!node.is_attached(), "{} still attached", node.id());
    }
    assert_eq!(tree.attached_count(), 1);
}

#[test]
fn detach_listener_can_reattach_elsewhere() {
    let tree = StateTree::new();
    let (a, b, c) = common::small_subtree(&tree);
    let log = LifecycleLog::default();
    for node in [&a, &b, &c] {
        log.watch(node);
    }
    let root = tree.root().clone();
    let root_children = root.element_children().unwrap();
    root_children.append(&a).unwrap();
    log.take();

    let shelter = root.virtual_children().unwrap();
    let target = shelter.clone();
    let moved = a.clone();
    let once = Counter::new();
    let guard = once.clone();
    a.add_detach_listener(move |_| {
        if guard.get() == 0 {
            guard.bump();
            target.append(&moved).unwrap();
        }
    });

    root_children.remove(0).unwrap();

    assert_eq!(a.parent(), Some(root.clone()));
    for node in [&a, &b, &c] {
        assert!(node.is_attached());
    }
    assert_eq!(tree.attached_count(), 4);
    assert_eq!(
        log.take(),
        vec![
            format!("-{}", b.id()),
            format!("-{}", c.id()),
            format!("-{}", a.id()),
            format!("+{}", a.id()),
            format!("+{}", b.id()),
            format!("+{}", c.id()),
        ]
    );
    assert_eq!(once.get(), 1);
}
