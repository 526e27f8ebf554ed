mod common;

use common::Counter;
use statetree::{FeatureValue, StateTree, Tracker, TreeConfig, ValueChangePolicy};

#[test]
fn reading_a_property_reruns_only_after_it_changes() {
    let tree = StateTree::new();
    let node = common::element(&tree);
    let foo = node.element_properties().unwrap().get_property("foo").unwrap();
    let runs = Counter::new();

    let (p, r) = (foo.clone(), runs.clone());
    tree.run_when_dependencies_change(move |cx| {
        r.bump();
        p.value(cx);
    });

    tree.flush().unwrap();
    assert_eq!(runs.get(), 1);
    tree.flush().unwrap();
    assert_eq!(runs.get(), 1);

    foo.set_value("bar").unwrap();
    tree.flush().unwrap();
    assert_eq!(runs.get(), 2);
}

#[test]
fn stopped_computation_ignores_later_changes() {
    let tree = StateTree::new();
    let node = common::element(&tree);
    let foo = node.element_properties().unwrap().get_property("foo").unwrap();
    let runs = Counter::new();

    let (p, r) = (foo.clone(), runs.clone());
    let computation = tree.run_when_dependencies_change(move |cx| {
        r.bump();
        p.value(cx);
    });
    tree.flush().unwrap();
    computation.stop();

    foo.set_value(1).unwrap();
    tree.flush().unwrap();
    assert_eq!(runs.get(), 1);
}

#[test]
fn unchanged_value_policy_decides_recompute() {
    for (policy, expected_runs) in [
        (ValueChangePolicy::AlwaysNotify, 3),
        (ValueChangePolicy::SkipUnchanged, 2),
    ] {
        let tree = StateTree::with_config(TreeConfig {
            value_change_policy: policy,
            ..TreeConfig::default()
        });
        let node = common::element(&tree);
        let foo = node.element_properties().unwrap().get_property("foo").unwrap();
        let runs = Counter::new();

        let (p, r) = (foo.clone(), runs.clone());
        tree.run_when_dependencies_change(move |cx| {
            r.bump();
            p.value(cx);
        });
        tree.flush().unwrap();

        foo.set_value("same").unwrap();
        tree.flush().unwrap();
        foo.set_value("same").unwrap();
        tree.flush().unwrap();

        assert_eq!(runs.get(), expected_runs, "{policy:?}");
    }
}

#[test]
fn enumeration_depends_on_the_set_of_properties() {
    let tree = StateTree::new();
    let node = common::element(&tree);
    let map = node.element_attributes().unwrap();
    map.get_property("a").unwrap();
    let seen = Counter::new();
    let runs = Counter::new();

    let (m, s, r) = (map.clone(), seen.clone(), runs.clone());
    tree.run_when_dependencies_change(move |cx| {
        r.bump();
        m.for_each_property(cx, |_, _| s.bump());
    });
    tree.flush().unwrap();
    assert_eq!((runs.get(), seen.get()), (1, 1));

    map.get_property("a").unwrap();
    tree.flush().unwrap();
    assert_eq!(runs.get(), 1, "existing slot is not an addition");

    map.get_property("b").unwrap();
    tree.flush().unwrap();
    assert_eq!((runs.get(), seen.get()), (2, 3));
}

#[test]
fn missing_value_read_wakes_up_when_the_slot_is_created() {
    let tree = StateTree::new();
    let node = common::element(&tree);
    let map = node.element_properties().unwrap();
    let runs = Counter::new();

    let (m, r) = (map.clone(), runs.clone());
    tree.run_when_dependencies_change(move |cx| {
        r.bump();
        m.has_property_value(cx, "late");
    });
    tree.flush().unwrap();

    map.set_property("late", true).unwrap();
    tree.flush().unwrap();
    assert_eq!(runs.get(), 2);

    map.remove_property("late");
    tree.flush().unwrap();
    assert_eq!(runs.get(), 3);
}

#[test]
fn list_size_is_a_reactive_source() {
    let tree = StateTree::new();
    let parent = common::element(&tree);
    let children = parent.element_children().unwrap();
    let sizes = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

    let (list, s) = (children.clone(), sizes.clone());
    tree.run_when_dependencies_change(move |cx| {
        s.borrow_mut().push(list.size(cx));
    });
    tree.flush().unwrap();

    let child = common::element(&tree);
    children.append(&child).unwrap();
    tree.flush().unwrap();
    children.clear().unwrap();
    tree.flush().unwrap();

    assert_eq!(*sizes.borrow(), vec![0, 1, 0]);
}

#[test]
fn untracked_read_inside_body_creates_no_dependency() {
    let tree = StateTree::new();
    let node = common::element(&tree);
    let foo = node.element_properties().unwrap().get_property("foo").unwrap();
    let runs = Counter::new();

    let (p, r) = (foo.clone(), runs.clone());
    tree.run_when_dependencies_change(move |cx: &Tracker| {
        r.bump();
        cx.untrack(|untracked| p.value(untracked));
    });
    tree.flush().unwrap();

    foo.set_value(1).unwrap();
    tree.flush().unwrap();
    assert_eq!(runs.get(), 1);
}

#[test]
fn body_mutating_the_tree_is_settled_in_one_flush() {
    let tree = StateTree::new();
    let node = common::element(&tree);
    let map = node.element_properties().unwrap();
    let source = map.get_property("source").unwrap();
    let derived = map.get_property("derived").unwrap();

    let (s, d) = (source.clone(), derived.clone());
    tree.run_when_dependencies_change(move |cx| {
        let doubled = s
            .value(cx)
            .and_then(|v| v.as_scalar().and_then(serde_json::Value::as_i64))
            .map(|n| n * 2);
        if let Some(n) = doubled {
            d.set_value(n).unwrap();
        }
    });
    let echoed = Counter::new();
    let (d, e) = (derived.clone(), echoed.clone());
    tree.run_when_dependencies_change(move |cx| {
        if d.value(cx).is_some() {
            e.bump();
        }
    });
    tree.flush().unwrap();

    source.set_value(21).unwrap();
    tree.flush().unwrap();

    let cx = Tracker::untracked();
    assert_eq!(derived.value(&cx), Some(FeatureValue::from(42i64)));
    assert_eq!(echoed.get(), 1);
}
