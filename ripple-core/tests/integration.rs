//! Integration Tests for the Rendering Core
//!
//! These tests drive reactive data, the scheduler and the patch engine
//! together through the public API.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use ripple_core::component::{mount_component_render_loop, Component, ComponentOptions, RenderContext};
use ripple_core::reactive::{
    define_reactive, observable, observe, watch, watch_path, Computed, Object, ReactiveContext, Value,
    WatchOptions,
};
use ripple_core::scheduler::{next_tick, run_tick, run_until_idle};
use ripple_core::vdom::{
    attributes_module, class_module, DomOp, MemoryDom, NodeHandle, PatchTarget, Patcher, VNode, VNodeRef,
};

type Node = VNode<NodeHandle>;

fn object(value: &Value) -> Object {
    value.as_object().cloned().unwrap()
}

fn keyed(keys: &[&str]) -> VNodeRef<NodeHandle> {
    Node::element("ul")
        .children(keys.iter().map(|k| Node::element("li").key(*k).text(*k).build()))
        .build()
}

fn mounted_list(keys: &[&str]) -> (Arc<MemoryDom>, Patcher<MemoryDom>, VNodeRef<NodeHandle>, NodeHandle) {
    let dom = Arc::new(MemoryDom::new());
    let patcher = Patcher::new(dom.clone(), [attributes_module(), class_module()]);
    let body = dom.root("body");
    let placeholder = dom.root("div");
    dom.attach(body, placeholder);

    let tree = keyed(keys);
    let root = patcher.patch(PatchTarget::Live(placeholder), &tree).unwrap();
    dom.reset_log();
    (dom, patcher, tree, root)
}

fn child_texts(dom: &MemoryDom, root: NodeHandle) -> Vec<String> {
    dom.children(root).into_iter().map(|c| dom.text_content(c)).collect()
}

/// A changed property re-runs each reader exactly once per tick.
#[test]
fn property_change_reruns_subscriber_once() {
    let state = observable(json!({ "a": 1, "b": 2 }));
    let runs = Arc::new(Mutex::new(0));

    let reader = object(&state);
    let counter = runs.clone();
    let _watcher = watch(
        move || {
            *counter.lock() += 1;
            Ok(reader.get("a").unwrap_or_default())
        },
        |_, _| Ok(()),
        WatchOptions::default(),
    )
    .unwrap();
    assert_eq!(*runs.lock(), 1);

    let data = object(&state);
    data.assign("a", 10);
    data.assign("a", 11);
    data.assign("b", 3);
    run_until_idle().unwrap();

    assert_eq!(*runs.lock(), 2);
}

/// Reads outside any subscriber leave no trace.
#[test]
fn untracked_reads_register_nothing() {
    let data = Object::new();
    let dep = define_reactive(&data, "a", 1);

    assert!(!ReactiveContext::is_active());
    assert_eq!(data.get("a"), Some(Value::from(1)));
    assert_eq!(dep.subscriber_count(), 0);
}

/// Observing an observed value returns the same observer.
#[test]
fn observe_is_idempotent() {
    let value = Value::from(json!({ "nested": { "x": 1 } }));
    let first = observe(&value).unwrap();
    let second = observe(&value).unwrap();
    assert!(first.ptr_eq(&second));

    let nested = object(&value).get_untracked("nested").unwrap();
    let inner = nested.observer().unwrap();
    assert!(inner.ptr_eq(&observe(&nested).unwrap()));
}

#[test]
fn keyed_rotation_moves_without_recreating() {
    let (dom, patcher, old, root) = mounted_list(&["a", "b", "c"]);
    let before = dom.children(root);

    let new = keyed(&["c", "a", "b"]);
    patcher.patch(PatchTarget::Tree(old), &new).unwrap();

    let ops = dom.take_ops();
    assert!(ops.iter().all(|op| matches!(op, DomOp::InsertBefore { .. })), "{ops:?}");
    assert_eq!(child_texts(&dom, root), ["c", "a", "b"]);
    assert_eq!(dom.children(root), vec![before[2], before[0], before[1]]);
}

#[test]
fn keyed_insert_creates_only_the_new_child() {
    let (dom, patcher, old, root) = mounted_list(&["a", "b"]);
    let before = dom.children(root);

    let new = keyed(&["a", "x", "b"]);
    patcher.patch(PatchTarget::Tree(old), &new).unwrap();

    let created = dom
        .take_ops()
        .into_iter()
        .filter(|op| matches!(op, DomOp::CreateElement { .. }))
        .count();
    assert_eq!(created, 1);

    let after = dom.children(root);
    assert_eq!(child_texts(&dom, root), ["a", "x", "b"]);
    assert_eq!((after[0], after[2]), (before[0], before[1]));
}

#[test]
fn patching_a_tree_against_itself_makes_no_calls() {
    let (dom, patcher, tree, _) = mounted_list(&["a", "b", "c"]);
    patcher.patch(PatchTarget::Tree(tree.clone()), &tree).unwrap();
    assert_eq!(dom.call_count(), 0);
    assert!(dom.take_ops().is_empty());
}

/// Subscribers flush in creation order whatever the notification order.
#[test]
fn flush_runs_in_creation_order() {
    let state = observable(json!({ "s1": 0, "s2": 0, "s3": 0 }));
    let order = Arc::new(Mutex::new(Vec::new()));

    let watchers: Vec<_> = ["s1", "s2", "s3"]
        .into_iter()
        .map(|key| {
            let log = order.clone();
            watch_path(
                &state,
                key,
                move |_, _| {
                    log.lock().push(key);
                    Ok(())
                },
                WatchOptions::default(),
            )
            .unwrap()
        })
        .collect();

    let data = object(&state);
    data.assign("s3", 1);
    data.assign("s2", 1);
    data.assign("s1", 1);
    run_tick().unwrap();

    assert_eq!(*order.lock(), vec!["s1", "s2", "s3"]);
    drop(watchers);
}

#[test]
fn count_render_scenario() {
    let dom = Arc::new(MemoryDom::new());
    let patcher = Arc::new(Patcher::new(dom.clone(), Vec::new()));
    let body = dom.root("body");
    let placeholder = dom.root("div");
    dom.attach(body, placeholder);

    let options = ComponentOptions::new("counter", |cx: &RenderContext<'_, MemoryDom>| {
        let count = cx.get("count").as_f64().unwrap_or_default();
        Ok(Node::element("span").text(format!("count: {count}")).build())
    })
    .data(json!({ "count": 0 }));
    let component = Component::new(options, patcher);

    let root = mount_component_render_loop(&component, Some(placeholder)).unwrap();
    assert_eq!(dom.text_content(root), "count: 0");
    let mounted_patches = component.patch_count();

    object(component.data()).assign("count", 1);
    run_tick().unwrap();

    assert_eq!(dom.text_content(root), "count: 1");
    assert_eq!(component.patch_count() - mounted_patches, 1);
    assert_eq!(dom.children(body), vec![root]);
}

#[test]
fn array_length_watch_fires_once() {
    let state = observable(json!({ "items": ["a"] }));
    let calls = Arc::new(Mutex::new(Vec::new()));

    let log = calls.clone();
    let _watcher = watch_path(
        &state,
        "items.length",
        move |new, old| {
            log.lock().push((new.clone(), old.clone()));
            Ok(())
        },
        WatchOptions::default(),
    )
    .unwrap();

    let items = object(&state).get_untracked("items").unwrap();
    items.as_array().unwrap().push([Value::from("b")]);
    run_tick().unwrap();

    assert_eq!(*calls.lock(), vec![(Value::from(2), Value::from(1))]);
}

#[test]
fn computed_feeds_render_and_next_tick_sees_flushed_state() {
    let dom = Arc::new(MemoryDom::new());
    let patcher = Arc::new(Patcher::new(dom.clone(), Vec::new()));

    let state = observable(json!({ "first": "Ada", "last": "Lovelace" }));
    let source = object(&state);
    let full = Computed::new(move || {
        let first = source.get("first").unwrap_or_default();
        let last = source.get("last").unwrap_or_default();
        Ok(Value::from(format!(
            "{} {}",
            first.as_str().unwrap_or_default(),
            last.as_str().unwrap_or_default()
        )))
    });

    let name = full.clone();
    let options = ComponentOptions::new("badge", move |_: &RenderContext<'_, MemoryDom>| {
        let text = name.get()?;
        Ok(Node::element("b").text(text.as_str().unwrap_or_default()).build())
    });
    let component = Component::new(options, patcher);
    let root = mount_component_render_loop(&component, None).unwrap();
    assert_eq!(dom.text_content(root), "Ada Lovelace");

    object(&state).assign("last", "King");
    let seen = Arc::new(Mutex::new(String::new()));
    let probe = seen.clone();
    let probe_dom = dom.clone();
    next_tick(move || *probe.lock() = probe_dom.text_content(root));
    run_tick().unwrap();

    assert_eq!(*seen.lock(), "Ada King");
}

#[tokio::test]
async fn next_tick_future_resolves_after_tick() {
    let state = observable(json!({ "n": 0 }));
    let waiter = ripple_core::scheduler::next_tick_async();
    object(&state).assign("n", 1);
    run_tick().unwrap();
    waiter.await;
    assert_eq!(object(&state).get_untracked("n"), Some(Value::from(1)));
}
