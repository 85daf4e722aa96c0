//! End-to-end reconciliation scenarios: diff, locate and apply against a live
//! document, checked through the observable live structure and the mutation
//! journal.

use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use vdom_reconciler::events::{Decoder, Handler, Mapper, Message};
use vdom_reconciler::facts::{attribute, class, on, on_message, style};
use vdom_reconciler::live::{LiveShape, Mutation};
use vdom_reconciler::node::{element, keyed, lazy, map, text, MemoArg};
use vdom_reconciler::scheduler::{DrawState, Program};
use vdom_reconciler::types::PatchAction;
use vdom_reconciler::{diff, render, update, LiveDom, LiveId, Reconciler, ReconcilerConfig, VNode};

// ── Helpers ─────────────────────────────────────────────────────────────

fn recording_dom() -> (LiveDom, Rc<RefCell<Vec<Message>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let dom = LiveDom::with_journal(Rc::new(move |msg: Message, _: bool| sink.borrow_mut().push(msg)));
    (dom, log)
}

fn fresh_shape(tree: &VNode) -> LiveShape {
    let mut dom = LiveDom::new(Rc::new(|_: Message, _: bool| {}));
    let id = render(&mut dom, tree).unwrap();
    dom.shape(id).unwrap()
}

fn creations(mutations: &[Mutation]) -> usize {
    mutations
        .iter()
        .filter(|m| matches!(m, Mutation::CreateElement { .. } | Mutation::CreateText { .. }))
        .count()
}

fn listener_churn(mutations: &[Mutation]) -> usize {
    mutations
        .iter()
        .filter(|m| matches!(m, Mutation::AddListener { .. } | Mutation::RemoveListener { .. }))
        .count()
}

/// Render `old`, reconcile to `new`, and check the result against a fresh
/// render of `new`. Returns the journal of the update alone.
fn round_trip(old: &VNode, new: &VNode) -> (LiveDom, LiveId, Vec<Mutation>) {
    let (mut dom, _) = recording_dom();
    let root = render(&mut dom, old).unwrap();
    dom.take_mutations();
    let root = update(&mut dom, root, old, new).unwrap();
    assert_eq!(dom.shape(root).unwrap(), fresh_shape(new));
    let mutations = dom.take_mutations();
    (dom, root, mutations)
}

// ── Round trips ─────────────────────────────────────────────────────────

#[test]
fn text_change_is_a_single_replace() {
    let a = element("div", vec![], vec![text("a")]);
    let b = element("div", vec![], vec![text("b")]);

    let patches = diff(&a, &b);
    assert_eq!(patches.len(), 1);
    assert!(matches!(&patches[0].action, PatchAction::ReplaceText(t) if t == "b"));

    let (_, _, mutations) = round_trip(&a, &b);
    assert_eq!(mutations.len(), 1);
    assert!(matches!(&mutations[0], Mutation::SetText { text, .. } if text == "b"));
}

#[test]
fn keyed_swap_moves_without_recreating() {
    let a = keyed("ul", vec![], vec![("x".into(), text("1")), ("y".into(), text("2"))]);
    let b = keyed("ul", vec![], vec![("y".into(), text("2")), ("x".into(), text("1"))]);

    let patches = diff(&a, &b);
    assert_eq!(patches.len(), 1);
    let PatchAction::DiffKeyedChildren(keyed_patch) = &patches[0].action else {
        panic!("expected keyed patch, got {:?}", patches[0].action);
    };
    assert_eq!(keyed_patch.moves(), 1);

    let (dom, root, mutations) = round_trip(&a, &b);
    assert_eq!(creations(&mutations), 0);
    assert_eq!(dom.len(), 3);
    assert_eq!(dom.children(root).unwrap().len(), 2);
}

#[test]
fn tag_change_is_a_single_redraw() {
    let a = element("div", vec![class("box")], vec![text("same")]);
    let b = element("span", vec![class("box")], vec![text("same")]);

    let patches = diff(&a, &b);
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].index, 0);
    assert!(matches!(patches[0].action, PatchAction::Redraw(_)));

    let (dom, root, _) = round_trip(&a, &b);
    assert_eq!(dom.len(), 2);
    assert!(dom.parent(root).is_none());
}

#[test]
fn class_facts_merge_at_render_time() {
    let tree = element("div", vec![class("b"), class("a")], vec![]);
    let LiveShape::Element { attrs, .. } = fresh_shape(&tree) else { panic!("expected element") };
    assert_eq!(attrs.get("class").map(String::as_str), Some("b a"));
}

#[test]
fn redraw_inside_parent_keeps_siblings() {
    let a = element("div", vec![], vec![text("keep"), element("p", vec![], vec![text("x")]), text("tail")]);
    let b = element("div", vec![], vec![text("keep"), element("h1", vec![], vec![text("x")]), text("tail")]);
    let (dom, root, mutations) = round_trip(&a, &b);
    assert!(mutations.iter().any(|m| matches!(m, Mutation::ReplaceChild { parent, .. } if *parent == root)));
    assert_eq!(dom.len(), 5);
}

#[test]
fn fact_updates_and_removals_round_trip() {
    let a = element(
        "div",
        vec![style("color", "red"), attribute("title", "old"), attribute("lang", "en")],
        vec![],
    );
    let b = element("div", vec![style("color", "blue"), attribute("title", "new")], vec![]);
    let (_, root, mutations) = round_trip(&a, &b);
    assert!(mutations.contains(&Mutation::SetAttribute { id: root, key: "lang".into(), value: None }));
    assert!(mutations.contains(&Mutation::SetStyle { id: root, key: "color".into(), value: Some("blue".into()) }));
}

#[test]
fn growing_and_shrinking_children() {
    let short = element("ul", vec![], vec![text("a")]);
    let long = element("ul", vec![], vec![text("a"), text("b"), element("li", vec![], vec![text("c")])]);
    round_trip(&short, &long);
    round_trip(&long, &short);
}

#[test]
fn keyed_list_edits_round_trip() {
    let list = |keys: &[&str]| {
        keyed(
            "ol",
            vec![],
            keys.iter().map(|k| (k.to_string(), element("li", vec![class(k)], vec![text(*k)]))).collect(),
        )
    };
    let cases = vec![
        (vec!["a", "b", "c"], vec!["a", "c"]),
        (vec!["a", "b", "c"], vec!["z", "a", "b", "c"]),
        (vec!["a", "b", "c"], vec!["c", "b", "a"]),
        (vec!["a", "b", "c", "d"], vec!["b", "a", "d", "c"]),
        (vec!["a", "b"], vec![]),
        (vec![], vec!["a", "b"]),
        (vec!["a", "b", "c", "d", "e"], vec!["e", "x", "c", "y", "a"]),
    ];
    for (old, new) in &cases {
        round_trip(&list(old), &list(new));
    }
}

#[test]
fn duplicate_keys_reconcile_structurally() {
    let old = keyed("ul", vec![], vec![("k".into(), text("a")), ("k".into(), text("b"))]);
    let new = keyed(
        "ul",
        vec![],
        vec![("k".into(), text("b")), ("k".into(), text("c")), ("k".into(), text("a"))],
    );
    round_trip(&old, &new);

    let old = keyed("ul", vec![], vec![("k".into(), text("a")), ("k".into(), text("b")), ("x".into(), text("x"))]);
    let new = keyed("ul", vec![], vec![("x".into(), text("x"))]);
    let (_, _, mutations) = round_trip(&old, &new);
    assert_eq!(creations(&mutations), 0);
}

// ── Memoization ─────────────────────────────────────────────────────────

#[test]
fn memo_with_identical_refs_skips_thunk_and_patches() {
    let calls = Rc::new(Cell::new(0));
    let arg: MemoArg = Rc::new("config".to_string());
    let view = |calls: Rc<Cell<usize>>, arg: MemoArg, label: &str| {
        let heavy = lazy(vec![arg], move || {
            calls.set(calls.get() + 1);
            element("section", vec![], vec![text("expensive")])
        });
        element("main", vec![], vec![text(label), heavy])
    };

    let (mut dom, _) = recording_dom();
    let first = view(calls.clone(), arg.clone(), "one");
    let root = render(&mut dom, &first).unwrap();
    assert_eq!(calls.get(), 1);

    let second = view(calls.clone(), arg.clone(), "two");
    let patches = diff(&first, &second);
    assert_eq!(patches.len(), 1);
    assert!(matches!(patches[0].action, PatchAction::ReplaceText(_)));
    let root = update(&mut dom, root, &first, &second).unwrap();
    assert_eq!(calls.get(), 1);

    let third = view(calls.clone(), arg, "two");
    assert!(diff(&second, &third).is_empty());
    update(&mut dom, root, &second, &third).unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn memo_with_new_refs_patches_inside() {
    let a = element("div", vec![], vec![lazy(vec![Rc::new(1_u8) as MemoArg], || element("b", vec![], vec![text("1")]))]);
    let b = element("div", vec![], vec![lazy(vec![Rc::new(2_u8) as MemoArg], || element("b", vec![], vec![text("2")]))]);
    let patches = diff(&a, &b);
    assert!(matches!(patches[0].action, PatchAction::RecurseIntoMemo(_)));
    let (_, _, mutations) = round_trip(&a, &b);
    assert_eq!(creations(&mutations), 0);
}

// ── Event routing ───────────────────────────────────────────────────────

fn tagged_button(mapper: Mapper, handler_message: Value) -> VNode {
    element("div", vec![], vec![map(mapper, element("button", vec![on_message("click", handler_message)], vec![]))])
}

#[test]
fn retagging_changes_messages_without_rerender() {
    let first: Mapper = Rc::new(|m: Message| json!({ "first": m }));
    let second: Mapper = Rc::new(|m: Message| json!({ "second": m }));
    let old = tagged_button(first, json!("click"));
    let new = tagged_button(second, json!("click"));

    let (mut dom, log) = recording_dom();
    let root = render(&mut dom, &old).unwrap();
    let button = dom.children(root).unwrap()[0];
    dom.dispatch_event(button, "click", &Value::Null).unwrap();

    dom.take_mutations();
    let root = update(&mut dom, root, &old, &new).unwrap();
    assert!(dom.take_mutations().is_empty());
    assert_eq!(dom.children(root).unwrap()[0], button);

    dom.dispatch_event(button, "click", &Value::Null).unwrap();
    assert_eq!(log.borrow().as_slice(), &[json!({ "first": "click" }), json!({ "second": "click" })]);
}

#[test]
fn handler_change_rebinds_without_listener_churn() {
    let old = element("button", vec![on_message("click", json!("old"))], vec![]);
    let new = element("button", vec![on_message("click", json!("new"))], vec![]);

    let (mut dom, log) = recording_dom();
    let root = render(&mut dom, &old).unwrap();
    dom.take_mutations();
    update(&mut dom, root, &old, &new).unwrap();
    assert_eq!(listener_churn(&dom.take_mutations()), 0);

    dom.dispatch_event(root, "click", &Value::Null).unwrap();
    assert_eq!(log.borrow().as_slice(), &[json!("new")]);
}

#[test]
fn events_bubble_until_stopped() {
    let stopper = Handler::MayStopPropagation(Decoder::Tuple(vec![
        Decoder::Succeed(json!("inner")),
        Decoder::Field("stop".into(), Box::new(Decoder::Value)),
    ]));
    let tree = element(
        "div",
        vec![on_message("click", json!("outer"))],
        vec![element("button", vec![on("click", stopper)], vec![])],
    );
    let (mut dom, log) = recording_dom();
    let root = render(&mut dom, &tree).unwrap();
    let button = dom.children(root).unwrap()[0];

    dom.dispatch_event(button, "click", &json!({ "stop": false })).unwrap();
    assert_eq!(log.borrow().as_slice(), &[json!("inner"), json!("outer")]);

    log.borrow_mut().clear();
    let outcome = dom.dispatch_event(button, "click", &json!({ "stop": true })).unwrap();
    assert!(outcome.stop_propagation);
    assert_eq!(log.borrow().as_slice(), &[json!("inner")]);
}

// ── Reconciler and scheduler ────────────────────────────────────────────

#[test]
fn reconciler_tracks_root_across_redraws() {
    let mut reconciler = Reconciler::with_config(
        Rc::new(|_: Message, _: bool| {}),
        ReconcilerConfig::from_json(r#"{"record_mutations": true}"#).unwrap(),
    );
    let first = reconciler.reconcile(element("div", vec![], vec![text("a")])).unwrap();
    let second = reconciler.reconcile(element("section", vec![], vec![text("a")])).unwrap();
    assert_ne!(first, second);
    assert_eq!(reconciler.root(), Some(second));
    assert_eq!(reconciler.to_html().unwrap(), "<section>a</section>");
    assert!(reconciler.drain_journal().unwrap().contains("\"op\":\"destroy\""));
}

#[test]
fn program_coalesces_async_updates() {
    let mut program = Program::new(
        ReconcilerConfig::default(),
        Vec::<String>::new(),
        |items: &mut Vec<String>, msg: Message| items.push(msg.as_str().unwrap_or_default().to_string()),
        |items: &Vec<String>| {
            keyed(
                "ul",
                vec![],
                items.iter().map(|item| (item.clone(), element("li", vec![], vec![text(item.as_str())]))).collect(),
            )
        },
    )
    .unwrap();

    program.set_model(vec!["a".into()], false).unwrap();
    program.set_model(vec!["a".into(), "b".into()], false).unwrap();
    assert_eq!(program.state(), DrawState::FrameScheduledWithPendingUpdate);
    program.animation_frame().unwrap();
    program.animation_frame().unwrap();
    assert_eq!(program.draws(), 1);
    assert_eq!(program.state(), DrawState::Idle);
    assert_eq!(program.reconciler().to_html().unwrap(), "<ul><li>a</li><li>b</li></ul>");
}
