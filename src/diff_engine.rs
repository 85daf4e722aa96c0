//! Tree differ: compares two snapshots and emits index-addressed patches.
//!
//! Indices are pre-order positions in the *old* tree. The running index is
//! threaded through the recursion; a node's subtree ends at
//! `index + descendants`, which is what lets the locator skip untouched
//! regions later.
use crate::facts::diff_facts;
use crate::keyed::diff_keyed_children;
use crate::node::{Element, Node, VNode};
use crate::types::{Patch, PatchAction};
use log::{debug, trace};
use std::rc::Rc;

/// Diff `old` against `new`, starting at index 0.
pub fn diff(old: &VNode, new: &VNode) -> Vec<Patch> {
    let mut patches = Vec::new();
    diff_help(old, new, &mut patches, 0);
    debug!("DiffEngine: {} top-level patch(es)", patches.len());
    patches
}

pub(crate) fn push_patch(patches: &mut Vec<Patch>, index: usize, action: PatchAction) {
    trace!("DiffEngine: {} at index {}", action, index);
    patches.push(Patch::new(index, action));
}

pub(crate) fn diff_help(x: &VNode, y: &VNode, patches: &mut Vec<Patch>, index: usize) {
    if Rc::ptr_eq(x, y) {
        return;
    }

    match (&**x, &**y) {
        (Node::Memo(x_memo), Node::Memo(y_memo)) => {
            if x_memo.same_refs(y_memo) {
                if let Some(result) = x_memo.cached() {
                    y_memo.inherit(result);
                }
                return;
            }
            let x_sub = x_memo.force().clone();
            let y_sub = y_memo.force().clone();
            let mut sub_patches = Vec::new();
            diff_help(&x_sub, &y_sub, &mut sub_patches, 0);
            if !sub_patches.is_empty() {
                push_patch(patches, index, PatchAction::RecurseIntoMemo(sub_patches));
            }
        }

        (Node::Tagged(x_tagged), Node::Tagged(y_tagged)) => {
            let (x_taggers, x_sub) = x_tagged.collapse();
            let (y_taggers, y_sub) = y_tagged.collapse();
            if x_taggers.len() != y_taggers.len() {
                push_patch(patches, index, PatchAction::Redraw(y.clone()));
                return;
            }
            if !x_taggers.iter().zip(&y_taggers).all(|(a, b)| Rc::ptr_eq(a, b)) {
                push_patch(patches, index, PatchAction::RetagMapper(y_taggers));
            }
            // a collapsed chain occupies a single index
            diff_help(x_sub, y_sub, patches, index + 1);
        }

        (Node::Text(x_text), Node::Text(y_text)) => {
            if x_text != y_text {
                push_patch(patches, index, PatchAction::ReplaceText(y_text.clone()));
            }
        }

        (Node::Element(x_el), Node::Element(y_el)) => diff_elements(x_el, y_el, y, patches, index),
        (Node::Element(x_el), Node::Keyed(y_keyed)) => diff_elements(x_el, &y_keyed.dekey(), y, patches, index),
        (Node::Keyed(x_keyed), Node::Element(y_el)) => diff_elements(&x_keyed.dekey(), y_el, y, patches, index),

        (Node::Keyed(x_keyed), Node::Keyed(y_keyed)) => {
            if x_keyed.tag != y_keyed.tag || x_keyed.namespace != y_keyed.namespace {
                push_patch(patches, index, PatchAction::Redraw(y.clone()));
                return;
            }
            if let Some(facts) = diff_facts(&x_keyed.facts, &y_keyed.facts) {
                push_patch(patches, index, PatchAction::UpdateFacts(facts));
            }
            diff_keyed_children(x_keyed, y_keyed, patches, index);
        }

        (Node::Custom(x_custom), Node::Custom(y_custom)) => {
            if !Rc::ptr_eq(&x_custom.render, &y_custom.render) {
                push_patch(patches, index, PatchAction::Redraw(y.clone()));
                return;
            }
            if let Some(facts) = diff_facts(&x_custom.facts, &y_custom.facts) {
                push_patch(patches, index, PatchAction::UpdateFacts(facts));
            }
            if let Some(custom_patch) = (y_custom.diff)(&*x_custom.state, &*y_custom.state) {
                push_patch(patches, index, PatchAction::RunCustomPatch(custom_patch));
            }
        }

        _ => {
            trace!("DiffEngine: kind change {} -> {}", x.kind_name(), y.kind_name());
            push_patch(patches, index, PatchAction::Redraw(y.clone()));
        }
    }
}

fn diff_elements(x: &Element, y: &Element, y_node: &VNode, patches: &mut Vec<Patch>, index: usize) {
    if x.tag != y.tag || x.namespace != y.namespace {
        push_patch(patches, index, PatchAction::Redraw(y_node.clone()));
        return;
    }
    if let Some(facts) = diff_facts(&x.facts, &y.facts) {
        push_patch(patches, index, PatchAction::UpdateFacts(facts));
    }
    diff_children(x, y, patches, index);
}

/// Positional children diff. Length changes are emitted first, at the parent
/// index, so the patch list stays sorted.
fn diff_children(x: &Element, y: &Element, patches: &mut Vec<Patch>, mut index: usize) {
    let x_len = x.children.len();
    let y_len = y.children.len();

    if x_len > y_len {
        push_patch(patches, index, PatchAction::RemoveTrailingChildren { from: y_len, count: x_len - y_len });
    } else if x_len < y_len {
        push_patch(patches, index, PatchAction::AppendChildren { from: x_len, nodes: y.children[x_len..].to_vec() });
    }

    for (x_kid, y_kid) in x.children.iter().zip(&y.children) {
        index += 1;
        diff_help(x_kid, y_kid, patches, index);
        index += x_kid.descendants();
    }
}
