//! Patch applier: executes located patches against the live tree.
use crate::errors::ReconcilerError;
use crate::events::{tagger_route, EventNode, EventRoute};
use crate::live::{LiveDom, LiveId};
use crate::locator::locate;
use crate::node::VNode;
use crate::render::{apply_facts, render_node};
use crate::types::{count_patches, EntryState, KeyedChildrenPatch, Patch, PatchAction};
use log::{debug, error, trace};
use std::collections::HashMap;

/// Locate `patches` against `old` (the snapshot currently rendered at `root`)
/// and apply them. Returns the root of the live tree afterwards, which differs
/// from `root` when the root itself was redrawn.
pub fn apply_patches(dom: &mut LiveDom, root: LiveId, old: &VNode, mut patches: Vec<Patch>) -> Result<LiveId, ReconcilerError> {
    if patches.is_empty() {
        return Ok(root);
    }
    locate(dom, root, old, &mut patches)?;
    debug!("Applier: applying {} patch(es) under {}", count_patches(&patches), root);
    apply_patches_help(dom, root, &patches)
}

pub(crate) fn apply_patches_help(dom: &mut LiveDom, mut root: LiveId, patches: &[Patch]) -> Result<LiveId, ReconcilerError> {
    for patch in patches {
        let target = located(patch)?;
        let new_node = apply_patch(dom, target, patch)?;
        if target == root {
            root = new_node;
        }
    }
    Ok(root)
}

fn located(patch: &Patch) -> Result<LiveId, ReconcilerError> {
    patch.target.ok_or_else(|| {
        error!("Applier: {} at index {} has no target", patch.action, patch.index);
        ReconcilerError::UnlocatedPatch { action: patch.action.to_string(), index: patch.index }
    })
}

fn route_of(dom: &LiveDom, patch: &Patch) -> EventRoute {
    patch.route.clone().unwrap_or_else(|| dom.root_route().clone())
}

fn apply_patch(dom: &mut LiveDom, target: LiveId, patch: &Patch) -> Result<LiveId, ReconcilerError> {
    trace!("Applier: {} on {}", patch.action, target);
    match &patch.action {
        PatchAction::Redraw(vnode) => redraw(dom, target, vnode, &route_of(dom, patch)),

        PatchAction::ReplaceText(text) => {
            dom.set_text(target, text)?;
            Ok(target)
        }

        PatchAction::UpdateFacts(facts) => {
            apply_facts(dom, target, &route_of(dom, patch), facts)?;
            Ok(target)
        }

        PatchAction::RecurseIntoMemo(sub_patches) => apply_patches_help(dom, target, sub_patches),

        PatchAction::RetagMapper(taggers) => {
            // listeners hold the record itself, so mutating it retargets them all
            let retagged = match dom.event_ref(target) {
                Some(event_ref) => {
                    let mut record = event_ref.borrow_mut();
                    match &mut *record {
                        EventNode::Tagger { taggers: current, .. } => {
                            *current = taggers.clone();
                            true
                        }
                        EventNode::Root(_) => false,
                    }
                }
                None => false,
            };
            if !retagged {
                dom.set_event_ref(target, Some(tagger_route(taggers.clone(), route_of(dom, patch))))?;
            }
            Ok(target)
        }

        PatchAction::RemoveTrailingChildren { from, count } => {
            for _ in 0..*count {
                let child = dom.children(target)?.get(*from).copied().ok_or_else(|| ReconcilerError::LiveTreeMismatch {
                    index: patch.index,
                    details: format!("{} has no child at position {}", target, from),
                })?;
                dom.destroy(child)?;
            }
            Ok(target)
        }

        PatchAction::AppendChildren { from, nodes } => {
            let route = route_of(dom, patch);
            let before = dom.children(target)?.get(*from).copied();
            for node in nodes {
                let child = render_node(dom, node, &route)?;
                dom.insert_before(target, child, before)?;
            }
            Ok(target)
        }

        PatchAction::DiffKeyedChildren(keyed) => apply_keyed(dom, target, &route_of(dom, patch), keyed),

        PatchAction::RemoveKeyed(None) => {
            dom.destroy(target)?;
            Ok(target)
        }

        PatchAction::RemoveKeyed(Some(_)) => {
            error!("Applier: keyed move at index {} applied outside its parent", patch.index);
            Err(ReconcilerError::MisplacedPatch { action: patch.action.to_string(), index: patch.index })
        }

        PatchAction::RunCustomPatch(custom_patch) => Ok(custom_patch(dom, target)),
    }
}

fn redraw(dom: &mut LiveDom, target: LiveId, vnode: &VNode, route: &EventRoute) -> Result<LiveId, ReconcilerError> {
    let parent = dom.parent(target);
    let new_node = render_node(dom, vnode, route)?;
    if dom.event_ref(new_node).is_none() {
        if let Some(event_ref) = dom.event_ref(target) {
            dom.set_event_ref(new_node, Some(event_ref))?;
        }
    }
    if let Some(parent) = parent {
        dom.replace_child(parent, target, new_node)?;
    }
    dom.destroy(target)?;
    Ok(new_node)
}

/// Removals and in-place diffs first (moved nodes are detached and kept), then
/// positional inserts in ascending order, then the trailing run.
fn apply_keyed(
    dom: &mut LiveDom,
    parent: LiveId,
    route: &EventRoute,
    keyed: &KeyedChildrenPatch,
) -> Result<LiveId, ReconcilerError> {
    let mut moved_nodes: HashMap<usize, LiveId> = HashMap::new();

    for patch in &keyed.patches {
        let target = located(patch)?;
        match &patch.action {
            PatchAction::RemoveKeyed(Some(moved)) => {
                dom.detach(target)?;
                let node = apply_patches_help(dom, target, &moved.patches)?;
                moved_nodes.insert(moved.entry, node);
            }
            _ => {
                apply_patch(dom, target, patch)?;
            }
        }
    }

    for insert in &keyed.inserts {
        let node = placed_node(dom, keyed, insert.entry, &moved_nodes, route)?;
        let before = dom.children(parent)?.get(insert.index).copied();
        dom.insert_before(parent, node, before)?;
    }

    for &entry in &keyed.end_inserts {
        let node = placed_node(dom, keyed, entry, &moved_nodes, route)?;
        dom.append_child(parent, node)?;
    }

    Ok(parent)
}

fn placed_node(
    dom: &mut LiveDom,
    keyed: &KeyedChildrenPatch,
    entry_id: usize,
    moved_nodes: &HashMap<usize, LiveId>,
    route: &EventRoute,
) -> Result<LiveId, ReconcilerError> {
    let entry = keyed.entries.get(entry_id).ok_or(ReconcilerError::MissingMoveEntry(entry_id))?;
    if entry.state == EntryState::Moved {
        moved_nodes.get(&entry_id).copied().ok_or(ReconcilerError::MissingMoveEntry(entry_id))
    } else {
        render_node(dom, &entry.vnode, route)
    }
}
