//! Attaches live-node targets to index-addressed patches.
//!
//! A single walk over the old snapshot and the live tree in lockstep. Subtrees
//! whose index range `[low, high]` contains no pending patch are skipped
//! without being visited, so the cost tracks the number of patches rather
//! than the size of the tree.
use crate::errors::ReconcilerError;
use crate::events::EventRoute;
use crate::live::{LiveDom, LiveId};
use crate::node::{Node, VNode};
use crate::types::{Patch, PatchAction};
use log::trace;

/// Attach a target and an event route to every patch in `patches`, which must
/// be sorted by index and refer to `old`, the snapshot rendered at `root`.
pub fn locate(dom: &LiveDom, root: LiveId, old: &VNode, patches: &mut [Patch]) -> Result<(), ReconcilerError> {
    if patches.is_empty() {
        return Ok(());
    }
    let route = dom.root_route().clone();
    locate_help(dom, root, old, patches, 0, 0, old.descendants(), &route)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn locate_help(
    dom: &LiveDom,
    live: LiveId,
    vnode: &VNode,
    patches: &mut [Patch],
    mut i: usize,
    low: usize,
    high: usize,
    route: &EventRoute,
) -> Result<usize, ReconcilerError> {
    let Some(mut index) = patches.get(i).map(|p| p.index) else {
        return Ok(i);
    };

    while index == low {
        let patch = &mut patches[i];
        trace!("Locator: {} at index {} -> {}", patch.action, index, live);
        patch.target = Some(live);
        patch.route = Some(route.clone());

        match &mut patch.action {
            PatchAction::RecurseIntoMemo(sub_patches) => {
                let Node::Memo(memo) = &**vnode else {
                    return Err(ReconcilerError::LiveTreeMismatch {
                        index,
                        details: format!("memo patch addressed to a {} node", vnode.kind_name()),
                    });
                };
                let cached = memo.force();
                locate_help(dom, live, cached, sub_patches, 0, 0, cached.descendants(), route)?;
            }
            PatchAction::DiffKeyedChildren(keyed) => {
                locate_help(dom, live, vnode, &mut keyed.patches, 0, low, high, route)?;
            }
            PatchAction::RemoveKeyed(Some(moved)) => {
                locate_help(dom, live, vnode, &mut moved.patches, 0, low, high, route)?;
            }
            _ => {}
        }

        i += 1;
        match patches.get(i) {
            Some(next) if next.index <= high => index = next.index,
            _ => return Ok(i),
        }
    }

    match &**vnode {
        Node::Tagged(tagged) => {
            let (_, sub) = tagged.collapse();
            let sub_route = dom.event_ref(live).unwrap_or_else(|| route.clone());
            locate_help(dom, live, sub, patches, i, low + 1, high, &sub_route)
        }
        Node::Element(element) => locate_children(dom, live, element.children.iter(), patches, i, index, low, high, route),
        Node::Keyed(keyed) => {
            locate_children(dom, live, keyed.children.iter().map(|(_, kid)| kid), patches, i, index, low, high, route)
        }
        Node::Text(_) | Node::Custom(_) | Node::Memo(_) => Ok(i),
    }
}

#[allow(clippy::too_many_arguments)]
fn locate_children<'a>(
    dom: &LiveDom,
    live: LiveId,
    kids: impl Iterator<Item = &'a VNode>,
    patches: &mut [Patch],
    mut i: usize,
    mut index: usize,
    mut low: usize,
    high: usize,
    route: &EventRoute,
) -> Result<usize, ReconcilerError> {
    let live_children = dom.children(live)?;
    for (j, kid) in kids.enumerate() {
        low += 1;
        let next_low = low + kid.descendants();
        if low <= index && index <= next_low {
            let child = live_children.get(j).copied().ok_or_else(|| ReconcilerError::LiveTreeMismatch {
                index: low,
                details: format!("{} has {} children, expected at least {}", live, live_children.len(), j + 1),
            })?;
            i = locate_help(dom, child, kid, patches, i, low, next_low, route)?;
            match patches.get(i) {
                Some(next) if next.index <= high => index = next.index,
                _ => return Ok(i),
            }
        }
        low = next_low;
    }
    Ok(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff_engine::diff;
    use crate::events::Message;
    use crate::node::{element, keyed, map_fn, text};
    use crate::render::render_node;
    use serde_json::json;
    use std::rc::Rc;

    fn dom() -> LiveDom {
        LiveDom::new(Rc::new(|_: Message, _: bool| {}))
    }

    fn mount(dom: &mut LiveDom, tree: &VNode) -> LiveId {
        let route = dom.root_route().clone();
        render_node(dom, tree, &route).unwrap()
    }

    #[test]
    fn targets_the_right_nested_node() {
        let mut dom = dom();
        let old = element("div", vec![], vec![element("p", vec![], vec![text("a")]), text("b")]);
        let new = element("div", vec![], vec![element("p", vec![], vec![text("a")]), text("c")]);
        let root = mount(&mut dom, &old);

        let mut patches = diff(&old, &new);
        locate(&dom, root, &old, &mut patches).unwrap();
        assert_eq!(patches[0].target(), Some(dom.children(root).unwrap()[1]));
    }

    #[test]
    fn tagged_subtrees_pick_up_their_route() {
        let mut dom = dom();
        let old = element("div", vec![], vec![map_fn(|m: Message| json!([m]), element("i", vec![], vec![text("x")]))]);
        let new = element("div", vec![], vec![map_fn(|m: Message| json!([m]), element("i", vec![], vec![text("y")]))]);
        let root = mount(&mut dom, &old);
        let tagged_live = dom.children(root).unwrap()[0];

        let mut patches = diff(&old, &new);
        locate(&dom, root, &old, &mut patches).unwrap();

        let text_patch = patches.iter().find(|p| matches!(p.action, PatchAction::ReplaceText(_))).unwrap();
        assert_eq!(text_patch.target(), Some(dom.children(tagged_live).unwrap()[0]));
        let route = text_patch.route.as_ref().unwrap();
        assert!(Rc::ptr_eq(route, &dom.event_ref(tagged_live).unwrap()));
    }

    #[test]
    fn keyed_moves_target_the_old_live_node() {
        let mut dom = dom();
        let old = keyed("ul", vec![], vec![("a".into(), text("a")), ("b".into(), text("b"))]);
        let new = keyed("ul", vec![], vec![("b".into(), text("b!")), ("a".into(), text("a"))]);
        let root = mount(&mut dom, &old);
        let b_live = dom.children(root).unwrap()[1];

        let mut patches = diff(&old, &new);
        locate(&dom, root, &old, &mut patches).unwrap();

        let PatchAction::DiffKeyedChildren(keyed) = &patches[0].action else { panic!("expected keyed patch") };
        assert_eq!(patches[0].target(), Some(root));
        let remove = &keyed.patches[0];
        assert_eq!(remove.target(), Some(b_live));
        let PatchAction::RemoveKeyed(Some(moved)) = &remove.action else { panic!("expected move") };
        assert_eq!(moved.patches[0].target(), Some(b_live));
    }

    #[test]
    fn short_live_tree_is_reported() {
        let mut dom = dom();
        let old = element("div", vec![], vec![text("a"), text("b")]);
        let new = element("div", vec![], vec![text("a"), text("c")]);
        let root = mount(&mut dom, &old);
        let second = dom.children(root).unwrap()[1];
        dom.destroy(second).unwrap();

        let mut patches = diff(&old, &new);
        let err = locate(&dom, root, &old, &mut patches).unwrap_err();
        assert!(matches!(err, ReconcilerError::LiveTreeMismatch { index: 2, .. }));
    }
}
