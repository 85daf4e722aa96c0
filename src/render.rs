//! Building live nodes from snapshot nodes, and applying fact changes to them.
use crate::errors::ReconcilerError;
use crate::events::{tagger_route, EventRoute};
use crate::facts::FactsDiff;
use crate::live::{LiveDom, LiveId};
use crate::node::{Node, VNode};
use log::trace;

/// Create the live subtree for `vnode`. The result is detached; listeners
/// inside it deliver through `route`.
pub fn render_node(dom: &mut LiveDom, vnode: &VNode, route: &EventRoute) -> Result<LiveId, ReconcilerError> {
    match &**vnode {
        Node::Text(text) => Ok(dom.create_text(text)),

        Node::Memo(memo) => render_node(dom, memo.force(), route),

        Node::Tagged(tagged) => {
            let (taggers, sub) = tagged.collapse();
            let sub_route = tagger_route(taggers, route.clone());
            let id = render_node(dom, sub, &sub_route)?;
            dom.set_event_ref(id, Some(sub_route))?;
            Ok(id)
        }

        Node::Custom(custom) => {
            let id = (custom.render)(&*custom.state, dom);
            apply_facts(dom, id, route, &FactsDiff::from(&custom.facts))?;
            Ok(id)
        }

        Node::Element(element) => {
            let id = dom.create_element(&element.tag, element.namespace.as_deref());
            apply_facts(dom, id, route, &FactsDiff::from(&element.facts))?;
            for kid in &element.children {
                let child = render_node(dom, kid, route)?;
                dom.append_child(id, child)?;
            }
            Ok(id)
        }

        Node::Keyed(keyed) => {
            let id = dom.create_element(&keyed.tag, keyed.namespace.as_deref());
            apply_facts(dom, id, route, &FactsDiff::from(&keyed.facts))?;
            for (_, kid) in &keyed.children {
                let child = render_node(dom, kid, route)?;
                dom.append_child(id, child)?;
            }
            Ok(id)
        }
    }
}

/// Apply a fact diff to a live node.
///
/// A listener whose handler keeps its kind is rebound in place: the host
/// listener survives and only the decoder changes. New listeners deliver
/// through `route`.
pub fn apply_facts(dom: &mut LiveDom, id: LiveId, route: &EventRoute, facts: &FactsDiff) -> Result<(), ReconcilerError> {
    for (key, value) in &facts.styles {
        dom.set_style(id, key, value.as_deref())?;
    }

    for (name, handler) in &facts.events {
        match handler {
            None => dom.remove_listener(id, name)?,
            Some(handler) if dom.listener_kind(id, name) == Some(handler.kind()) => {
                trace!("apply_facts: rebinding '{}' on {}", name, id);
                dom.rebind_listener(id, name, handler.clone())?;
            }
            Some(handler) => {
                dom.remove_listener(id, name)?;
                dom.add_listener(id, name, handler.clone(), route.clone())?;
            }
        }
    }

    for (key, value) in &facts.attrs {
        dom.set_attribute(id, key, value.as_deref())?;
    }

    for (key, change) in &facts.attrs_ns {
        dom.set_attribute_ns(id, &change.namespace, key, change.value.as_deref())?;
    }

    for (key, value) in &facts.props {
        dom.set_property(id, key, value.clone())?;
    }

    Ok(())
}
