//! The live tree: a mutable, host-agnostic document that patches are applied to.
//!
//! Nodes live in an id-addressed arena. Every structural or fact mutation can
//! optionally be journaled so a real host (a browser bridge, a terminal
//! renderer) can replay exactly what the engine did.
use crate::errors::ReconcilerError;
use crate::events::{send_message, root_route, Dispatcher, EventOutcome, EventRoute, Handler, HandlerKind};
use crate::facts::NsValue;
use indexmap::IndexMap;
use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiveId(u64);

impl fmt::Display for LiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "live_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveKind {
    Text(String),
    Element { tag: String, namespace: Option<String> },
}

struct Listener {
    handler: Handler,
    route: EventRoute,
}

pub struct LiveNode {
    pub kind: LiveKind,
    parent: Option<LiveId>,
    children: Vec<LiveId>,
    pub styles: IndexMap<String, String>,
    pub attrs: IndexMap<String, String>,
    pub attrs_ns: IndexMap<String, NsValue>,
    pub props: IndexMap<String, Value>,
    listeners: IndexMap<String, Listener>,
    event_ref: Option<EventRoute>,
}

impl LiveNode {
    fn new(kind: LiveKind) -> Self {
        LiveNode {
            kind,
            parent: None,
            children: Vec::new(),
            styles: IndexMap::new(),
            attrs: IndexMap::new(),
            attrs_ns: IndexMap::new(),
            props: IndexMap::new(),
            listeners: IndexMap::new(),
            event_ref: None,
        }
    }

    pub fn children(&self) -> &[LiveId] {
        &self.children
    }
}

/// One host-visible mutation, in the order the engine performed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreateElement { id: LiveId, tag: String, namespace: Option<String> },
    CreateText { id: LiveId, text: String },
    SetText { id: LiveId, text: String },
    SetStyle { id: LiveId, key: String, value: Option<String> },
    SetAttribute { id: LiveId, key: String, value: Option<String> },
    SetAttributeNs { id: LiveId, namespace: String, key: String, value: Option<String> },
    SetProperty { id: LiveId, key: String, value: Value },
    AddListener { id: LiveId, event: String, kind: HandlerKind },
    RemoveListener { id: LiveId, event: String },
    InsertBefore { parent: LiveId, child: LiveId, before: Option<LiveId> },
    RemoveChild { parent: LiveId, child: LiveId },
    ReplaceChild { parent: LiveId, old: LiveId, new: LiveId },
    Destroy { id: LiveId },
}

/// Owned, comparable description of a live subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LiveShape {
    Text {
        text: String,
    },
    Element {
        tag: String,
        namespace: Option<String>,
        styles: BTreeMap<String, String>,
        attrs: BTreeMap<String, String>,
        attrs_ns: BTreeMap<String, (String, String)>,
        props: BTreeMap<String, Value>,
        listeners: BTreeMap<String, Handler>,
        children: Vec<LiveShape>,
    },
}

pub struct LiveDom {
    nodes: HashMap<LiveId, LiveNode>,
    next_id: u64,
    root_route: EventRoute,
    journal: Option<Vec<Mutation>>,
}

impl fmt::Debug for LiveDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveDom")
            .field("nodes", &self.nodes.len())
            .field("journaling", &self.journal.is_some())
            .finish_non_exhaustive()
    }
}

impl LiveDom {
    pub fn new(dispatcher: Dispatcher) -> Self {
        LiveDom { nodes: HashMap::new(), next_id: 0, root_route: root_route(dispatcher), journal: None }
    }

    /// A document that records every mutation for [`LiveDom::take_mutations`].
    pub fn with_journal(dispatcher: Dispatcher) -> Self {
        let mut dom = LiveDom::new(dispatcher);
        dom.journal = Some(Vec::new());
        dom
    }

    pub fn root_route(&self) -> &EventRoute {
        &self.root_route
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn record(&mut self, mutation: Mutation) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(mutation);
        }
    }

    fn alloc(&mut self, kind: LiveKind) -> LiveId {
        let id = LiveId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, LiveNode::new(kind));
        id
    }

    /// Number of nodes currently alive, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: LiveId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: LiveId) -> Result<&LiveNode, ReconcilerError> {
        self.nodes.get(&id).ok_or(ReconcilerError::MissingLiveNode(id))
    }

    fn node_mut(&mut self, id: LiveId) -> Result<&mut LiveNode, ReconcilerError> {
        self.nodes.get_mut(&id).ok_or(ReconcilerError::MissingLiveNode(id))
    }

    pub fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> LiveId {
        let id = self.alloc(LiveKind::Element { tag: tag.to_string(), namespace: namespace.map(str::to_string) });
        self.record(Mutation::CreateElement { id, tag: tag.to_string(), namespace: namespace.map(str::to_string) });
        id
    }

    pub fn create_text(&mut self, text: &str) -> LiveId {
        let id = self.alloc(LiveKind::Text(text.to_string()));
        self.record(Mutation::CreateText { id, text: text.to_string() });
        id
    }

    pub fn text(&self, id: LiveId) -> Option<&str> {
        match &self.nodes.get(&id)?.kind {
            LiveKind::Text(text) => Some(text),
            LiveKind::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, id: LiveId, text: &str) -> Result<(), ReconcilerError> {
        let node = self.node_mut(id)?;
        match &mut node.kind {
            LiveKind::Text(content) => {
                content.clear();
                content.push_str(text);
            }
            // setting text content on an element replaces its children
            LiveKind::Element { .. } => {
                let children = std::mem::take(&mut node.children);
                for child in children {
                    self.node_mut(child)?.parent = None;
                    self.destroy(child)?;
                }
                let text_node = self.create_text(text);
                return self.insert_before(id, text_node, None);
            }
        }
        self.record(Mutation::SetText { id, text: text.to_string() });
        Ok(())
    }

    pub fn set_style(&mut self, id: LiveId, key: &str, value: Option<&str>) -> Result<(), ReconcilerError> {
        let node = self.node_mut(id)?;
        match value {
            Some(v) => {
                node.styles.insert(key.to_string(), v.to_string());
            }
            None => {
                node.styles.shift_remove(key);
            }
        }
        self.record(Mutation::SetStyle { id, key: key.to_string(), value: value.map(str::to_string) });
        Ok(())
    }

    pub fn set_attribute(&mut self, id: LiveId, key: &str, value: Option<&str>) -> Result<(), ReconcilerError> {
        let node = self.node_mut(id)?;
        match value {
            Some(v) => {
                node.attrs.insert(key.to_string(), v.to_string());
            }
            None => {
                node.attrs.shift_remove(key);
            }
        }
        self.record(Mutation::SetAttribute { id, key: key.to_string(), value: value.map(str::to_string) });
        Ok(())
    }

    pub fn set_attribute_ns(
        &mut self,
        id: LiveId,
        namespace: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), ReconcilerError> {
        let node = self.node_mut(id)?;
        match value {
            Some(v) => {
                node.attrs_ns.insert(key.to_string(), NsValue { namespace: namespace.to_string(), value: v.to_string() });
            }
            None => {
                node.attrs_ns.shift_remove(key);
            }
        }
        self.record(Mutation::SetAttributeNs {
            id,
            namespace: namespace.to_string(),
            key: key.to_string(),
            value: value.map(str::to_string),
        });
        Ok(())
    }

    pub fn set_property(&mut self, id: LiveId, key: &str, value: Value) -> Result<(), ReconcilerError> {
        let node = self.node_mut(id)?;
        node.props.insert(key.to_string(), value.clone());
        self.record(Mutation::SetProperty { id, key: key.to_string(), value });
        Ok(())
    }

    pub fn listener_kind(&self, id: LiveId, event: &str) -> Option<HandlerKind> {
        self.nodes.get(&id)?.listeners.get(event).map(|l| l.handler.kind())
    }

    pub fn add_listener(&mut self, id: LiveId, event: &str, handler: Handler, route: EventRoute) -> Result<(), ReconcilerError> {
        let kind = handler.kind();
        let node = self.node_mut(id)?;
        node.listeners.insert(event.to_string(), Listener { handler, route });
        self.record(Mutation::AddListener { id, event: event.to_string(), kind });
        Ok(())
    }

    pub fn remove_listener(&mut self, id: LiveId, event: &str) -> Result<(), ReconcilerError> {
        let node = self.node_mut(id)?;
        if node.listeners.shift_remove(event).is_some() {
            self.record(Mutation::RemoveListener { id, event: event.to_string() });
        }
        Ok(())
    }

    /// Swap the handler of an existing listener in place. The host never sees
    /// this, so it is not journaled.
    pub fn rebind_listener(&mut self, id: LiveId, event: &str, handler: Handler) -> Result<bool, ReconcilerError> {
        let node = self.node_mut(id)?;
        match node.listeners.get_mut(event) {
            Some(listener) => {
                listener.handler = handler;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn parent(&self, id: LiveId) -> Option<LiveId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: LiveId) -> Result<&[LiveId], ReconcilerError> {
        Ok(&self.node(id)?.children)
    }

    pub fn event_ref(&self, id: LiveId) -> Option<EventRoute> {
        self.nodes.get(&id).and_then(|n| n.event_ref.clone())
    }

    pub fn set_event_ref(&mut self, id: LiveId, route: Option<EventRoute>) -> Result<(), ReconcilerError> {
        self.node_mut(id)?.event_ref = route;
        Ok(())
    }

    /// Insert `child` before `before` (or at the end). A child that is already
    /// attached somewhere is moved.
    pub fn insert_before(&mut self, parent: LiveId, child: LiveId, before: Option<LiveId>) -> Result<(), ReconcilerError> {
        self.node(child)?;
        self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let position = match before {
            Some(anchor) => siblings
                .iter()
                .position(|&c| c == anchor)
                .ok_or(ReconcilerError::NotAChild { parent, child: anchor })?,
            None => siblings.len(),
        };
        siblings.insert(position, child);
        self.node_mut(child)?.parent = Some(parent);
        self.record(Mutation::InsertBefore { parent, child, before });
        Ok(())
    }

    pub fn append_child(&mut self, parent: LiveId, child: LiveId) -> Result<(), ReconcilerError> {
        self.insert_before(parent, child, None)
    }

    pub fn remove_child(&mut self, parent: LiveId, child: LiveId) -> Result<(), ReconcilerError> {
        let siblings = &mut self.node_mut(parent)?.children;
        let position = siblings
            .iter()
            .position(|&c| c == child)
            .ok_or(ReconcilerError::NotAChild { parent, child })?;
        siblings.remove(position);
        self.node_mut(child)?.parent = None;
        self.record(Mutation::RemoveChild { parent, child });
        Ok(())
    }

    /// Remove `child` from its parent, if it has one. The node stays alive.
    pub fn detach(&mut self, child: LiveId) -> Result<(), ReconcilerError> {
        match self.node(child)?.parent {
            Some(parent) => self.remove_child(parent, child),
            None => Ok(()),
        }
    }

    pub fn replace_child(&mut self, parent: LiveId, old: LiveId, new: LiveId) -> Result<(), ReconcilerError> {
        self.node(new)?;
        self.detach(new)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let position = siblings
            .iter()
            .position(|&c| c == old)
            .ok_or(ReconcilerError::NotAChild { parent, child: old })?;
        siblings[position] = new;
        self.node_mut(old)?.parent = None;
        self.node_mut(new)?.parent = Some(parent);
        self.record(Mutation::ReplaceChild { parent, old, new });
        Ok(())
    }

    /// Detach `id` and drop it together with all of its descendants.
    pub fn destroy(&mut self, id: LiveId) -> Result<(), ReconcilerError> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children);
            }
        }
        self.record(Mutation::Destroy { id });
        Ok(())
    }

    /// Fire `event` at `target` and bubble it towards the root. Each matching
    /// listener decodes the payload, routes the message through its tagger
    /// chain and hands it to the dispatcher.
    pub fn dispatch_event(&self, target: LiveId, event: &str, payload: &Value) -> Result<EventOutcome, ReconcilerError> {
        let mut outcome = EventOutcome::default();
        let mut current = Some(target);
        while let Some(id) = current {
            let node = self.node(id)?;
            if let Some(listener) = node.listeners.get(event) {
                if let Some((message, result)) = listener.handler.run(payload) {
                    trace!("dispatch_event: '{}' on {} handled", event, id);
                    send_message(&listener.route, message, result.stop_propagation);
                    outcome.handled = true;
                    outcome.prevent_default |= result.prevent_default;
                    if result.stop_propagation {
                        outcome.stop_propagation = true;
                        break;
                    }
                }
            }
            current = node.parent;
        }
        Ok(outcome)
    }

    pub fn shape(&self, id: LiveId) -> Result<LiveShape, ReconcilerError> {
        let node = self.node(id)?;
        Ok(match &node.kind {
            LiveKind::Text(text) => LiveShape::Text { text: text.clone() },
            LiveKind::Element { tag, namespace } => LiveShape::Element {
                tag: tag.clone(),
                namespace: namespace.clone(),
                styles: node.styles.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                attrs: node.attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                attrs_ns: node
                    .attrs_ns
                    .iter()
                    .map(|(k, ns)| (k.clone(), (ns.namespace.clone(), ns.value.clone())))
                    .collect(),
                props: node.props.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                listeners: node.listeners.iter().map(|(k, l)| (k.clone(), l.handler.clone())).collect(),
                children: node.children.iter().map(|&c| self.shape(c)).collect::<Result<_, _>>()?,
            },
        })
    }
}
