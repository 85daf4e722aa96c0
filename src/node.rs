//! Snapshot node model and the constructors view code builds trees with.
use crate::events::{Mapper, Message};
use crate::facts::{Fact, Facts};
use crate::live::{LiveDom, LiveId};
use once_cell::unsync::OnceCell;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Snapshot nodes are shared so that identity (`Rc::ptr_eq`) can short-circuit diffing.
pub type VNode = Rc<Node>;

/// Opaque argument of a memoized node, compared by identity only.
pub type MemoArg = Rc<dyn Any>;

/// State of a custom node. Callbacks downcast it to their concrete type.
pub type CustomState = dyn Any;
pub type CustomRender = Rc<dyn Fn(&CustomState, &mut LiveDom) -> LiveId>;
pub type CustomDiff = Rc<dyn Fn(&CustomState, &CustomState) -> Option<CustomPatch>>;
pub type CustomPatch = Rc<dyn Fn(&mut LiveDom, LiveId) -> LiveId>;

pub enum Node {
    Text(String),
    Element(Element),
    Keyed(KeyedElement),
    Custom(Custom),
    Tagged(Tagged),
    Memo(Memo),
}

pub struct Element {
    pub tag: String,
    pub namespace: Option<String>,
    pub facts: Facts,
    pub children: Vec<VNode>,
    descendants: usize,
}

pub struct KeyedElement {
    pub tag: String,
    pub namespace: Option<String>,
    pub facts: Facts,
    pub children: Vec<(String, VNode)>,
    descendants: usize,
}

pub struct Custom {
    pub facts: Facts,
    pub state: Rc<CustomState>,
    pub render: CustomRender,
    pub diff: CustomDiff,
}

pub struct Tagged {
    pub mapper: Mapper,
    pub child: VNode,
    descendants: usize,
}

pub struct Memo {
    pub refs: Vec<MemoArg>,
    thunk: Box<dyn Fn() -> VNode>,
    cached: OnceCell<VNode>,
}

impl Node {
    /// Number of nodes below this one in pre-order addressing.
    pub fn descendants(&self) -> usize {
        match self {
            Node::Element(e) => e.descendants,
            Node::Keyed(k) => k.descendants,
            Node::Tagged(t) => t.descendants,
            Node::Text(_) | Node::Custom(_) | Node::Memo(_) => 0,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Text(_) => "text",
            Node::Element(_) => "element",
            Node::Keyed(_) => "keyed",
            Node::Custom(_) => "custom",
            Node::Tagged(_) => "tagged",
            Node::Memo(_) => "memo",
        }
    }
}

fn count_descendants<'a>(children: impl Iterator<Item = &'a VNode>) -> usize {
    children.map(|kid| 1 + kid.descendants()).sum()
}

impl Element {
    fn new(tag: String, namespace: Option<String>, facts: Facts, children: Vec<VNode>) -> Self {
        let descendants = count_descendants(children.iter());
        Element { tag, namespace, facts, children, descendants }
    }
}

impl KeyedElement {
    fn new(tag: String, namespace: Option<String>, facts: Facts, children: Vec<(String, VNode)>) -> Self {
        let descendants = count_descendants(children.iter().map(|(_, kid)| kid));
        KeyedElement { tag, namespace, facts, children, descendants }
    }

    /// The same element with keys dropped, for diffing against an unkeyed one.
    pub fn dekey(&self) -> Element {
        Element {
            tag: self.tag.clone(),
            namespace: self.namespace.clone(),
            facts: self.facts.clone(),
            children: self.children.iter().map(|(_, kid)| kid.clone()).collect(),
            descendants: self.descendants,
        }
    }
}

impl Tagged {
    /// Mappers of this wrapper and every directly nested one, outermost first,
    /// plus the first non-tagged node below them.
    pub fn collapse(&self) -> (Vec<Mapper>, &VNode) {
        let mut taggers = vec![self.mapper.clone()];
        let mut sub = &self.child;
        while let Node::Tagged(inner) = &**sub {
            taggers.push(inner.mapper.clone());
            sub = &inner.child;
        }
        (taggers, sub)
    }
}

impl Memo {
    /// The lazily computed subtree. The thunk runs at most once per node.
    pub fn force(&self) -> &VNode {
        self.cached.get_or_init(|| (self.thunk)())
    }

    pub fn cached(&self) -> Option<&VNode> {
        self.cached.get()
    }

    /// Reuse a previously computed result. A no-op when already forced.
    pub(crate) fn inherit(&self, result: &VNode) {
        let _ = self.cached.set(result.clone());
    }

    /// Same arity and pairwise identical reference arguments.
    pub fn same_refs(&self, other: &Memo) -> bool {
        self.refs.len() == other.refs.len() && self.refs.iter().zip(&other.refs).all(|(a, b)| Rc::ptr_eq(a, b))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Element(e) => f
                .debug_struct("Element")
                .field("tag", &e.tag)
                .field("namespace", &e.namespace)
                .field("facts", &e.facts)
                .field("children", &e.children)
                .field("descendants", &e.descendants)
                .finish(),
            Node::Keyed(k) => f
                .debug_struct("Keyed")
                .field("tag", &k.tag)
                .field("namespace", &k.namespace)
                .field("facts", &k.facts)
                .field("children", &k.children)
                .field("descendants", &k.descendants)
                .finish(),
            Node::Custom(c) => f.debug_struct("Custom").field("facts", &c.facts).finish_non_exhaustive(),
            Node::Tagged(t) => f.debug_struct("Tagged").field("child", &t.child).finish_non_exhaustive(),
            Node::Memo(m) => f
                .debug_struct("Memo")
                .field("refs", &m.refs.len())
                .field("cached", &m.cached.get())
                .finish_non_exhaustive(),
        }
    }
}

// ===== Constructors =====

/// `script` elements never reach the live tree.
fn no_script(tag: &str) -> String {
    if tag.eq_ignore_ascii_case("script") { "p".to_string() } else { tag.to_string() }
}

pub fn text(content: impl Into<String>) -> VNode {
    Rc::new(Node::Text(content.into()))
}

pub fn element(tag: &str, facts: Vec<Fact>, children: Vec<VNode>) -> VNode {
    Rc::new(Node::Element(Element::new(no_script(tag), None, Facts::organize(facts), children)))
}

pub fn element_ns(namespace: &str, tag: &str, facts: Vec<Fact>, children: Vec<VNode>) -> VNode {
    Rc::new(Node::Element(Element::new(
        no_script(tag),
        Some(namespace.to_string()),
        Facts::organize(facts),
        children,
    )))
}

pub fn keyed(tag: &str, facts: Vec<Fact>, children: Vec<(String, VNode)>) -> VNode {
    Rc::new(Node::Keyed(KeyedElement::new(no_script(tag), None, Facts::organize(facts), children)))
}

pub fn keyed_ns(namespace: &str, tag: &str, facts: Vec<Fact>, children: Vec<(String, VNode)>) -> VNode {
    Rc::new(Node::Keyed(KeyedElement::new(
        no_script(tag),
        Some(namespace.to_string()),
        Facts::organize(facts),
        children,
    )))
}

/// Wrap `child` so messages from its listeners pass through `mapper`.
pub fn map(mapper: Mapper, child: VNode) -> VNode {
    let descendants = 1 + child.descendants();
    Rc::new(Node::Tagged(Tagged { mapper, child, descendants }))
}

pub fn map_fn(mapper: impl Fn(Message) -> Message + 'static, child: VNode) -> VNode {
    map(Rc::new(mapper), child)
}

/// A subtree computed on demand and skipped entirely while `refs` stay identical.
pub fn lazy(refs: Vec<MemoArg>, thunk: impl Fn() -> VNode + 'static) -> VNode {
    Rc::new(Node::Memo(Memo { refs, thunk: Box::new(thunk), cached: OnceCell::new() }))
}

pub fn custom(facts: Vec<Fact>, state: Rc<CustomState>, render: CustomRender, diff: CustomDiff) -> VNode {
    Rc::new(Node::Custom(Custom { facts: Facts::organize(facts), state, render, diff }))
}
