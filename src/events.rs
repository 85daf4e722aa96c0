//! Event decoding and message routing through tagger chains.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Application message. The engine moves these around but never looks inside.
pub type Message = Value;

/// Transforms a child message into its parent's message.
pub type Mapper = Rc<dyn Fn(Message) -> Message>;

/// Receives `(message, is_synchronous_hint)` at the root of every route.
pub type Dispatcher = Rc<dyn Fn(Message, bool)>;

/// Shared, mutable tagger record. Listeners keep a clone of the route they
/// were created under, so retagging one record retargets all of them.
pub type EventRoute = Rc<RefCell<EventNode>>;

pub enum EventNode {
    Root(Dispatcher),
    Tagger { taggers: Vec<Mapper>, parent: EventRoute },
}

impl fmt::Debug for EventNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventNode::Root(_) => write!(f, "EventNode::Root(<dispatcher>)"),
            EventNode::Tagger { taggers, .. } => f
                .debug_struct("EventNode::Tagger")
                .field("taggers", &taggers.len())
                .finish_non_exhaustive(),
        }
    }
}

pub fn root_route(dispatcher: Dispatcher) -> EventRoute {
    Rc::new(RefCell::new(EventNode::Root(dispatcher)))
}

pub fn tagger_route(taggers: Vec<Mapper>, parent: EventRoute) -> EventRoute {
    Rc::new(RefCell::new(EventNode::Tagger { taggers, parent }))
}

/// Walk `route` up to its root, applying mappers innermost first, then hand the
/// message to the dispatcher.
pub fn send_message(route: &EventRoute, mut message: Message, is_sync: bool) {
    let mut current = route.clone();
    let dispatcher = loop {
        let next = match &*current.borrow() {
            EventNode::Tagger { taggers, parent } => {
                for tagger in taggers.iter().rev() {
                    message = tagger(message);
                }
                parent.clone()
            }
            EventNode::Root(dispatcher) => break dispatcher.clone(),
        };
        current = next;
    };
    // no record is borrowed while user code runs
    dispatcher(message, is_sync);
}

/// Structural JSON decoder. Two decoders are equal when they would decode
/// identically, which is what lets the fact differ skip unchanged handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decoder", content = "args", rename_all = "snake_case")]
pub enum Decoder {
    Succeed(Value),
    Value,
    Field(String, Box<Decoder>),
    At(Vec<String>, Box<Decoder>),
    Tuple(Vec<Decoder>),
    Object(Vec<(String, Decoder)>),
    OneOf(Vec<Decoder>),
}

impl Decoder {
    pub fn decode(&self, value: &Value) -> Option<Value> {
        match self {
            Decoder::Succeed(v) => Some(v.clone()),
            Decoder::Value => Some(value.clone()),
            Decoder::Field(name, inner) => inner.decode(value.get(name.as_str())?),
            Decoder::At(path, inner) => {
                let mut current = value;
                for segment in path {
                    current = current.get(segment.as_str())?;
                }
                inner.decode(current)
            }
            Decoder::Tuple(items) => items
                .iter()
                .map(|d| d.decode(value))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Decoder::Object(fields) => fields
                .iter()
                .map(|(k, d)| d.decode(value).map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
            Decoder::OneOf(options) => options.iter().find_map(|d| d.decode(value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlerKind {
    Normal,
    MayStopPropagation,
    MayPreventDefault,
    Custom,
}

/// An event handler fact.
///
/// - `Normal` decodes straight to a message.
/// - `MayStopPropagation` / `MayPreventDefault` decode to `[message, bool]`.
/// - `Custom` decodes to `{"message", "stopPropagation", "preventDefault"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Handler {
    Normal(Decoder),
    MayStopPropagation(Decoder),
    MayPreventDefault(Decoder),
    Custom(Decoder),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub handled: bool,
    pub stop_propagation: bool,
    pub prevent_default: bool,
}

impl Handler {
    pub fn kind(&self) -> HandlerKind {
        match self {
            Handler::Normal(_) => HandlerKind::Normal,
            Handler::MayStopPropagation(_) => HandlerKind::MayStopPropagation,
            Handler::MayPreventDefault(_) => HandlerKind::MayPreventDefault,
            Handler::Custom(_) => HandlerKind::Custom,
        }
    }

    /// Decode `event` into a message plus propagation flags. `None` means the
    /// decoder rejected the event and nothing is dispatched.
    pub fn run(&self, event: &Value) -> Option<(Message, EventOutcome)> {
        let flagged = |decoded: Value| -> Option<(Message, bool)> {
            match decoded {
                Value::Array(mut pair) if pair.len() == 2 => {
                    let flag = pair.pop()?.as_bool()?;
                    Some((pair.pop()?, flag))
                }
                _ => None,
            }
        };
        match self {
            Handler::Normal(d) => Some((d.decode(event)?, EventOutcome { handled: true, ..Default::default() })),
            Handler::MayStopPropagation(d) => {
                let (message, stop) = flagged(d.decode(event)?)?;
                Some((message, EventOutcome { handled: true, stop_propagation: stop, prevent_default: false }))
            }
            Handler::MayPreventDefault(d) => {
                let (message, prevent) = flagged(d.decode(event)?)?;
                Some((message, EventOutcome { handled: true, stop_propagation: false, prevent_default: prevent }))
            }
            Handler::Custom(d) => {
                let mut decoded = d.decode(event)?;
                let record = decoded.as_object_mut()?;
                let stop = record.get("stopPropagation").and_then(Value::as_bool).unwrap_or(false);
                let prevent = record.get("preventDefault").and_then(Value::as_bool).unwrap_or(false);
                let message = record.remove("message")?;
                Some((message, EventOutcome { handled: true, stop_propagation: stop, prevent_default: prevent }))
            }
        }
    }
}
