use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::component::ComponentDef;
use crate::dom::Event;
use crate::suspense::LazyComponent;
use crate::template::TemplateDescription;
use crate::NodeId;

/// A dynamic value supplied to a template hole.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Template(TemplateDescription),
    List(Rc<[Value]>),
    /// Ordered key/value map, rendered as inline style when bound to an attribute.
    Object(Rc<IndexMap<String, Value>>),
    Callback(Callback),
    Ref(NodeRef),
    Component(ComponentDef),
    Lazy(LazyComponent),
    Children(CapturedChildren),
}

impl Value {
    pub fn str(text: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(text.as_ref()))
    }

    pub fn object<K: Into<String>, V: Into<Value>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Value::Object(Rc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// `Null` and `false` clear whatever a binding currently shows.
    pub fn is_nothing(&self) -> bool {
        matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    /// Identity check used by the reconciler fast path.
    ///
    /// Primitives compare by value, shared variants by pointer.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Template(a), Value::Template(b)) => a.same(b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Callback(a), Value::Callback(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            (Value::Component(a), Value::Component(b)) => a.ptr_eq(b),
            (Value::Lazy(a), Value::Lazy(b)) => a.ptr_eq(b),
            (Value::Children(a), Value::Children(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// String form of a primitive, `None` for anything else.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.to_string()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Template(_) => "template",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Callback(_) => "callback",
            Value::Ref(_) => "ref",
            Value::Component(_) => "component",
            Value::Lazy(_) => "lazy component",
            Value::Children(_) => "captured children",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Template(t) => write!(f, "Template({t:?})"),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(map) => f.debug_tuple("Object").field(map).finish(),
            Value::Component(def) => write!(f, "Component({})", def.tag()),
            other => write!(f, "{}", other.kind_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! int_value {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::Int(value as i64)
            }
        })*
    };
}

int_value!(i8, i16, i32, i64, isize, u8, u16, u32);

/// Integers wider than `i64` keep their exact digits as text when they do not fit.
macro_rules! wide_int_value {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                match i64::try_from(value) {
                    Ok(value) => Value::Int(value),
                    Err(_) => Value::str(value.to_string()),
                }
            }
        })*
    };
}

wide_int_value!(u64, usize, i128, u128);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Str(Rc::from(value.as_str()))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::Str(value)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl From<TemplateDescription> for Value {
    fn from(value: TemplateDescription) -> Self {
        Value::Template(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<Rc<[Value]>> for Value {
    fn from(value: Rc<[Value]>) -> Self {
        Value::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<Callback> for Value {
    fn from(value: Callback) -> Self {
        Value::Callback(value)
    }
}

impl From<NodeRef> for Value {
    fn from(value: NodeRef) -> Self {
        Value::Ref(value)
    }
}

impl From<ComponentDef> for Value {
    fn from(value: ComponentDef) -> Self {
        Value::Component(value)
    }
}

impl From<LazyComponent> for Value {
    fn from(value: LazyComponent) -> Self {
        Value::Lazy(value)
    }
}

impl From<CapturedChildren> for Value {
    fn from(value: CapturedChildren) -> Self {
        Value::Children(value)
    }
}

/// Shared event handler.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&Event)>);

impl Callback {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Mutable handle to a host node, filled by `ref` attribute bindings.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<Cell<Option<NodeId>>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<NodeId> {
        self.0.get()
    }

    pub fn set(&self, node: Option<NodeId>) {
        self.0.set(node);
    }

    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.get()).finish()
    }
}

/// The authored children of a component host, detached at first connection.
///
/// The nodes are moved, never cloned, wherever the value is rendered.
#[derive(Clone, Debug)]
pub struct CapturedChildren(Rc<[NodeId]>);

impl CapturedChildren {
    pub(crate) fn new(nodes: Vec<NodeId>) -> Self {
        Self(nodes.into())
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ptr_eq(&self, other: &CapturedChildren) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
