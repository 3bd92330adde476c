//! Assembled values
//!
//! Matched subtrees are built into these types as the stream is read. An
//! element that ends up with no attributes, no children and no preserved
//! node list is stored in its parent as plain text.

use indexmap::IndexMap;

/// A finished element as stored in its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Element(Element),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            Value::Element(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Value::Element(element) => Some(element),
            Value::Text(_) => None,
        }
    }

    /// Text content, whichever shape the value took
    pub fn text(&self) -> &str {
        match self {
            Value::Text(text) => text,
            Value::Element(element) => &element.text,
        }
    }
}

/// A keyed child slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// Last element seen under this name
    One(Value),
    /// Every element seen under this name, in document order (collected)
    Many(Vec<Value>),
}

impl Child {
    /// Values in the slot, in document order
    pub fn values(&self) -> &[Value] {
        match self {
            Child::One(value) => std::slice::from_ref(value),
            Child::Many(values) => values,
        }
    }
}

/// One entry of a preserved element's ordered content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// Element under construction, or as received by listeners
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Attributes in document order
    pub attrs: IndexMap<String, String>,
    /// Child elements keyed by name, in first-seen order
    pub children: IndexMap<String, Child>,
    /// Normalized text content
    pub text: String,
    /// Document-ordered content; present only inside preserved subtrees
    pub nodes: Option<Vec<Node>>,
}

impl Element {
    pub fn new(name: impl Into<String>, attrs: IndexMap<String, String>) -> Self {
        Element {
            name: name.into(),
            attrs,
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&Child> {
        self.children.get(name)
    }

    /// Last value stored under `name`
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.children.get(name).and_then(|child| child.values().last())
    }

    /// Whether this element collapses to plain text in its parent
    pub fn is_scalar(&self) -> bool {
        self.attrs.is_empty() && self.children.is_empty() && self.nodes.is_none()
    }

    /// Final value to store in the parent
    pub fn into_value(self) -> Value {
        if self.is_scalar() {
            Value::Text(self.text)
        } else {
            Value::Element(self)
        }
    }

    /// Reserve the slot for a child that just opened. A collected child is
    /// appended to the list under its name; any other child takes over the
    /// keyed slot.
    pub(crate) fn open_child(&mut self, name: &str, collect: bool) {
        let placeholder = Value::Text(String::new());
        if !collect {
            self.children.insert(name.to_string(), Child::One(placeholder));
            return;
        }
        match self.children.get_mut(name) {
            Some(Child::Many(values)) => values.push(placeholder),
            Some(slot) => {
                if let Child::One(previous) = slot {
                    let previous = std::mem::replace(previous, Value::Text(String::new()));
                    *slot = Child::Many(vec![previous, placeholder]);
                }
            }
            None => {
                self.children
                    .insert(name.to_string(), Child::Many(vec![placeholder]));
            }
        }
    }

    /// Store the finished value of the child opened last under `name`
    pub(crate) fn close_child(&mut self, name: &str, collect: bool, value: Value) {
        match self.children.get_mut(name) {
            Some(Child::Many(values)) if collect => match values.last_mut() {
                Some(last) => *last = value,
                None => values.push(value),
            },
            _ => {
                self.children.insert(name.to_string(), Child::One(value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_scalar_collapse() {
        let mut element = Element::new("a", IndexMap::new());
        element.text.push_str("hello");
        assert_eq!(element.into_value(), text("hello"));

        let mut attrs = IndexMap::new();
        attrs.insert("id".to_string(), "1".to_string());
        let element = Element::new("a", attrs);
        assert!(matches!(element.into_value(), Value::Element(_)));
    }

    #[test]
    fn test_preserved_element_never_collapses() {
        let mut element = Element::new("p", IndexMap::new());
        element.nodes = Some(Vec::new());
        assert!(!element.is_scalar());
    }

    #[test]
    fn test_collected_children_keep_order() {
        let mut parent = Element::new("r", IndexMap::new());
        for value in ["1", "2", "3"] {
            parent.open_child("a", true);
            parent.close_child("a", true, text(value));
        }
        assert_eq!(
            parent.child("a"),
            Some(&Child::Many(vec![text("1"), text("2"), text("3")]))
        );
    }

    #[test]
    fn test_uncollected_child_keeps_last() {
        let mut parent = Element::new("r", IndexMap::new());
        for value in ["1", "2"] {
            parent.open_child("a", false);
            parent.close_child("a", false, text(value));
        }
        assert_eq!(parent.child("a"), Some(&Child::One(text("2"))));
        assert_eq!(parent.get("a").map(Value::text), Some("2"));
    }

    #[test]
    fn test_collect_after_single_child() {
        let mut parent = Element::new("r", IndexMap::new());
        parent.open_child("a", false);
        parent.close_child("a", false, text("1"));
        parent.open_child("a", true);
        parent.close_child("a", true, text("2"));
        assert_eq!(parent.child("a").map(Child::values), Some(&[text("1"), text("2")][..]));
    }
}
