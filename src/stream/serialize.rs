//! Re-serialization of assembled values
//!
//! Preserved elements replay their ordered node list. Other elements write
//! their keyed children in first-seen order, then their text. Attribute
//! values and text are escaped.

use super::value::{Child, Element, Node, Value};
use crate::core::entities::escape_into;
use indexmap::IndexMap;

/// Write an open tag with its attributes
pub fn write_start(out: &mut String, name: &str, attrs: &IndexMap<String, String>) {
    out.push('<');
    out.push_str(name);
    for (attr, value) in attrs {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        escape_into(value, out);
        out.push('"');
    }
    out.push('>');
}

pub fn write_end(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

#[inline]
pub fn write_text(out: &mut String, text: &str) {
    escape_into(text, out);
}

/// Write `value` as an element named `name`. With `close` false the close
/// tag is left for the caller.
pub fn write_value(out: &mut String, name: &str, value: &Value, close: bool) {
    match value {
        Value::Element(element) => write_element(out, name, element, close),
        Value::Text(text) => {
            write_start(out, name, &IndexMap::new());
            write_text(out, text);
            if close {
                write_end(out, name);
            }
        }
    }
}

/// Write `element` under `name` (its own name unless it was renamed)
pub fn write_element(out: &mut String, name: &str, element: &Element, close: bool) {
    write_start(out, name, &element.attrs);
    match &element.nodes {
        Some(nodes) => write_nodes(out, nodes),
        None => {
            for (child_name, child) in &element.children {
                write_child(out, child_name, child);
            }
            write_text(out, &element.text);
        }
    }
    if close {
        write_end(out, name);
    }
}

fn write_child(out: &mut String, name: &str, child: &Child) {
    for value in child.values() {
        write_value(out, name, value, true);
    }
}

fn write_nodes(out: &mut String, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Element(element) => write_element(out, &element.name, element, true),
            Node::Text(text) => write_text(out, text),
        }
    }
}

/// Serialize a complete element
pub fn to_xml(element: &Element) -> String {
    let mut out = String::with_capacity(256);
    write_element(&mut out, &element.name, element, true);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, attrs: &[(&str, &str)]) -> Element {
        Element::new(
            name,
            attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_scalar_value() {
        let mut out = String::new();
        write_value(&mut out, "a", &Value::Text("x < y".to_string()), true);
        assert_eq!(out, "<a>x &lt; y</a>");
    }

    #[test]
    fn test_keyed_children_then_text() {
        let mut item = element("item", &[("id", "1 & 2")]);
        item.children.insert(
            "tag".to_string(),
            Child::Many(vec![Value::Text("a".to_string()), Value::Text("b".to_string())]),
        );
        item.children
            .insert("title".to_string(), Child::One(Value::Text("T".to_string())));
        item.text.push_str("tail");

        assert_eq!(
            to_xml(&item),
            "<item id=\"1 &amp; 2\"><tag>a</tag><tag>b</tag><title>T</title>tail</item>"
        );
    }

    #[test]
    fn test_preserved_nodes_replay_in_order() {
        let mut b = element("b", &[]);
        b.nodes = Some(vec![Node::Text("bold".to_string())]);
        let mut p = element("p", &[("class", "x")]);
        p.nodes = Some(vec![
            Node::Text("one ".to_string()),
            Node::Element(b),
            Node::Text(" two".to_string()),
        ]);

        assert_eq!(to_xml(&p), "<p class=\"x\">one <b>bold</b> two</p>");
    }

    #[test]
    fn test_open_ended() {
        let mut out = String::new();
        let el = element("e", &[]);
        write_element(&mut out, "e", &el, false);
        assert_eq!(out, "<e>");
    }
}
