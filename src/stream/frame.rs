//! Open-element frames and the views listeners get over them

use super::text::TextState;
use super::value::Element;

/// Assembler record for one open element
#[derive(Debug)]
pub(crate) struct Frame {
    pub element: Element,
    /// Slash-joined path from the document, e.g. `/rss/channel`
    pub path: String,
    /// Whether this element was collected into a list in its parent
    pub collect: bool,
    /// Whether this element is visible in its descendants' context under
    /// its own name
    pub binds_self: bool,
    pub text: TextState,
    /// Whitespace flag of each preserve hook applied when this element
    /// opened; leave hooks undo only these
    pub preserved: Vec<bool>,
    /// Update subscriptions that buffered this element
    pub buffered: Vec<usize>,
}

impl Frame {
    /// Bottom frame standing for the document; the root element is stored
    /// in it
    pub fn document() -> Self {
        Frame {
            element: Element::default(),
            path: String::new(),
            collect: false,
            binds_self: false,
            text: TextState::default(),
            preserved: Vec::new(),
            buffered: Vec::new(),
        }
    }

    pub fn child_of(parent: &Frame, element: Element) -> Self {
        let path = format!("{}/{}", parent.path, element.name);
        Frame {
            element,
            path,
            collect: false,
            binds_self: false,
            text: TextState::default(),
            preserved: Vec::new(),
            buffered: Vec::new(),
        }
    }
}

/// Named bindings visible from a matched element: its open ancestors,
/// innermost first
#[derive(Clone, Copy)]
pub struct Context<'a> {
    frames: &'a [Frame],
}

impl<'a> Context<'a> {
    pub(crate) fn new(frames: &'a [Frame]) -> Self {
        Context { frames }
    }

    /// Innermost ancestor bound under `name`
    pub fn get(&self, name: &str) -> Option<&'a Element> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.binds_self && frame.element.name == name)
            .map(|frame| &frame.element)
    }

    /// Ancestor elements, innermost first
    pub fn ancestors(&self) -> impl Iterator<Item = &'a Element> + 'a {
        self.frames
            .iter()
            .rev()
            .filter(|frame| !frame.path.is_empty())
            .map(|frame| &frame.element)
    }
}

/// Path-addressed view of everything assembled so far, including the
/// document container at path `""`.
///
/// Open ancestors are found directly. Closed elements are reached through
/// the keyed children of their nearest open ancestor; a repeated name
/// resolves to its latest element.
#[derive(Clone, Copy)]
pub struct Trace<'a> {
    frames: &'a [Frame],
}

impl<'a> Trace<'a> {
    pub(crate) fn new(frames: &'a [Frame]) -> Self {
        Trace { frames }
    }

    /// Element at `path`, e.g. `/rss/channel/image`. Closed elements that
    /// were reduced to plain text are not elements; read them through
    /// their parent's children.
    pub fn get(&self, path: &str) -> Option<&'a Element> {
        for frame in self.frames.iter().rev() {
            if frame.path == path {
                return Some(&frame.element);
            }
            let Some(rest) = path
                .strip_prefix(frame.path.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
            else {
                continue;
            };
            return rest
                .split('/')
                .try_fold(&frame.element, |element, name| element.get(name)?.as_element());
        }
        None
    }

    /// Paths of the open ancestors, outermost first
    pub fn paths(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.frames.iter().map(|frame| frame.path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::value::Value;
    use indexmap::IndexMap;

    fn open(parent: &Frame, name: &str, binds_self: bool) -> Frame {
        let mut frame = Frame::child_of(parent, Element::new(name, IndexMap::new()));
        frame.binds_self = binds_self;
        frame
    }

    fn stack() -> Vec<Frame> {
        let document = Frame::document();
        let rss = open(&document, "rss", true);
        let channel = open(&rss, "channel", true);
        let item = open(&channel, "item", false);
        vec![document, rss, channel, item]
    }

    #[test]
    fn test_paths() {
        let frames = stack();
        let trace = Trace::new(&frames);
        assert_eq!(
            trace.paths().collect::<Vec<_>>(),
            vec!["", "/rss", "/rss/channel", "/rss/channel/item"]
        );
        assert_eq!(trace.get("/rss/channel").map(|e| e.name.as_str()), Some("channel"));
        assert!(trace.get("/rss/missing").is_none());
    }

    #[test]
    fn test_closed_elements_resolve_through_children() {
        let mut frames = stack();
        let mut image = Element::new("image", IndexMap::new());
        image.open_child("url", false);
        image.close_child("url", false, Value::Text("u".into()));
        frames[2].element.open_child("image", false);
        frames[2]
            .element
            .close_child("image", false, image.clone().into_value());

        let trace = Trace::new(&frames);
        assert_eq!(trace.get("/rss/channel/image"), Some(&image));
        // Reduced to text
        assert!(trace.get("/rss/channel/image/url").is_none());
        assert!(trace.get("/rss/channel/link").is_none());
        assert!(trace.get("/rss/channelx").is_none());
    }

    #[test]
    fn test_context_skips_unbound_frames() {
        let frames = stack();
        let context = Context::new(&frames);
        assert_eq!(context.get("channel").map(|e| e.name.as_str()), Some("channel"));
        assert!(context.get("item").is_none());
        assert_eq!(
            context.ancestors().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            vec!["item", "channel", "rss"]
        );
    }
}
