//! Selector-driven XML stream
//!
//! [`XmlStream`] consumes bytes, tokenizes them and, for every element
//! boundary, steps the selector automaton. Hooks returned by the automaton
//! either notify listeners or adjust the assembly policy for the subtree
//! that is opening or closing:
//!
//! - collect: same-named siblings accumulate into a list
//! - preserve: document order (and optionally whitespace) is kept
//! - buffer: pass-through output is held back until an update listener has
//!   seen the finished element, which is then written once
//!
//! ```text
//! bytes -> Tokenizer -> XmlStream -> Automaton -> hooks -> listeners / output
//! ```

use super::frame::{Context, Frame, Trace};
use super::serialize::{write_element, write_end, write_start, write_text};
use super::value::{Element, Node};
use crate::core::attributes::Attribute;
use crate::core::tokenizer::{Tokenizer, XmlEvent};
use crate::error::StreamError;
use crate::selector::{parse_event, Automaton, Category, EventKind, Selector};
use indexmap::IndexMap;
use std::cell::Cell;

/// Selector event listener
pub type Listener = Box<dyn FnMut(&mut Matched<'_>) + Send>;
type DataListener = Box<dyn FnMut(&str) + Send>;
type EndListener = Box<dyn FnMut() + Send>;
type ErrorListener = Box<dyn FnMut(&StreamError) + Send>;

/// What a selector listener receives
pub struct Matched<'a> {
    /// Canonical event name, e.g. `endElement: channel item`
    pub event: &'a str,
    /// The matched element. Changes made by `updateElement` listeners are
    /// written to the pass-through output.
    pub element: &'a mut Element,
    pub context: Context<'a>,
    pub trace: Trace<'a>,
    /// The raw chunk, for `text` events
    pub chunk: Option<&'a str>,
    pause: &'a Cell<bool>,
}

impl Matched<'_> {
    /// Stop event delivery once the current token has been handled
    pub fn pause(&self) {
        self.pause.set(true);
    }
}

/// Automaton payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    Collect,
    PreserveEnter { whitespace: bool },
    PreserveLeave { whitespace: bool },
    /// Hold back output for an update subscription
    BufferEnter(usize),
    /// Notify the update listeners of an event, then release the buffer
    BufferLeave(usize),
    /// Notify the listeners of an event
    Notify(usize),
}

/// Lifecycle of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting input
    Open,
    /// `finish` was called; buffered input is still being delivered
    Finishing,
    /// The document was fully delivered
    Ended,
    /// A syntax or read error was reported
    Failed,
}

/// Streaming selector matcher over one XML document
pub struct XmlStream {
    tokenizer: Tokenizer,
    automaton: Automaton<Hook>,
    /// Listeners by canonical event name; the index is the hook payload
    events: IndexMap<String, Vec<Listener>>,
    data: Vec<DataListener>,
    end: Vec<EndListener>,
    error: Vec<ErrorListener>,
    /// Open elements above the document frame
    frames: Vec<Frame>,
    buffer_depth: usize,
    preserve_depth: usize,
    preserve_ws_depth: usize,
    pending_collect: bool,
    suspended: bool,
    phase: Phase,
}

impl XmlStream {
    pub fn new() -> Self {
        Self::with_tokenizer(Tokenizer::new())
    }

    /// Create a stream whose input buffer starts at `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_tokenizer(Tokenizer::with_capacity(capacity))
    }

    fn with_tokenizer(tokenizer: Tokenizer) -> Self {
        let mut frames = Vec::with_capacity(32);
        frames.push(Frame::document());
        XmlStream {
            tokenizer,
            automaton: Automaton::new(),
            events: IndexMap::new(),
            data: Vec::new(),
            end: Vec::new(),
            error: Vec::new(),
            frames,
            buffer_depth: 0,
            preserve_depth: 0,
            preserve_ws_depth: 0,
            pending_collect: false,
            suspended: false,
            phase: Phase::Open,
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Subscribe to a selector event such as `"endElement: channel item"`.
    ///
    /// Returns `false`, dropping the listener, when `event` is not a selector
    /// subscription; use [`on_data`](Self::on_data), [`on_end`](Self::on_end)
    /// and [`on_error`](Self::on_error) for the stream's own events.
    pub fn on<F>(&mut self, event: &str, listener: F) -> bool
    where
        F: FnMut(&mut Matched<'_>) + Send + 'static,
    {
        let Some(spec) = parse_event(event) else {
            log::debug!(target: "xmlmatch.stream", "{event:?} is not a selector event; listener dropped");
            return false;
        };

        if let Some(listeners) = self.events.get_mut(&spec.name) {
            listeners.push(Box::new(listener));
            return true;
        }

        let state = self.automaton.compile(&spec.selector);
        let listeners: Vec<Listener> = vec![Box::new(listener)];
        let (id, _) = self.events.insert_full(spec.name.clone(), listeners);

        match spec.kind {
            EventKind::StartElement => self.automaton.on(Category::Enter, state, Hook::Notify(id)),
            EventKind::EndElement => self.automaton.on(Category::Leave, state, Hook::Notify(id)),
            EventKind::Text => self.automaton.on(Category::State, state, Hook::Notify(id)),
            EventKind::UpdateElement => {
                self.automaton.on(Category::Enter, state, Hook::BufferEnter(id));
                self.automaton.on(Category::Leave, state, Hook::BufferLeave(id));
            }
        }
        log::debug!(target: "xmlmatch.stream", "subscribed {:?} at {state}", spec.name);
        true
    }

    /// Accumulate elements matching `selector` into lists in their parent
    pub fn collect(&mut self, selector: &str) -> &mut Self {
        let selector = Selector::parse(selector);
        let state = self.automaton.compile(&selector);
        self.automaton.on(Category::Flag, state, Hook::Collect);
        log::debug!(target: "xmlmatch.stream", "collect {:?} at {state}", selector.normalized());
        self
    }

    /// Keep the document order of the subtrees matching `selector`, and
    /// their whitespace when `whitespace` is set
    pub fn preserve(&mut self, selector: &str, whitespace: bool) -> &mut Self {
        let selector = Selector::parse(selector);
        let state = self.automaton.compile(&selector);
        self.automaton
            .on(Category::Enter, state, Hook::PreserveEnter { whitespace });
        self.automaton
            .on(Category::Leave, state, Hook::PreserveLeave { whitespace });
        log::debug!(
            target: "xmlmatch.stream",
            "preserve {:?} at {state} (whitespace: {whitespace})",
            selector.normalized()
        );
        self
    }

    /// Receive escaped XML fragments as they are produced. Registering the
    /// first data listener turns pass-through output on.
    pub fn on_data<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.data.push(Box::new(listener));
        self
    }

    /// Called once when the document was fully delivered
    pub fn on_end<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnMut() + Send + 'static,
    {
        self.end.push(Box::new(listener));
        self
    }

    /// Called once with the error that terminated the stream
    pub fn on_error<F>(&mut self, listener: F) -> &mut Self
    where
        F: FnMut(&StreamError) + Send + 'static,
    {
        self.error.push(Box::new(listener));
        self
    }

    // ========================================================================
    // Input and control
    // ========================================================================

    /// Feed a chunk of input and deliver every event it completes, unless
    /// the stream is paused.
    ///
    /// # Errors
    ///
    /// Returns the terminal syntax or encoding error, or
    /// [`StreamError::Closed`] once the stream has failed or finished.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), StreamError> {
        if self.phase != Phase::Open {
            return Err(StreamError::Closed);
        }
        self.tokenizer.feed(chunk);
        self.drain()
    }

    /// Signal the end of input. The end event fires once every buffered
    /// event was delivered.
    ///
    /// # Errors
    ///
    /// As [`feed`](Self::feed); truncated input is a syntax error.
    pub fn finish(&mut self) -> Result<(), StreamError> {
        if self.phase != Phase::Open {
            return Err(StreamError::Closed);
        }
        self.tokenizer.finish();
        self.phase = Phase::Finishing;
        self.drain()
    }

    /// Stop delivering events. Input fed while paused stays buffered.
    pub fn pause(&mut self) {
        self.suspended = true;
    }

    /// Deliver buffered events and continue. If a listener pauses again
    /// while the buffer drains, the stream stays paused.
    ///
    /// # Errors
    ///
    /// Returns an error met while draining, or [`StreamError::Closed`] when
    /// the stream had already failed.
    pub fn resume(&mut self) -> Result<(), StreamError> {
        self.suspended = false;
        match self.phase {
            Phase::Open | Phase::Finishing => self.drain(),
            Phase::Ended => Ok(()),
            Phase::Failed => Err(StreamError::Closed),
        }
    }

    /// Report an error from outside the tokenizer (e.g. the byte source)
    /// and close the stream
    pub fn abort(&mut self, err: StreamError) -> StreamError {
        if self.phase == Phase::Failed {
            return err;
        }
        self.fail(err)
    }

    pub fn is_paused(&self) -> bool {
        self.suspended
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current input line
    pub fn line(&self) -> usize {
        self.tokenizer.line()
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Document container; the root element is stored in it under its name
    pub fn document(&self) -> &Element {
        &self.frames[0].element
    }

    // ========================================================================
    // Event delivery
    // ========================================================================

    fn drain(&mut self) -> Result<(), StreamError> {
        while !self.suspended {
            match self.tokenizer.next_event() {
                Ok(Some(event)) => self.dispatch(event),
                Ok(None) => {
                    if self.phase == Phase::Finishing && self.tokenizer.is_done() {
                        self.complete();
                    }
                    return Ok(());
                }
                Err(err) => return Err(self.fail(err)),
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, event: XmlEvent) {
        match event {
            XmlEvent::StartElement { name, attributes } => self.start_element(name, attributes),
            XmlEvent::EndElement { .. } => self.end_element(),
            XmlEvent::Text(chunk) => self.text(&chunk),
        }
        debug_assert_eq!(self.automaton.depth() + 1, self.frames.len());
    }

    fn complete(&mut self) {
        self.phase = Phase::Ended;
        log::debug!(target: "xmlmatch.stream", "document complete at line {}", self.tokenizer.line());
        for listener in &mut self.end {
            listener();
        }
    }

    fn fail(&mut self, err: StreamError) -> StreamError {
        self.phase = Phase::Failed;
        log::debug!(target: "xmlmatch.stream", "stream failed: {err}");
        for listener in &mut self.error {
            listener(&err);
        }
        err
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("document frame is never popped")
    }

    /// Whether pass-through output is on and not held back by a buffer
    fn emitting(&self) -> bool {
        !self.data.is_empty() && self.buffer_depth == 0
    }

    fn emit(&mut self, fragment: &str) {
        for listener in &mut self.data {
            listener(fragment);
        }
    }

    fn start_element(&mut self, name: String, attributes: Vec<Attribute>) {
        let entered = self.automaton.enter(&name);
        let attrs = attributes
            .into_iter()
            .map(|attr| (attr.name, attr.value))
            .collect();
        let parent = self.frames.last().expect("document frame is never popped");
        let mut frame = Frame::child_of(parent, Element::new(name, attrs));

        self.pending_collect = false;
        for hook in entered.flags {
            self.apply(hook, &mut frame, None);
        }
        frame.collect = self.pending_collect;
        frame.binds_self = !frame.collect;

        for hook in entered.enter {
            self.apply(hook, &mut frame, None);
        }
        if self.preserve_depth > 0 {
            frame.element.nodes = Some(Vec::new());
        }

        // Start listeners may have renamed the element
        let name = frame.element.name.clone();
        self.top_mut().element.open_child(&name, frame.collect);

        if self.emitting() {
            let mut out = String::with_capacity(64);
            write_start(&mut out, &name, &frame.element.attrs);
            self.emit(&out);
        }
        self.frames.push(frame);
    }

    fn text(&mut self, chunk: &str) {
        assert!(self.frames.len() > 1, "text outside the root element");
        let mut frame = self.frames.pop().expect("document frame is never popped");

        let whitespace = self.preserve_ws_depth > 0;
        if whitespace {
            frame.element.text.push_str(chunk);
        } else {
            frame.text.push(&mut frame.element.text, chunk);
        }

        if self.preserve_depth > 0 {
            let node = if whitespace { chunk } else { chunk.trim() };
            if !node.is_empty() {
                if let Some(nodes) = frame.element.nodes.as_mut() {
                    nodes.push(Node::Text(node.to_string()));
                }
            }
        }

        for hook in self.automaton.run(Category::State) {
            self.apply(hook, &mut frame, Some(chunk));
        }
        self.frames.push(frame);

        if self.emitting() {
            let mut out = String::with_capacity(chunk.len());
            write_text(&mut out, chunk);
            self.emit(&out);
        }
    }

    fn end_element(&mut self) {
        assert!(
            self.frames.len() > 1,
            "frame stack underflow: element end without a matching start"
        );
        let mut frame = self.frames.pop().expect("document frame is never popped");

        for hook in self.automaton.leave() {
            self.apply(hook, &mut frame, None);
        }

        let Frame {
            element, collect, ..
        } = frame;
        let name = element.name.clone();

        if self.preserve_depth > 0 {
            if let Some(nodes) = self.top_mut().element.nodes.as_mut() {
                nodes.push(Node::Element(element.clone()));
            }
        }
        self.top_mut()
            .element
            .close_child(&name, collect, element.into_value());

        if self.emitting() {
            let mut out = String::with_capacity(name.len() + 3);
            write_end(&mut out, &name);
            self.emit(&out);
        }
    }

    /// Run one hook against `frame`, which is not on the frame stack while
    /// its hooks run; the stack holds its ancestors.
    fn apply(&mut self, hook: Hook, frame: &mut Frame, chunk: Option<&str>) {
        match hook {
            Hook::Collect => self.pending_collect = true,
            Hook::PreserveEnter { whitespace } => {
                frame.preserved.push(whitespace);
                self.preserve_depth += 1;
                if whitespace {
                    self.preserve_ws_depth += 1;
                }
            }
            Hook::PreserveLeave { whitespace } => {
                // Registered after this element opened: nothing to undo
                let Some(pos) = frame.preserved.iter().position(|&ws| ws == whitespace) else {
                    return;
                };
                frame.preserved.swap_remove(pos);
                self.preserve_depth -= 1;
                if whitespace {
                    self.preserve_ws_depth -= 1;
                }
            }
            Hook::BufferEnter(id) => {
                frame.buffered.push(id);
                self.buffer_depth += 1;
            }
            Hook::BufferLeave(id) => {
                let Some(pos) = frame.buffered.iter().position(|&open| open == id) else {
                    // Its start tag already went out unbuffered
                    log::debug!(
                        target: "xmlmatch.stream",
                        "<{}> opened before its update subscription; not re-emitted",
                        frame.element.name
                    );
                    return;
                };
                frame.buffered.swap_remove(pos);
                self.notify(id, frame, None);
                self.buffer_depth -= 1;
                if self.emitting() {
                    // The close tag follows with the regular element end
                    let mut out = String::with_capacity(256);
                    write_element(&mut out, &frame.element.name, &frame.element, false);
                    self.emit(&out);
                }
            }
            Hook::Notify(id) => self.notify(id, frame, chunk),
        }
    }

    fn notify(&mut self, id: usize, frame: &mut Frame, chunk: Option<&str>) {
        let Some((event, listeners)) = self.events.get_index_mut(id) else {
            return;
        };
        log::trace!(target: "xmlmatch.stream", "{event} <{}>", frame.element.name);

        let pause = Cell::new(false);
        let mut matched = Matched {
            event,
            element: &mut frame.element,
            context: Context::new(&self.frames),
            trace: Trace::new(&self.frames),
            chunk,
            pause: &pause,
        };
        for listener in listeners.iter_mut() {
            listener(&mut matched);
        }

        if pause.get() {
            self.suspended = true;
        }
    }
}

impl Default for XmlStream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::serialize::to_xml;
    use crate::stream::value::{Child, Value};
    use std::sync::{Arc, Mutex};

    fn parse(stream: &mut XmlStream, xml: &str) {
        stream.feed(xml.as_bytes()).unwrap();
        stream.finish().unwrap();
    }

    fn record(stream: &mut XmlStream, event: &str) -> Arc<Mutex<Vec<Element>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        assert!(stream.on(event, move |m| sink.lock().unwrap().push(m.element.clone())));
        seen
    }

    fn texts(seen: &Arc<Mutex<Vec<Element>>>) -> Vec<String> {
        seen.lock().unwrap().iter().map(|e| e.text.clone()).collect()
    }

    fn capture_output(stream: &mut XmlStream) -> Arc<Mutex<String>> {
        let out = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&out);
        stream.on_data(move |fragment| sink.lock().unwrap().push_str(fragment));
        out
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    const FEED: &str = "<rss><channel><x><item>a</item></x><item>b</item></channel></rss>";

    #[test]
    fn test_descendant_matches_through_ancestors() {
        let mut stream = XmlStream::new();
        let items = record(&mut stream, "endElement: channel item");
        parse(&mut stream, FEED);
        assert_eq!(texts(&items), vec!["a", "b"]);
    }

    #[test]
    fn test_child_combinator_rejects_intervening_element() {
        let mut stream = XmlStream::new();
        let items = record(&mut stream, "endElement: channel > item");
        parse(&mut stream, FEED);
        assert_eq!(texts(&items), vec!["b"]);
    }

    #[test]
    fn test_duplicate_registration_fires_each_listener_once() {
        let mut stream = XmlStream::new();
        let first = record(&mut stream, "endElement: a>b");
        let second = record(&mut stream, "endElement:  a  >  b ");
        parse(&mut stream, "<a><b>1</b><b>2</b></a>");

        assert_eq!(texts(&first), vec!["1", "2"]);
        assert_eq!(texts(&second), vec!["1", "2"]);
        assert_eq!(stream.events.len(), 1);
    }

    #[test]
    fn test_text_is_normalized_across_chunks() {
        let xml = "<x> hi   there </x>";
        let mut whole = XmlStream::new();
        let whole_seen = record(&mut whole, "endElement: x");
        parse(&mut whole, xml);
        assert_eq!(texts(&whole_seen), vec!["hi there"]);

        let mut split = XmlStream::new();
        let split_seen = record(&mut split, "endElement: x");
        for byte in xml.as_bytes() {
            split.feed(std::slice::from_ref(byte)).unwrap();
        }
        split.finish().unwrap();
        assert_eq!(texts(&split_seen), vec!["hi there"]);
    }

    #[test]
    fn test_collect_builds_ordered_list() {
        let mut stream = XmlStream::new();
        stream.collect("a");
        let roots = record(&mut stream, "endElement: r");
        parse(&mut stream, "<r><a>1</a><a>2</a></r>");

        let roots = roots.lock().unwrap();
        assert_eq!(roots[0].child("a"), Some(&Child::Many(vec![text("1"), text("2")])));
    }

    #[test]
    fn test_without_collect_last_child_wins() {
        let mut stream = XmlStream::new();
        let roots = record(&mut stream, "endElement: r");
        parse(&mut stream, "<r><a>1</a><b>x</b><a>2</a><a>3</a></r>");

        let roots = roots.lock().unwrap();
        assert_eq!(roots[0].child("a"), Some(&Child::One(text("3"))));
        assert_eq!(roots[0].children.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_collect_with_interleaved_siblings() {
        let mut stream = XmlStream::new();
        stream.collect("item");
        let channels = record(&mut stream, "endElement: channel");
        parse(
            &mut stream,
            "<channel><item>1</item><title>t</title><item><n>2</n></item><item>3</item></channel>",
        );

        let channels = channels.lock().unwrap();
        let items = channels[0].child("item").map(Child::values).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], text("1"));
        assert_eq!(items[1].as_element().and_then(|e| e.get("n")), Some(&text("2")));
        assert_eq!(items[2], text("3"));
        assert_eq!(channels[0].get("title"), Some(&text("t")));
    }

    #[test]
    fn test_attributes_keep_element_structured() {
        let mut stream = XmlStream::new();
        let roots = record(&mut stream, "endElement: r");
        parse(&mut stream, "<r><a id=\"7\">x</a></r>");

        let roots = roots.lock().unwrap();
        let a = roots[0].get("a").and_then(Value::as_element).unwrap();
        assert_eq!(a.attr("id"), Some("7"));
        assert_eq!(a.text, "x");
    }

    #[test]
    fn test_preserve_round_trip() {
        let xml = "<p class=\"a&amp;b\">one <b>bold</b> two<br/></p>";
        let mut stream = XmlStream::new();
        stream.preserve("p", true);
        let paragraphs = record(&mut stream, "endElement: p");
        parse(&mut stream, &format!("<doc>{xml}</doc>"));

        let paragraphs = paragraphs.lock().unwrap();
        assert_eq!(
            to_xml(&paragraphs[0]),
            "<p class=\"a&amp;b\">one <b>bold</b> two<br></br></p>"
        );
    }

    #[test]
    fn test_preserve_without_whitespace_trims_text_nodes() {
        let mut stream = XmlStream::new();
        stream.preserve("p", false);
        let paragraphs = record(&mut stream, "endElement: p");
        parse(&mut stream, "<p> one <b>two</b>\n three </p>");

        let paragraphs = paragraphs.lock().unwrap();
        let nodes = paragraphs[0].nodes.as_ref().unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::Text("one".to_string()));
        assert_eq!(nodes[2], Node::Text("three".to_string()));
        assert_eq!(paragraphs[0].text, "one three");
    }

    #[test]
    fn test_update_mutation_reaches_output_once() {
        let mut stream = XmlStream::new();
        let out = capture_output(&mut stream);
        assert!(stream.on("updateElement: item", |m| {
            m.element.attrs.insert("seen".to_string(), "yes".to_string());
        }));
        parse(
            &mut stream,
            "<feed><item id=\"1\">x</item><other>o</other><item id=\"2\">y &amp; z</item></feed>",
        );

        assert_eq!(
            out.lock().unwrap().as_str(),
            "<feed><item id=\"1\" seen=\"yes\">x</item><other>o</other>\
             <item id=\"2\" seen=\"yes\">y &amp; z</item></feed>"
        );
    }

    #[test]
    fn test_nested_updates_flush_at_outermost() {
        let mut stream = XmlStream::new();
        let out = capture_output(&mut stream);
        stream.on("updateElement: a", |m| {
            m.element.attrs.insert("k".to_string(), "a".to_string());
        });
        stream.on("updateElement: b", |m| {
            m.element.text = "changed".to_string();
        });
        parse(&mut stream, "<r><a><b>old</b></a></r>");

        assert_eq!(
            out.lock().unwrap().as_str(),
            "<r><a k=\"a\"><b>changed</b></a></r>"
        );
    }

    #[test]
    fn test_pass_through_output() {
        let mut stream = XmlStream::new();
        let out = capture_output(&mut stream);
        parse(&mut stream, "<?xml version=\"1.0\"?><r a=\"&quot;\"><!-- c -->t<e/></r>");
        assert_eq!(out.lock().unwrap().as_str(), "<r a=\"&quot;\">t<e></e></r>");
    }

    #[test]
    fn test_pause_halts_delivery_until_resume() {
        let mut stream = XmlStream::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stream.on("endElement: a", move |m| {
            let mut seen = sink.lock().unwrap();
            seen.push(m.element.text.clone());
            if seen.len() == 1 {
                m.pause();
            }
        });
        let ended = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ended);
        stream.on_end(move || *flag.lock().unwrap() = true);

        stream.feed(b"<r><a>1</a><a>2</a>").unwrap();
        assert!(stream.is_paused());
        assert_eq!(*seen.lock().unwrap(), vec!["1"]);

        stream.feed(b"<a>3</a></r>").unwrap();
        stream.finish().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["1"]);
        assert!(!*ended.lock().unwrap());

        stream.resume().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["1", "2", "3"]);
        assert!(*ended.lock().unwrap());
        assert_eq!(stream.phase(), Phase::Ended);
    }

    #[test]
    fn test_external_pause() {
        let mut stream = XmlStream::new();
        let items = record(&mut stream, "endElement: a");
        stream.pause();
        stream.feed(b"<r><a>1</a>").unwrap();
        assert!(items.lock().unwrap().is_empty());
        stream.resume().unwrap();
        assert_eq!(texts(&items), vec!["1"]);
    }

    #[test]
    fn test_context_and_trace() {
        let mut stream = XmlStream::new();
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&found);
        stream.on("endElement: item", move |m| {
            let title = m
                .context
                .get("channel")
                .and_then(|channel| channel.attr("title"))
                .map(str::to_string);
            let traced = m.trace.get("/rss/channel").is_some();
            sink.lock().unwrap().push((title, traced));
        });
        parse(&mut stream, "<rss><channel title=\"News\"><item/></channel></rss>");

        assert_eq!(
            *found.lock().unwrap(),
            vec![(Some("News".to_string()), true)]
        );
    }

    #[test]
    fn test_trace_reaches_closed_siblings() {
        let mut stream = XmlStream::new();
        let found = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&found);
        stream.on("endElement: item", move |m| {
            let url = m
                .trace
                .get("/rss/channel/image")
                .and_then(|image| image.get("url"))
                .map(|url| url.text().to_string());
            sink.lock().unwrap().push(url);
        });
        parse(
            &mut stream,
            "<rss><channel><image><url>u</url></image><item>i</item></channel></rss>",
        );

        assert_eq!(*found.lock().unwrap(), vec![Some("u".to_string())]);
    }

    #[test]
    fn test_update_subscribed_inside_open_element() {
        let mut stream = XmlStream::new();
        let out = capture_output(&mut stream);
        let ends = record(&mut stream, "endElement: item");
        stream.feed(b"<list><item>").unwrap();

        let updated = record(&mut stream, "updateElement: item");
        stream.on("updateElement: item", |m| {
            m.element.attrs.insert("seen".to_string(), "yes".to_string());
        });
        stream.feed(b"x</item><item>y</item></list>").unwrap();
        stream.finish().unwrap();

        assert_eq!(texts(&ends), vec!["x", "y"]);
        assert_eq!(texts(&updated), vec!["y"]);
        assert_eq!(
            out.lock().unwrap().as_str(),
            "<list><item>x</item><item seen=\"yes\">y</item></list>"
        );
        assert_eq!(stream.buffer_depth, 0);
    }

    #[test]
    fn test_preserve_registered_inside_open_element() {
        let mut stream = XmlStream::new();
        let items = record(&mut stream, "endElement: item");
        stream.feed(b"<list><item>").unwrap();

        stream.preserve("item", false);
        stream.feed(b"x</item><item>a<b>c</b></item><tail>t</tail></list>").unwrap();
        stream.finish().unwrap();

        let items = items.lock().unwrap();
        assert!(items[0].nodes.is_none());
        let nodes = items[1].nodes.as_ref().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], Node::Text("a".to_string()));
        assert_eq!(stream.preserve_depth, 0);
        assert_eq!(stream.preserve_ws_depth, 0);

        let list = stream.document().get("list").and_then(Value::as_element).unwrap();
        assert_eq!(list.get("tail"), Some(&text("t")));
    }

    #[test]
    fn test_start_and_text_listeners() {
        let mut stream = XmlStream::new();
        let starts = record(&mut stream, "startElement: item");
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        stream.on("text: item", move |m| {
            sink.lock().unwrap().push(m.chunk.unwrap_or_default().to_string());
        });
        parse(&mut stream, "<list><item id=\"1\"> a </item></list>");

        let starts = starts.lock().unwrap();
        assert_eq!(starts[0].attr("id"), Some("1"));
        assert_eq!(starts[0].text, "");
        assert_eq!(*chunks.lock().unwrap(), vec![" a "]);
    }

    #[test]
    fn test_bare_category_sees_every_element() {
        let mut stream = XmlStream::new();
        let starts = record(&mut stream, "startElement");
        parse(&mut stream, "<a><b/><c><d/></c></a>");
        let names: Vec<_> = starts.lock().unwrap().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_non_selector_event_is_rejected() {
        let mut stream = XmlStream::new();
        assert!(!stream.on("data", |_| {}));
        assert!(!stream.on("endElements: a", |_| {}));
    }

    #[test]
    fn test_document_holds_root() {
        let mut stream = XmlStream::new();
        parse(&mut stream, "<r><a>1</a></r>");
        let root = stream.document().get("r").and_then(Value::as_element).unwrap();
        assert_eq!(root.get("a"), Some(&text("1")));
    }

    #[test]
    fn test_error_is_terminal() {
        let mut stream = XmlStream::new();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        stream.on_error(move |err| sink.lock().unwrap().push(err.to_string()));
        let ended = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ended);
        stream.on_end(move || *flag.lock().unwrap() = true);

        let err = stream.feed(b"<a>\n</b>").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(matches!(stream.feed(b"<c/>"), Err(StreamError::Closed)));
        assert!(matches!(stream.finish(), Err(StreamError::Closed)));

        assert_eq!(*errors.lock().unwrap(), vec!["mismatched tag in line 2"]);
        assert!(!*ended.lock().unwrap());
        assert_eq!(stream.phase(), Phase::Failed);
    }
}
