//! Selector automaton
//!
//! All selectors registered on one stream share a single NFA. Each selector
//! gets its own entry state, which is initially active; element-name edges
//! advance through the selector's tokens and ε self-loops let a state stay
//! active across elements that do not match (descendant combinator). The
//! skip-loop is folded into construction, so one transition step never needs
//! an ε-closure.
//!
//! At run time the automaton keeps one active set per open element.

use super::dispatch::{Category, Dispatcher};
use super::parser::{Part, Selector};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Automaton state identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub u32);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Set of simultaneously active states, ordered by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSet(BTreeSet<StateId>);

impl ActiveSet {
    pub fn new() -> Self {
        ActiveSet(BTreeSet::new())
    }

    pub fn insert(&mut self, state: StateId) -> bool {
        self.0.insert(state)
    }

    pub fn contains(&self, state: StateId) -> bool {
        self.0.contains(&state)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// States in ascending order
    pub fn iter(&self) -> impl Iterator<Item = StateId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<StateId> for ActiveSet {
    fn from_iter<I: IntoIterator<Item = StateId>>(iter: I) -> Self {
        ActiveSet(iter.into_iter().collect())
    }
}

/// Edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol<'a> {
    /// Consumes no input; only ever used for self-loops
    Epsilon,
    Name(&'a str),
}

/// Outgoing edges of one state
#[derive(Debug, Default)]
struct Edges {
    names: HashMap<String, BTreeSet<StateId>>,
    epsilon: BTreeSet<StateId>,
}

/// Hooks produced by entering an element
#[derive(Debug)]
pub struct Entered<H> {
    /// `Flag` hooks; run before the element's frame is set up
    pub flags: Vec<H>,
    /// `Enter` hooks
    pub enter: Vec<H>,
}

/// Shared selector NFA plus its run-time state
pub struct Automaton<H> {
    next_state: u32,
    edges: HashMap<StateId, Edges>,
    /// Canonical selector string -> final state
    finals: HashMap<String, StateId>,
    initial: ActiveSet,
    /// One active set per open element
    stack: Vec<ActiveSet>,
    dispatcher: Dispatcher<H>,
}

impl<H: Clone> Automaton<H> {
    pub fn new() -> Self {
        Automaton {
            next_state: 0,
            edges: HashMap::new(),
            finals: HashMap::new(),
            initial: ActiveSet::new(),
            stack: Vec::with_capacity(32),
            dispatcher: Dispatcher::new(),
        }
    }

    fn alloc_state(&mut self) -> StateId {
        let id = StateId(self.next_state);
        self.next_state += 1;
        id
    }

    /// Add the edge `from --symbol--> to`
    pub fn add_edge(&mut self, from: StateId, symbol: Symbol<'_>, to: StateId) {
        let edges = self.edges.entry(from).or_default();
        match symbol {
            Symbol::Epsilon => {
                edges.epsilon.insert(to);
            }
            Symbol::Name(name) => {
                edges.names.entry(name.to_string()).or_default().insert(to);
            }
        }
    }

    /// Build the states recognizing `selector` and return its final state.
    /// Compiling an already known selector returns the cached state.
    pub fn compile(&mut self, selector: &Selector) -> StateId {
        if let Some(&state) = self.finals.get(selector.normalized()) {
            return state;
        }

        let entry = self.alloc_state();
        self.initial.insert(entry);

        let mut current = entry;
        let mut immediate = false;
        for part in selector.parts() {
            match part {
                Part::Child => immediate = true,
                Part::Name(name) => {
                    if !immediate {
                        self.add_edge(current, Symbol::Epsilon, current);
                    }
                    let next = self.alloc_state();
                    self.add_edge(current, Symbol::Name(name), next);
                    current = next;
                    immediate = false;
                }
            }
        }

        // A bare selector matches at every depth
        if selector.is_empty() {
            self.add_edge(entry, Symbol::Epsilon, entry);
        }

        if !self.stack.is_empty() {
            log::debug!(
                target: "xmlmatch.selector",
                "selector {:?} compiled while {} element(s) are open; open ancestors are not rescanned",
                selector.normalized(),
                self.stack.len()
            );
        }
        log::debug!(
            target: "xmlmatch.selector",
            "compiled selector {:?}: entry {entry}, final {current}",
            selector.normalized()
        );

        self.finals.insert(selector.normalized().to_string(), current);
        current
    }

    /// Cached final state for a canonical selector string
    pub fn final_state(&self, normalized: &str) -> Option<StateId> {
        self.finals.get(normalized).copied()
    }

    /// Number of states allocated so far
    pub fn state_count(&self) -> usize {
        self.next_state as usize
    }

    /// Next active set after reading `name`.
    ///
    /// States without outgoing edges drop out.
    pub fn transition(&self, active: &ActiveSet, name: &str) -> ActiveSet {
        let mut next = ActiveSet::new();
        for state in active.iter() {
            let Some(edges) = self.edges.get(&state) else {
                continue;
            };
            if let Some(targets) = edges.names.get(name) {
                next.0.extend(targets.iter().copied());
            }
            next.0.extend(edges.epsilon.iter().copied());
        }
        next
    }

    /// Active set of the innermost open element (the initial set at the
    /// document level)
    pub fn current(&self) -> &ActiveSet {
        self.stack.last().unwrap_or(&self.initial)
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Register a hook
    pub fn on(&mut self, category: Category, state: StateId, hook: H) {
        self.dispatcher.register(category, state, hook);
    }

    /// Open an element: push its active set and return its flag and enter
    /// hooks
    pub fn enter(&mut self, name: &str) -> Entered<H> {
        let next = self.transition(self.current(), name);
        log::trace!(target: "xmlmatch.selector", "enter <{name}>: {} active", next.len());

        let entered = Entered {
            flags: self.dispatcher.fire(Category::Flag, &next),
            enter: self.dispatcher.fire(Category::Enter, &next),
        };
        self.stack.push(next);
        entered
    }

    /// Close the innermost element and return its leave hooks.
    ///
    /// # Panics
    ///
    /// Panics when no element is open.
    pub fn leave(&mut self) -> Vec<H> {
        let closed = self
            .stack
            .pop()
            .unwrap_or_else(|| panic!("automaton leave() without a matching enter()"));
        log::trace!(target: "xmlmatch.selector", "leave: depth {}", self.stack.len());
        self.dispatcher.fire(Category::Leave, &closed)
    }

    /// Hooks for `category` on the current set
    pub fn run(&self, category: Category) -> Vec<H> {
        self.dispatcher.fire(category, self.current())
    }
}

impl<H: Clone> Default for Automaton<H> {
    fn default() -> Self {
        Self::new()
    }
}
