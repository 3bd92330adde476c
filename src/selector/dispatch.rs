//! Callback dispatch table
//!
//! Maps (category, state) to an ordered list of hooks. Firing walks an
//! active set in ascending state order and yields each state's hooks in
//! registration order, so dispatch order is deterministic.

use super::automaton::{ActiveSet, StateId};
use std::collections::HashMap;

/// When a hook fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Element start, after `Flag`
    Enter,
    /// Element end, with the closing element's own set
    Leave,
    /// Text inside the current element
    State,
    /// Element start, before the frame is created
    Flag,
}

impl Category {
    const COUNT: usize = 4;

    #[inline]
    fn index(self) -> usize {
        match self {
            Category::Enter => 0,
            Category::Leave => 1,
            Category::State => 2,
            Category::Flag => 3,
        }
    }
}

/// Hook table, one map per category
pub struct Dispatcher<H> {
    tables: [HashMap<StateId, Vec<H>>; Category::COUNT],
}

impl<H: Clone> Dispatcher<H> {
    pub fn new() -> Self {
        Dispatcher {
            tables: Default::default(),
        }
    }

    /// Append a hook for `category` on `state`
    pub fn register(&mut self, category: Category, state: StateId, hook: H) {
        self.tables[category.index()]
            .entry(state)
            .or_default()
            .push(hook);
    }

    /// Hooks registered for `category` on any state of `active`
    pub fn fire(&self, category: Category, active: &ActiveSet) -> Vec<H> {
        let table = &self.tables[category.index()];
        if table.is_empty() {
            return Vec::new();
        }
        active
            .iter()
            .filter_map(|state| table.get(&state))
            .flat_map(|hooks| hooks.iter().cloned())
            .collect()
    }

    /// Number of hooks registered for `category` on `state`
    pub fn count(&self, category: Category, state: StateId) -> usize {
        self.tables[category.index()]
            .get(&state)
            .map_or(0, Vec::len)
    }
}

impl<H: Clone> Default for Dispatcher<H> {
    fn default() -> Self {
        Self::new()
    }
}
