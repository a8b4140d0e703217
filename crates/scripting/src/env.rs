//! Script call environments
//!
//! Every script call runs inside a reserved environment. The pool is small
//! and fixed so scripts that re-enter the dispatcher cannot recurse without
//! bound: once every environment is taken, further calls are refused.

use crate::interface::{InterfaceId, ScriptId};
use std::cell::RefCell;

/// What the innermost running call is executing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptEnvironment {
    pub script_id: ScriptId,
    pub interface: Option<InterfaceId>,
}

/// Bounded stack of call environments
#[derive(Debug)]
pub struct ScriptEnvironments {
    stack: RefCell<Vec<ScriptEnvironment>>,
    capacity: usize,
}

impl ScriptEnvironments {
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn new(capacity: usize) -> Self {
        Self {
            stack: RefCell::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Take the next free environment
    ///
    /// Returns `None` when all environments are in use. The environment is
    /// released when the guard drops.
    pub fn reserve(&self) -> Option<ScriptEnvGuard<'_>> {
        let mut stack = self.stack.borrow_mut();
        if stack.len() >= self.capacity {
            return None;
        }

        let index = stack.len();
        stack.push(ScriptEnvironment::default());
        Some(ScriptEnvGuard {
            environments: self,
            index,
        })
    }

    /// Number of environments currently reserved
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Innermost reserved environment
    pub fn current(&self) -> Option<ScriptEnvironment> {
        self.stack.borrow().last().copied()
    }
}

impl Default for ScriptEnvironments {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// A reserved environment; releases its slot (and any nested ones) on drop
#[derive(Debug)]
pub struct ScriptEnvGuard<'a> {
    environments: &'a ScriptEnvironments,
    index: usize,
}

impl ScriptEnvGuard<'_> {
    /// Tag the environment with the script about to run
    pub fn set_script_id(&self, script_id: ScriptId, interface: InterfaceId) {
        let mut stack = self.environments.stack.borrow_mut();
        if let Some(slot) = stack.get_mut(self.index) {
            *slot = ScriptEnvironment {
                script_id,
                interface: Some(interface),
            };
        }
    }

    pub fn environment(&self) -> ScriptEnvironment {
        self.environments
            .stack
            .borrow()
            .get(self.index)
            .copied()
            .unwrap_or_default()
    }
}

impl Drop for ScriptEnvGuard<'_> {
    fn drop(&mut self) {
        self.environments.stack.borrow_mut().truncate(self.index);
    }
}
