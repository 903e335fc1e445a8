//! Lexical scopes for loop variables.
//!
//! The root scope lives for the whole run and holds the render variables. Every
//! running `for` loop adds an [`IterationScope`] on top, which owns its sequence
//! and a cursor into it.
use std::{collections::HashMap, rc::Rc};

use lasso::Spur;

use super::value::Value;

#[derive(Debug, Clone)]
pub(crate) struct IterationScope {
    variable: Spur,
    items: Rc<[Value]>,
    /// Index of the next element to bind
    cursor: usize,
    current: Value,
}

impl IterationScope {
    /// Binds the first element, or returns `None` when there is nothing to iterate
    pub(crate) fn begin(variable: Spur, items: Rc<[Value]>) -> Option<Self> {
        let current = items.first()?.clone();
        Some(Self {
            variable,
            items,
            cursor: 1,
            current,
        })
    }

    /// Binds the next element, returning false once the sequence is exhausted
    pub(crate) fn advance(&mut self) -> bool {
        match self.items.get(self.cursor) {
            Some(next) => {
                self.current = next.clone();
                self.cursor += 1;
                true
            }
            None => false,
        }
    }
}

/// The root scope plus a stack of iteration scopes above it. The root can't be popped.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScopeStack {
    root: HashMap<Spur, Value>,
    loops: Vec<IterationScope>,
}

impl ScopeStack {
    pub(crate) fn new(root: HashMap<Spur, Value>) -> Self {
        Self {
            root,
            loops: vec![],
        }
    }

    /// Searches from the innermost loop outward, then the root. Unbound names are nil.
    pub(crate) fn lookup(&self, name: Spur) -> Value {
        self.loops
            .iter()
            .rev()
            .find(|scope| scope.variable == name)
            .map(|scope| scope.current.clone())
            .or_else(|| self.root.get(&name).cloned())
            .unwrap_or_default()
    }

    pub(crate) fn push(&mut self, scope: IterationScope) {
        self.loops.push(scope);
    }

    pub(crate) fn innermost_mut(&mut self) -> Option<&mut IterationScope> {
        self.loops.last_mut()
    }

    pub(crate) fn pop(&mut self) -> Option<IterationScope> {
        self.loops.pop()
    }

    /// Number of scopes, counting the root
    pub(crate) fn depth(&self) -> usize {
        self.loops.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{IterationScope, ScopeStack};
    use crate::Value;
    use assert2::{check, let_assert};
    use lasso::Rodeo;

    #[test]
    fn empty_sequence_has_no_scope() {
        let mut rodeo = Rodeo::default();
        let i = rodeo.get_or_intern("i");
        check!(IterationScope::begin(i, Vec::<Value>::new().into()).is_none());
    }

    #[test]
    fn iteration_walks_every_element() {
        let mut rodeo = Rodeo::default();
        let i = rodeo.get_or_intern("i");
        let mut stack = ScopeStack::default();
        let_assert!(Some(scope) = IterationScope::begin(i, [1i64, 2, 3].map(Value::from).into()));
        stack.push(scope);

        let mut seen = vec![stack.lookup(i)];
        while let Some(scope) = stack.innermost_mut() {
            if scope.advance() {
                seen.push(stack.lookup(i));
            } else {
                stack.pop();
            }
        }
        check!(seen == [Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        check!(stack.depth() == 1);
        check!(stack.lookup(i) == Value::Nil);
    }

    #[test]
    fn inner_scopes_shadow_outer_ones() {
        let mut rodeo = Rodeo::default();
        let x = rodeo.get_or_intern("x");
        let y = rodeo.get_or_intern("y");
        let mut stack = ScopeStack::new(HashMap::from([(x, Value::from("root"))]));
        check!(stack.lookup(x) == Value::from("root"));

        stack.push(IterationScope::begin(x, [Value::from("outer")].into()).unwrap());
        stack.push(IterationScope::begin(y, [Value::from("y")].into()).unwrap());
        check!(stack.lookup(x) == Value::from("outer"));
        stack.push(IterationScope::begin(x, [Value::from("inner")].into()).unwrap());
        check!(stack.lookup(x) == Value::from("inner"));
        check!(stack.depth() == 4);

        stack.pop();
        check!(stack.lookup(x) == Value::from("outer"));
        stack.pop();
        stack.pop();
        check!(stack.lookup(x) == Value::from("root"));
        check!(stack.pop().is_none());
        check!(stack.depth() == 1);
    }
}
