//! runtimes execute a compiled [`Program`] against a set of render variables

use std::collections::{hash_map, HashMap};

use crate::compiler::bytecode::Program;

pub mod scope;
pub mod value;
pub mod vm;

use value::Value;
use vm::{Vm, VmError};

/// Named values the root scope starts out with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vars(HashMap<Box<str>, Value>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<Box<str>>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Builder-style [`Vars::insert`]
    pub fn with(mut self, name: impl Into<Box<str>>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, Box<str>, Value> {
        self.0.iter()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Vars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (Box::from(name.as_ref()), value.into()))
                .collect(),
        )
    }
}

pub fn run(program: &Program) -> Result<String, VmError> {
    Vm::new(program, HashMap::new()).run()
}

/// Runs with `vars` bound in the root scope.
///
/// Variables the program never mentions are skipped.
pub fn run_with(program: &Program, vars: &Vars) -> Result<String, VmError> {
    let root = vars
        .iter()
        .filter_map(|(name, value)| Some((program.name_key(name)?, value.clone())))
        .collect();
    Vm::new(program, root).run()
}

#[cfg(test)]
mod tests {
    use super::{run_with, Vars};
    use crate::{compiler::generate, lexer::scan, parser::parse, Value};
    use assert2::check;

    #[test]
    fn vars_collect_and_override() {
        let vars: Vars = [("a", 1i64), ("b", 2)].into_iter().collect();
        let vars = vars.with("a", "one");
        check!(vars.len() == 2);
        check!(vars.get("a").cloned() == Some(Value::from("one")));
        check!(vars.get("b").cloned() == Some(Value::Integer(2)));
        check!(vars.get("c") == None);
    }

    #[test]
    fn unused_vars_are_ignored() {
        let program = generate(&parse(&scan("[% x %]").unwrap()).unwrap());
        let vars = Vars::new().with("x", 7i64).with("unused", "ignored");
        check!(run_with(&program, &vars) == Ok("7".to_string()));
    }
}
