//! The stack machine that executes a [`Program`].
use std::{collections::HashMap, fmt::Write, ops::ControlFlow, rc::Rc};

use lasso::Spur;
use tracing::trace;

use super::{
    scope::{IterationScope, ScopeStack},
    value::{Integer, Value},
};
use crate::{
    compiler::bytecode::{Instruction, Program},
    parser::ast::BinaryOp,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (at instruction {pc})")]
pub struct VmError {
    /// Index of the instruction that failed
    pub pc: usize,
    pub kind: VmErrorKind,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VmErrorKind {
    #[error("value stack underflow")]
    StackUnderflow,
    #[error("ran past the end of the program")]
    EndOfProgram,
    #[error("`CHECK_FOR` without an iteration scope")]
    NoIterationScope,
    #[error("unsupported operands for `{op}`: {lhs} and {rhs}")]
    UnsupportedOperands {
        op: BinaryOp,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in `{op}`")]
    Overflow { op: BinaryOp },
    #[error("cannot iterate over {0}")]
    NotIterable(&'static str),
}

pub(crate) struct Vm<'p> {
    program: &'p Program,
    pc: usize,
    stack: Vec<Value>,
    scopes: ScopeStack,
    output: String,
}

impl<'p> Vm<'p> {
    pub(crate) fn new(program: &'p Program, root: HashMap<Spur, Value>) -> Self {
        Self {
            program,
            pc: 0,
            stack: vec![],
            scopes: ScopeStack::new(root),
            output: String::new(),
        }
    }

    /// Runs until `STOP`, returning everything printed
    pub(crate) fn run(mut self) -> Result<String, VmError> {
        let program = self.program;
        loop {
            let pc = self.pc;
            let Some(instruction) = program.code.get(pc) else {
                return Err(VmError {
                    pc,
                    kind: VmErrorKind::EndOfProgram,
                });
            };
            trace!(
                pc,
                stack = self.stack.len(),
                scopes = self.scopes.depth(),
                "{}",
                program.display_instruction(instruction)
            );
            self.pc += 1;
            match self.step(instruction) {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break,
                Err(kind) => return Err(VmError { pc, kind }),
            }
        }
        debug_assert!(self.stack.is_empty(), "values left on stack at STOP");
        Ok(self.output)
    }

    fn pop(&mut self) -> Result<Value, VmErrorKind> {
        self.stack.pop().ok_or(VmErrorKind::StackUnderflow)
    }

    fn step(&mut self, instruction: &Instruction) -> Result<ControlFlow<()>, VmErrorKind> {
        match instruction {
            Instruction::Stop => return Ok(ControlFlow::Break(())),
            Instruction::PushInt(value) => self.stack.push(Value::Integer(*value)),
            Instruction::PushNil => self.stack.push(Value::Nil),
            Instruction::Add => self.binary(BinaryOp::Add)?,
            Instruction::Sub => self.binary(BinaryOp::Sub)?,
            Instruction::Mul => self.binary(BinaryOp::Mul)?,
            Instruction::Div => self.binary(BinaryOp::Div)?,
            Instruction::PrintRaw(text) => self.output.push_str(text),
            Instruction::PrintTop => {
                let value = self.pop()?;
                // writing into a String can't fail
                _ = write!(self.output, "{value}");
            }
            Instruction::Lookup(name) => {
                let value = self.scopes.lookup(*name);
                self.stack.push(value);
            }
            Instruction::MakeArray(count) => {
                let items = (0..*count)
                    .map(|_| self.pop())
                    .collect::<Result<Vec<_>, _>>()?;
                self.stack.push(Value::Array(items.into()));
            }
            Instruction::JumpIfFalse(target) => {
                if !self.pop()?.is_truthy() {
                    self.pc = *target;
                }
            }
            Instruction::BeginFor { variable, end } => match self.pop()? {
                Value::Array(items) => match IterationScope::begin(*variable, items) {
                    Some(scope) => self.scopes.push(scope),
                    None => self.pc = *end,
                },
                other => return Err(VmErrorKind::NotIterable(other.type_name())),
            },
            Instruction::CheckFor(start) => {
                let scope = self
                    .scopes
                    .innermost_mut()
                    .ok_or(VmErrorKind::NoIterationScope)?;
                if scope.advance() {
                    self.pc = *start;
                } else {
                    self.scopes.pop();
                }
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Pops `a`, then `b`, and pushes `a op b`
    fn binary(&mut self, op: BinaryOp) -> Result<(), VmErrorKind> {
        let a = self.pop()?;
        let b = self.pop()?;
        let result = match (a, b) {
            (Value::Integer(a), Value::Integer(b)) => {
                Value::Integer(integer_op(op, a, b)?)
            }
            (Value::Text(a), Value::Text(b)) if op == BinaryOp::Add => {
                let mut joined = String::with_capacity(a.len() + b.len());
                joined.push_str(&a);
                joined.push_str(&b);
                Value::Text(Rc::from(joined))
            }
            (Value::Array(a), Value::Array(b)) if op == BinaryOp::Add => {
                Value::Array(a.iter().chain(b.iter()).cloned().collect())
            }
            (a, b) => {
                return Err(VmErrorKind::UnsupportedOperands {
                    op,
                    lhs: a.type_name(),
                    rhs: b.type_name(),
                })
            }
        };
        self.stack.push(result);
        Ok(())
    }
}

fn integer_op(op: BinaryOp, a: Integer, b: Integer) -> Result<Integer, VmErrorKind> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div if b == 0 => return Err(VmErrorKind::DivisionByZero),
        BinaryOp::Div => floor_div(a, b),
    };
    result.ok_or(VmErrorKind::Overflow { op })
}

/// Division rounding toward negative infinity
fn floor_div(a: Integer, b: Integer) -> Option<Integer> {
    let quotient = a.checked_div(b)?;
    if a % b != 0 && (a < 0) != (b < 0) {
        Some(quotient - 1)
    } else {
        Some(quotient)
    }
}
