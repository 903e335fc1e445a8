//! Compile a template tree into bytecode
//! for the stack machine in [`crate::runtime`].
//!
//! For example:
//!
//! ```text
//! [% for i in [1, 2] %]p[% i %][% end %]
//! ```
//!
//! compiles to
//!
//! ```text
//! 0000 PUSH_INT 2
//! 0001 PUSH_INT 1
//! 0002 MAKE_ARRAY 2
//! 0003 BEGIN_FOR i 8
//! 0004 PRINT_RAW "p"
//! 0005 LOOKUP i
//! 0006 PRINT_TOP
//! 0007 CHECK_FOR 4 ; loops back to the body while elements remain
//! 0008 STOP
//! ```
//!
//! Binary operators and array literals push their operands right to left, so the
//! first pop yields the leftmost operand. Jumps are emitted with a placeholder
//! target and patched once the code after them exists.

pub mod bytecode;

use lasso::Rodeo;
use tracing::debug;

use crate::parser::ast::{BinaryOp, Node};
use bytecode::{Instruction, Program};

const PLACEHOLDER: usize = usize::MAX;

/// Compiles a parsed template. The root's code ends in [`Instruction::Stop`].
pub fn generate(root: &Node) -> Program {
    let mut compiler = Compiler::default();
    compiler.emit(root);
    compiler.push(Instruction::Stop);

    debug!(
        instructions = compiler.code.len(),
        names = compiler.names.len(),
        "generated program"
    );
    Program {
        code: compiler.code,
        names: compiler.names.into_reader(),
    }
}

#[derive(Default)]
struct Compiler {
    code: Vec<Instruction>,
    names: Rodeo,
}

impl Compiler {
    /// Appends an instruction, returning its index
    fn push(&mut self, instruction: Instruction) -> usize {
        self.code.push(instruction);
        self.code.len() - 1
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    /// Points the jump at `at` to the next instruction to be emitted
    fn patch(&mut self, at: usize) {
        let target = self.here();
        match &mut self.code[at] {
            Instruction::JumpIfFalse(dest) | Instruction::BeginFor { end: dest, .. } => {
                *dest = target
            }
            other => unreachable!("attempted to patch non-jump instruction {other:?}"),
        }
    }

    fn emit(&mut self, node: &Node) {
        match node {
            Node::Sequence(statements) => {
                for statement in statements {
                    self.emit(statement);
                }
            }
            Node::Text(text) => {
                self.push(Instruction::PrintRaw(text.clone()));
            }
            Node::Print(expr) => {
                self.emit(expr);
                self.push(Instruction::PrintTop);
            }
            Node::Integer(value) => {
                self.push(Instruction::PushInt(*value));
            }
            Node::Nil => {
                self.push(Instruction::PushNil);
            }
            Node::Variable(name) => {
                let key = self.names.get_or_intern(name);
                self.push(Instruction::Lookup(key));
            }
            Node::Array(elements) => {
                for element in elements.iter().rev() {
                    self.emit(element);
                }
                self.push(Instruction::MakeArray(elements.len()));
            }
            Node::Binary { op, lhs, rhs } => {
                self.emit(rhs);
                self.emit(lhs);
                self.push(match op {
                    BinaryOp::Add => Instruction::Add,
                    BinaryOp::Sub => Instruction::Sub,
                    BinaryOp::Mul => Instruction::Mul,
                    BinaryOp::Div => Instruction::Div,
                });
            }
            Node::If { condition, body } => {
                self.emit(condition);
                let jump = self.push(Instruction::JumpIfFalse(PLACEHOLDER));
                self.emit(body);
                self.patch(jump);
            }
            Node::For {
                variable,
                iterable,
                body,
            } => {
                self.emit(iterable);
                let variable = self.names.get_or_intern(variable);
                let begin = self.push(Instruction::BeginFor {
                    variable,
                    end: PLACEHOLDER,
                });
                let body_start = self.here();
                self.emit(body);
                self.push(Instruction::CheckFor(body_start));
                self.patch(begin);
            }
        }
    }
}
