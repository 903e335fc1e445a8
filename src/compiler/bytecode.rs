//! The instruction set, and the compiled [`Program`] that holds it.
use core::fmt;

use lasso::{RodeoReader, Spur};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Stop,
    PushInt(i64),
    PushNil,
    /// Pops `a`, then `b`, pushes `a + b`
    Add,
    Sub,
    Mul,
    Div,
    PrintRaw(Box<str>),
    PrintTop,
    /// Pushes the value bound to a name, or nil
    Lookup(Spur),
    /// Pops `n` values into a sequence, in pop order
    MakeArray(usize),
    JumpIfFalse(usize),
    /// Pops a sequence. Empty sequences jump to `end`, anything else opens an
    /// iteration scope with `variable` bound to the first element.
    BeginFor {
        variable: Spur,
        end: usize,
    },
    /// Binds the next element and jumps to the body start, or closes the scope
    CheckFor(usize),
}

/// A compiled template: a flat instruction sequence plus the names it refers to.
#[derive(Debug)]
pub struct Program {
    pub(crate) code: Vec<Instruction>,
    pub(crate) names: RodeoReader,
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Resolves an interned variable name, `None` for keys from another program
    pub fn name(&self, key: Spur) -> Option<&str> {
        self.names.try_resolve(&key)
    }

    /// The key for `name`, if the program mentions it at all
    pub fn name_key(&self, name: &str) -> Option<Spur> {
        self.names.get(name)
    }

    pub(crate) fn display_instruction<'a>(
        &'a self,
        instruction: &'a Instruction,
    ) -> DisplayInstruction<'a> {
        DisplayInstruction {
            program: self,
            instruction,
        }
    }
}

pub(crate) struct DisplayInstruction<'a> {
    program: &'a Program,
    instruction: &'a Instruction,
}

impl DisplayInstruction<'_> {
    fn name(&self, key: Spur) -> &str {
        self.program.name(key).unwrap_or("<unknown>")
    }
}

impl fmt::Display for DisplayInstruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instruction {
            Instruction::Stop => write!(f, "STOP"),
            Instruction::PushInt(value) => write!(f, "PUSH_INT {value}"),
            Instruction::PushNil => write!(f, "PUSH_NIL"),
            Instruction::Add => write!(f, "ADD"),
            Instruction::Sub => write!(f, "SUB"),
            Instruction::Mul => write!(f, "MUL"),
            Instruction::Div => write!(f, "DIV"),
            Instruction::PrintRaw(text) => write!(f, "PRINT_RAW {text:?}"),
            Instruction::PrintTop => write!(f, "PRINT_TOP"),
            Instruction::Lookup(name) => write!(f, "LOOKUP {}", self.name(*name)),
            Instruction::MakeArray(count) => write!(f, "MAKE_ARRAY {count}"),
            Instruction::JumpIfFalse(target) => write!(f, "JUMP_IF_FALSE {target}"),
            Instruction::BeginFor { variable, end } => {
                write!(f, "BEGIN_FOR {} {end}", self.name(*variable))
            }
            Instruction::CheckFor(start) => write!(f, "CHECK_FOR {start}"),
        }
    }
}

/// Disassembly, one instruction per line
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, instruction) in self.code.iter().enumerate() {
            writeln!(f, "{idx:04} {}", self.display_instruction(instruction))?;
        }
        Ok(())
    }
}
