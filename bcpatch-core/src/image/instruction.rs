//! Bytecode Instructions
//!
//! This module defines the instruction set stored in code units. The set is
//! intentionally small: the patcher only needs to move bodies around and
//! rewrite call targets, so every instruction that names another callable does
//! so by identifier rather than by index.
//!
//! # Textual Form
//! Every instruction has a one-line assembly form, produced by `Display` and
//! accepted by the assembler in [`crate::asm`]:
//!
//! ```text
//! push.l 42
//! push.s "hello"
//! push.f scr_player_step
//! push.a 0
//! call scr_player_step(argc=1)
//! pop
//! ret
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::asm::{parse_instruction, CompileError};

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// Push an integer constant
    PushInt(i64),
    /// Push a string constant
    PushString(String),
    /// Push a reference to a callable by identifier
    PushFunction(String),
    /// Push the n-th argument of the running unit
    PushArgument(u16),
    /// Discard the top of the stack
    Pop,
    /// Pop two integers, push their sum
    Add,
    /// Call a function, consuming `argc` stack values
    Call { target: String, argc: u16 },
    /// Return the top of the stack to the caller
    Return,
    /// Leave the unit without a value
    Exit,
    /// No operation
    Nop,
}

impl Instruction {
    /// Build a call instruction.
    pub fn call(target: impl Into<String>, argc: u16) -> Self {
        Self::Call {
            target: target.into(),
            argc,
        }
    }

    /// Name of the callable this instruction refers to, if any.
    pub fn referenced_name(&self) -> Option<&str> {
        match self {
            Self::Call { target, .. } => Some(target),
            Self::PushFunction(name) => Some(name),
            _ => None,
        }
    }

    /// Whether this is a call to `target` with exactly `argc` arguments.
    pub fn is_call_to(&self, target: &str, argc: u16) -> bool {
        matches!(self, Self::Call { target: t, argc: a } if t == target && *a == argc)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PushInt(value) => write!(f, "push.l {}", value),
            Self::PushString(value) => write!(f, "push.s \"{}\"", escape(value)),
            Self::PushFunction(name) => write!(f, "push.f {}", name),
            Self::PushArgument(index) => write!(f, "push.a {}", index),
            Self::Pop => f.write_str("pop"),
            Self::Add => f.write_str("add"),
            Self::Call { target, argc } => write!(f, "call {}(argc={})", target, argc),
            Self::Return => f.write_str("ret"),
            Self::Exit => f.write_str("exit"),
            Self::Nop => f.write_str("nop"),
        }
    }
}

impl FromStr for Instruction {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_instruction(s).map_err(|message| CompileError { line: 1, message })
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}
