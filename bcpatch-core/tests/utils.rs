//! Test Utilities
//!
//! Image builders and a small stack evaluator used to check that patched
//! images still behave: the evaluator runs a code unit and records which units
//! were entered, so tests can assert on the exact call path.

#![allow(dead_code)]

use std::collections::HashMap;

use bcpatch_core::asm::{AsmCompiler, Compiler};
use bcpatch_core::image::{BytecodeImage, CodeUnit, Instruction};

/// Stack value of the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
    Func(String),
}

/// Build a unit from assembler source.
pub fn unit(name: &str, argc: u16, source: &str) -> CodeUnit {
    let instructions = AsmCompiler::new()
        .compile(&BytecodeImage::default(), name, source)
        .unwrap();
    CodeUnit::new(name, argc).with_instructions(instructions)
}

/// Build an image from `(name, argc, source)` triples, declaring each unit
/// as a function.
pub fn image_from(units: &[(&str, u16, &str)]) -> BytecodeImage {
    let mut image = BytecodeImage::default();
    for (name, argc, source) in units {
        image.code.push(unit(name, *argc, source));
        image.declare_function(name, Some(name));
    }
    image
}

/// Minimal interpreter over [`Instruction`].
///
/// Calls to names without a code unit are treated as natives: they are
/// recorded in the trace as `native:<name>` and return 0.
pub struct Evaluator<'a> {
    image: &'a BytecodeImage,
    pub trace: Vec<String>,
    depth_limit: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(image: &'a BytecodeImage) -> Self {
        Self {
            image,
            trace: Vec::new(),
            depth_limit: 64,
        }
    }

    /// Run `name` with `args` and return its result.
    pub fn run(&mut self, name: &str, args: Vec<Value>) -> Value {
        self.call(name, args, 0)
    }

    /// How many times `name` was entered.
    pub fn entries(&self, name: &str) -> usize {
        self.trace.iter().filter(|entry| *entry == name).count()
    }

    fn resolve(&self, name: &str) -> Option<&'a CodeUnit> {
        if let Some(unit) = self.image.code(name) {
            return Some(unit);
        }
        let code = self.image.function(name)?.code.as_deref()?;
        self.image.code(code)
    }

    fn call(&mut self, name: &str, args: Vec<Value>, depth: usize) -> Value {
        assert!(depth < self.depth_limit, "call depth exceeded at {}", name);

        let unit = match self.resolve(name) {
            Some(unit) => unit,
            None => {
                self.trace.push(format!("native:{}", name));
                return Value::Int(0);
            }
        };
        self.trace.push(unit.name.clone());

        let mut stack: Vec<Value> = Vec::new();
        for instruction in &unit.instructions {
            match instruction {
                Instruction::PushInt(value) => stack.push(Value::Int(*value)),
                Instruction::PushString(value) => stack.push(Value::Str(value.clone())),
                Instruction::PushFunction(value) => stack.push(Value::Func(value.clone())),
                Instruction::PushArgument(index) => {
                    stack.push(args.get(*index as usize).cloned().unwrap_or(Value::Int(0)))
                }
                Instruction::Pop => {
                    stack.pop();
                }
                Instruction::Add => {
                    let b = stack.pop().expect("add needs two operands");
                    let a = stack.pop().expect("add needs two operands");
                    stack.push(match (a, b) {
                        (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
                        (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
                        (a, b) => panic!("cannot add {:?} and {:?}", a, b),
                    });
                }
                Instruction::Call { target, argc } => {
                    let split = stack.len().saturating_sub(*argc as usize);
                    let call_args = stack.split_off(split);
                    let result = self.call(target, call_args, depth + 1);
                    stack.push(result);
                }
                Instruction::Return => return stack.pop().unwrap_or(Value::Int(0)),
                Instruction::Exit => return Value::Int(0),
                Instruction::Nop => {}
            }
        }
        Value::Int(0)
    }
}

/// Number of calls made to each native.
pub fn natives(trace: &[String]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for entry in trace {
        if let Some(name) = entry.strip_prefix("native:") {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    counts
}
