//! Hook Source Assembler
//!
//! Hook sources are compiled into instruction sequences through the
//! [`Compiler`] trait. The engine treats compilation as opaque; [`AsmCompiler`]
//! is the bundled implementation, a line-oriented assembler over the textual
//! instruction form documented in [`crate::image::instruction`].
//!
//! # Syntax
//! - one instruction per line, `;` starts a comment (outside string literals)
//! - blank lines are ignored
//! - identifiers may contain ASCII letters, digits, `_`, `$` and `.`
//!
//! A leftover placeholder token such as `#orig#` is not a valid identifier, so a
//! hook whose placeholder was not substituted fails to compile instead of
//! silently calling nothing.

use thiserror::Error;

use crate::image::{BytecodeImage, CodeUnit, Instruction};

/// Compilation failure, with the 1-based source line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct CompileError {
    pub line: usize,
    pub message: String,
}

/// Compiles hook source text into the body of a code unit.
pub trait Compiler {
    /// Compile `source` for the code unit named `target`.
    fn compile(
        &self,
        image: &BytecodeImage,
        target: &str,
        source: &str,
    ) -> Result<Vec<Instruction>, CompileError>;
}

/// Line-oriented assembler.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsmCompiler {
    strict: bool,
}

impl AsmCompiler {
    pub fn new() -> Self {
        Self { strict: false }
    }

    /// Reject calls and references to names the image cannot resolve.
    ///
    /// The compiled unit may always refer to itself.
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

impl Compiler for AsmCompiler {
    fn compile(
        &self,
        image: &BytecodeImage,
        target: &str,
        source: &str,
    ) -> Result<Vec<Instruction>, CompileError> {
        let mut instructions = Vec::new();

        for (index, raw) in source.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            let instruction = parse_instruction(line).map_err(|message| CompileError {
                line: index + 1,
                message,
            })?;

            if self.strict {
                if let Some(name) = instruction.referenced_name() {
                    if name != target && !image.resolves(name) {
                        return Err(CompileError {
                            line: index + 1,
                            message: format!("unknown function `{}`", name),
                        });
                    }
                }
            }

            instructions.push(instruction);
        }

        Ok(instructions)
    }
}

/// Render a unit's body in assembler syntax, one instruction per line.
pub fn disassemble(unit: &CodeUnit) -> String {
    let mut out = String::new();
    for instruction in &unit.instructions {
        out.push_str(&instruction.to_string());
        out.push('\n');
    }
    out
}

/// Parse a single instruction (no comment, no surrounding blank lines).
pub fn parse_instruction(text: &str) -> Result<Instruction, String> {
    let text = text.trim();
    let (mnemonic, operand) = match text.split_once(char::is_whitespace) {
        Some((mnemonic, rest)) => (mnemonic, rest.trim()),
        None => (text, ""),
    };

    let instruction = match mnemonic {
        "push.l" => operand
            .parse::<i64>()
            .map(Instruction::PushInt)
            .map_err(|e| format!("invalid integer `{}`: {}", operand, e))?,
        "push.s" => Instruction::PushString(parse_string(operand)?),
        "push.f" => Instruction::PushFunction(parse_identifier(operand)?.to_string()),
        "push.a" => operand
            .parse::<u16>()
            .map(Instruction::PushArgument)
            .map_err(|e| format!("invalid argument index `{}`: {}", operand, e))?,
        "call" => parse_call(operand)?,
        "pop" | "add" | "ret" | "exit" | "nop" => {
            if !operand.is_empty() {
                return Err(format!("`{}` takes no operand", mnemonic));
            }
            match mnemonic {
                "pop" => Instruction::Pop,
                "add" => Instruction::Add,
                "ret" => Instruction::Return,
                "exit" => Instruction::Exit,
                _ => Instruction::Nop,
            }
        }
        other => return Err(format!("unknown mnemonic `{}`", other)),
    };

    Ok(instruction)
}

/// `name(argc=N)`
fn parse_call(operand: &str) -> Result<Instruction, String> {
    let (name, rest) = operand
        .split_once('(')
        .ok_or_else(|| format!("expected `name(argc=N)`, found `{}`", operand))?;
    let argc = rest
        .strip_suffix(')')
        .and_then(|inner| inner.trim().strip_prefix("argc="))
        .ok_or_else(|| format!("expected `(argc=N)` after `{}`", name.trim()))?;
    let argc = argc
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("invalid argument count `{}`: {}", argc, e))?;

    Ok(Instruction::call(parse_identifier(name.trim())?, argc))
}

fn parse_identifier(text: &str) -> Result<&str, String> {
    let valid = !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if valid {
        Ok(text)
    } else {
        Err(format!("invalid identifier `{}`", text))
    }
}

fn parse_string(text: &str) -> Result<String, String> {
    let body = text
        .strip_prefix('"')
        .ok_or_else(|| format!("expected string literal, found `{}`", text))?;

    let mut value = String::new();
    let mut chars = body.chars();
    loop {
        match chars.next() {
            None => return Err("unterminated string literal".to_string()),
            Some('"') => break,
            Some('\\') => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('"') => value.push('"'),
                Some('\\') => value.push('\\'),
                Some(other) => return Err(format!("unknown escape `\\{}`", other)),
                None => return Err("unterminated string literal".to_string()),
            },
            Some(other) => value.push(other),
        }
    }

    let trailing = chars.as_str().trim();
    if !trailing.is_empty() {
        return Err(format!("unexpected `{}` after string literal", trailing));
    }
    Ok(value)
}

/// Cut a `;` comment, ignoring semicolons inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}
