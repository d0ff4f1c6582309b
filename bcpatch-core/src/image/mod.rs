//! Bytecode Image Model
//!
//! The [`BytecodeImage`] is the whole mutable program representation: every
//! code unit, the table of callable function declarations and the table of
//! native extensions. A patch run owns exactly one image and mutates it in
//! place; nothing here knows about the physical file layout (see [`codec`]).
//!
//! # Code Units
//! Code unit names are unique within an image. A unit whose `parent` is set is
//! a child entry: it shares the body of its parent and is never rewritten on
//! its own.

pub mod codec;
pub mod instruction;

pub use instruction::Instruction;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The full in-memory program representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BytecodeImage {
    /// Code units, in image order
    pub code: Vec<CodeUnit>,
    /// Callable function declarations
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
    /// Native extensions and their exported functions
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

/// A named, independently addressable instruction sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub name: String,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub arguments_count: u16,
    #[serde(default)]
    pub locals_count: u16,
    #[serde(default)]
    pub locals: Vec<LocalVar>,
    /// Unit whose body this entry shares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Child entries sharing this unit's body.
    /// Most units have none, a handful of event scripts have one or two.
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub children: SmallVec<[String; 2]>,
}

/// A local variable slot of a code unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVar {
    pub name: String,
    pub index: u32,
}

/// Declaration of a callable function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    /// Code unit implementing the function, when it is a script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A native extension shipped with the program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub files: Vec<ExtensionFile>,
}

/// A library file belonging to an extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionFile {
    pub filename: String,
    #[serde(default)]
    pub functions: Vec<ExtensionFunction>,
}

/// A function exported by an extension library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionFunction {
    /// Name used by code units to call the function
    pub name: String,
    /// Symbol name inside the library
    pub ext_name: String,
    pub kind: u32,
    pub id: u32,
    #[serde(default)]
    pub argc: u16,
}

impl CodeUnit {
    /// Create an empty unit taking `arguments_count` arguments.
    pub fn new(name: impl Into<String>, arguments_count: u16) -> Self {
        Self {
            name: name.into(),
            arguments_count,
            ..Self::default()
        }
    }

    pub fn with_instructions(mut self, instructions: Vec<Instruction>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }
}

impl BytecodeImage {
    pub fn code(&self, name: &str) -> Option<&CodeUnit> {
        self.code.iter().find(|unit| unit.name == name)
    }

    pub fn code_mut(&mut self, name: &str) -> Option<&mut CodeUnit> {
        self.code.iter_mut().find(|unit| unit.name == name)
    }

    pub fn code_index(&self, name: &str) -> Option<usize> {
        self.code.iter().position(|unit| unit.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|function| function.name == name)
    }

    pub fn extension_function(&self, name: &str) -> Option<&ExtensionFunction> {
        self.extension_functions().find(|function| function.name == name)
    }

    /// Iterate every function declared by every extension file.
    pub fn extension_functions(&self) -> impl Iterator<Item = &ExtensionFunction> {
        self.extensions
            .iter()
            .flat_map(|extension| extension.files.iter())
            .flat_map(|file| file.functions.iter())
    }

    /// Whether `name` is a code unit or a declared function.
    pub fn is_callable(&self, name: &str) -> bool {
        self.code(name).is_some() || self.function(name).is_some()
    }

    /// Whether a call to `name` can be resolved at all, natives included.
    pub fn resolves(&self, name: &str) -> bool {
        self.is_callable(name) || self.extension_function(name).is_some()
    }

    /// Whether `name` is taken by any code unit, function or extension function.
    pub fn contains_name(&self, name: &str) -> bool {
        self.resolves(name)
    }

    /// Argument count of the code unit backing `name`.
    ///
    /// Looks at a unit of that exact name first, then at the unit referenced by
    /// a function declaration.
    pub fn arguments_count(&self, name: &str) -> Option<u16> {
        if let Some(unit) = self.code(name) {
            return Some(unit.arguments_count);
        }
        let code = self.function(name)?.code.as_deref()?;
        self.code(code).map(|unit| unit.arguments_count)
    }

    /// Insert `unit` directly after the unit at `anchor`.
    pub fn insert_code_after(&mut self, anchor: usize, unit: CodeUnit) {
        let index = (anchor + 1).min(self.code.len());
        self.code.insert(index, unit);
    }

    /// Declare `name` as a callable function backed by `code`.
    ///
    /// Redeclaring an existing function is a no-op.
    pub fn declare_function(&mut self, name: &str, code: Option<&str>) {
        if self.function(name).is_some() {
            return;
        }
        self.functions.push(FunctionDecl {
            name: name.to_string(),
            code: code.map(str::to_string),
        });
    }

    pub fn extension_mut(&mut self, name: &str) -> Option<&mut Extension> {
        self.extensions.iter_mut().find(|extension| extension.name == name)
    }

    /// Total number of instructions across all units.
    pub fn instruction_count(&self) -> usize {
        self.code.iter().map(|unit| unit.instructions.len()).sum()
    }
}
