//! Hook Engine for Code Unit Substitution
//!
//! This module lets mods replace the body of code units while still being able
//! to call the body they replaced.
//!
//! # Overview
//!
//! There are two ways to hook something:
//!
//! - **Soft hooks** ([`HookEngine::hook`]) edit a code unit in place. The
//!   current body is moved into a fresh unit and the hook source becomes the new
//!   body. The placeholder token in the source names the moved body, so the
//!   hook can call it. Because the hooked unit keeps its name and arity, every
//!   call site in the image keeps working untouched.
//! - **Hard hooks** ([`HookEngine::hard_hook`]) leave the target alone. The
//!   hook source is compiled into a new unit and every call site and function
//!   reference is redirected to it by [`HookEngine::finalize_hooks`], which runs
//!   once after all mods have patched.
//!
//! # Hook Chains
//!
//! Hooking the same unit again preserves the previous hook's body the same way,
//! so hooks stack most-recent-first:
//!
//! ```text
//! scr_step          (hook 2 body)  -> call __hook_scr_step_orig_2
//! __hook_scr_step_orig_2 (hook 1 body)  -> call __hook_scr_step_orig_1
//! __hook_scr_step_orig_1 (original body)
//! ```
//!
//! # Placeholders
//!
//! The placeholder defaults to [`DEFAULT_PLACEHOLDER`] and is substituted
//! textually before compilation, so it may appear anywhere in the source.

pub mod cursor;
pub mod redirect;
pub mod session;

pub use cursor::AsmCursor;
pub use redirect::redirect_calls;
pub use session::{
    is_synthetic, HookRegistry, PatchSession, Redirect, RedirectTable, SyntheticNames,
    SYNTHETIC_PREFIX,
};

use crate::asm::Compiler;
use crate::error::HookError;
use crate::image::{BytecodeImage, CodeUnit, Instruction};

/// Placeholder token resolved to the previous body's name.
pub const DEFAULT_PLACEHOLDER: &str = "#orig#";

/// Applies hooks to one image on behalf of one patch session.
pub struct HookEngine<'a> {
    image: &'a mut BytecodeImage,
    session: &'a mut PatchSession,
    compiler: &'a dyn Compiler,
}

impl<'a> HookEngine<'a> {
    pub fn new(
        image: &'a mut BytecodeImage,
        session: &'a mut PatchSession,
        compiler: &'a dyn Compiler,
    ) -> Self {
        Self {
            image,
            session,
            compiler,
        }
    }

    pub fn image(&self) -> &BytecodeImage {
        &*self.image
    }

    /// Direct access for edits the engine has no operation for.
    pub fn image_mut(&mut self) -> &mut BytecodeImage {
        &mut *self.image
    }

    pub fn session(&self) -> &PatchSession {
        &*self.session
    }

    pub fn session_mut(&mut self) -> &mut PatchSession {
        &mut *self.session
    }

    /// Allocate an id for a new extension function.
    pub fn next_extension_id(&mut self) -> u32 {
        self.session.ids.next_id(&*self.image)
    }

    /// Replace the body of `code` with `source`.
    ///
    /// Occurrences of `placeholder` in `source` resolve to a unit holding the
    /// body being replaced. Returns that unit's name.
    ///
    /// # Errors
    /// `NotFound` if no code unit is called `code`; `Compile` if the source
    /// does not compile.
    pub fn hook(&mut self, code: &str, source: &str, placeholder: &str) -> Result<String, HookError> {
        let index = self
            .image
            .code_index(code)
            .ok_or_else(|| HookError::not_found(code))?;

        let preserved = self.preserve_body(index);
        let source = source.replace(placeholder, &preserved);
        let instructions = self.compile(code, &source)?;
        self.image.code[index].instructions = instructions;

        log::info!(
            "Hooked {} (depth {}, previous body in {})",
            code,
            self.session.hooks.depth(code),
            preserved
        );
        Ok(preserved)
    }

    /// Compile `source` into a new unit and redirect calls to `function` to it.
    ///
    /// Occurrences of `placeholder` resolve to the function being replaced (or
    /// to the previous hard hook of the same function). Calls are rewritten by
    /// [`finalize_hooks`](Self::finalize_hooks) and only when they pass exactly
    /// `argc` arguments. Returns the new unit's name.
    pub fn hard_hook(
        &mut self,
        function: &str,
        source: &str,
        argc: u16,
        placeholder: &str,
    ) -> Result<String, HookError> {
        if !self.image.is_callable(function) {
            return Err(HookError::not_found(function));
        }

        let previous = self
            .session
            .redirects
            .get(function)
            .map(|redirect| redirect.replacement.clone());
        let wrapped = previous.as_deref().unwrap_or(function);

        let hook_name = self.session.names.next(&*self.image, function, "hook");
        let source = source.replace(placeholder, wrapped);
        let instructions = self.compile(&hook_name, &source)?;

        self.image
            .code
            .push(CodeUnit::new(hook_name.clone(), argc).with_instructions(instructions));
        self.image.declare_function(&hook_name, Some(&hook_name));

        let replaced = self.session.redirects.insert(
            function,
            Redirect {
                replacement: hook_name.clone(),
                argc,
            },
        );
        if let Some(replaced) = replaced {
            log::info!(
                "Hard hook {} on {} wraps earlier hard hook {}",
                hook_name,
                function,
                replaced.replacement
            );
        } else {
            log::info!("Hard hooked {} with {} (argc={})", function, hook_name, argc);
        }
        Ok(hook_name)
    }

    /// Hard hook a function using the arity of the unit that implements it.
    pub fn hook_function(
        &mut self,
        function: &str,
        source: &str,
        placeholder: &str,
    ) -> Result<String, HookError> {
        let argc = self
            .image
            .arguments_count(function)
            .ok_or_else(|| HookError::not_found(function))?;
        self.hard_hook(function, source, argc, placeholder)
    }

    /// Edit the original body of `name` directly.
    ///
    /// If `name` was soft hooked, the edit applies to the preserved original
    /// body rather than the hook.
    pub fn hook_asm<F>(&mut self, name: &str, edit: F) -> Result<(), HookError>
    where
        F: FnOnce(&mut AsmCursor<'_>),
    {
        let target = self
            .session
            .hooks
            .original(name)
            .unwrap_or(name)
            .to_string();
        let unit = self
            .image
            .code_mut(&target)
            .ok_or_else(|| HookError::not_found(name))?;

        let mut cursor = AsmCursor::new(unit);
        edit(&mut cursor);
        log::info!("Applied instruction edit to {}", target);
        Ok(())
    }

    /// Add a new function implemented by a new code unit.
    pub fn create_function(&mut self, name: &str, source: &str, argc: u16) -> Result<(), HookError> {
        if self.image.contains_name(name) {
            return Err(HookError::AlreadyExists(name.to_string()));
        }

        let instructions = self.compile(name, source)?;
        self.image
            .code
            .push(CodeUnit::new(name, argc).with_instructions(instructions));
        self.image.declare_function(name, Some(name));
        log::info!("Created function {} (argc={})", name, argc);
        Ok(())
    }

    /// Apply every pending hard hook to the whole image.
    ///
    /// Must run once, after all mods have patched. The pending table is
    /// consumed, so a second call finds nothing to do.
    pub fn finalize_hooks(&mut self) -> Result<usize, HookError> {
        let redirects = self.session.redirects.take();
        if redirects.is_empty() {
            return Ok(0);
        }

        let rewritten = redirect_calls(&mut *self.image, &redirects)?;
        log::info!(
            "Redirected {} call sites across {} hard hooks",
            rewritten,
            redirects.len()
        );
        Ok(rewritten)
    }

    /// Move the body of the unit at `index` into a fresh unit right after it.
    fn preserve_body(&mut self, index: usize) -> String {
        let name = self.image.code[index].name.clone();
        let clone_name = self.session.names.next(&*self.image, &name, "orig");

        let original = &mut self.image.code[index];
        let clone = CodeUnit {
            name: clone_name.clone(),
            instructions: std::mem::take(&mut original.instructions),
            arguments_count: original.arguments_count,
            locals_count: original.locals_count,
            locals: std::mem::take(&mut original.locals),
            parent: None,
            children: std::mem::take(&mut original.children),
        };

        for child in &clone.children {
            if let Some(unit) = self.image.code_mut(child) {
                unit.parent = Some(clone_name.clone());
            }
        }

        self.image.insert_code_after(index, clone);
        self.image.declare_function(&clone_name, Some(&clone_name));
        self.session.hooks.record(&name, clone_name.clone());
        clone_name
    }

    fn compile(&self, target: &str, source: &str) -> Result<Vec<Instruction>, HookError> {
        self.compiler
            .compile(&*self.image, target, source)
            .map_err(|source| HookError::Compile {
                target: target.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::AsmCompiler;
    use crate::image::LocalVar;

    fn image() -> BytecodeImage {
        let mut image = BytecodeImage::default();
        image.code.push(CodeUnit {
            locals_count: 1,
            locals: vec![LocalVar {
                name: "arguments".into(),
                index: 2,
            }],
            children: ["scr_step_child".to_string()].into_iter().collect(),
            ..CodeUnit::new("scr_step", 1).with_instructions(vec![
                Instruction::PushArgument(0),
                Instruction::Return,
            ])
        });
        image.code.push(CodeUnit {
            parent: Some("scr_step".into()),
            ..CodeUnit::new("scr_step_child", 1)
        });
        image.declare_function("scr_step", Some("scr_step"));
        image
    }

    #[test]
    fn test_hook_moves_body_and_children() {
        let mut image = image();
        let mut session = PatchSession::new();
        let compiler = AsmCompiler::strict();
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);

        let preserved = engine
            .hook("scr_step", "push.a 0\ncall #orig#(argc=1)\nret", DEFAULT_PLACEHOLDER)
            .unwrap();
        assert_eq!(preserved, "__hook_scr_step_orig_1");

        let names: Vec<&str> = image.code.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["scr_step", "__hook_scr_step_orig_1", "scr_step_child"]);

        let hooked = image.code("scr_step").unwrap();
        assert_eq!(hooked.arguments_count, 1);
        assert_eq!(hooked.locals_count, 1);
        assert!(hooked.locals.is_empty());
        assert!(hooked.children.is_empty());
        assert_eq!(hooked.instructions[1], Instruction::call(preserved.as_str(), 1));

        let clone = image.code(&preserved).unwrap();
        assert_eq!(clone.instructions, vec![Instruction::PushArgument(0), Instruction::Return]);
        assert_eq!(clone.locals.len(), 1);
        assert_eq!(clone.children.as_slice(), ["scr_step_child"]);
        assert_eq!(
            image.code("scr_step_child").unwrap().parent.as_deref(),
            Some(preserved.as_str())
        );
        assert!(image.function(&preserved).is_some());
    }

    #[test]
    fn test_hook_missing_unit() {
        let mut image = image();
        let mut session = PatchSession::new();
        let compiler = AsmCompiler::new();
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
        let err = engine.hook("scr_missing", "ret", DEFAULT_PLACEHOLDER).unwrap_err();
        assert_eq!(err, HookError::NotFound("scr_missing".into()));
    }

    #[test]
    fn test_custom_placeholder() {
        let mut image = image();
        let mut session = PatchSession::new();
        let compiler = AsmCompiler::strict();
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
        engine
            .hook("scr_step", "push.f @prev@\ncall @prev@(argc=0)\nret", "@prev@")
            .unwrap();
        let hooked = image.code("scr_step").unwrap();
        assert_eq!(
            hooked.instructions[0],
            Instruction::PushFunction("__hook_scr_step_orig_1".into())
        );
    }

    #[test]
    fn test_hard_hook_waits_for_finalize() {
        let mut image = image();
        image.code.push(CodeUnit::new("scr_main", 0).with_instructions(vec![
            Instruction::PushInt(3),
            Instruction::call("scr_step", 1),
            Instruction::Return,
        ]));

        let mut session = PatchSession::new();
        let compiler = AsmCompiler::strict();
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
        let hook = engine
            .hook_function("scr_step", "push.a 0\ncall #orig#(argc=1)\nret", DEFAULT_PLACEHOLDER)
            .unwrap();
        assert_eq!(hook, "__hook_scr_step_hook_1");
        assert_eq!(
            engine.image().code("scr_main").unwrap().instructions[1],
            Instruction::call("scr_step", 1)
        );

        assert_eq!(engine.finalize_hooks().unwrap(), 1);
        assert_eq!(engine.finalize_hooks().unwrap(), 0);
        assert_eq!(
            image.code("scr_main").unwrap().instructions[1],
            Instruction::call(hook.as_str(), 1)
        );
        assert_eq!(
            image.code(&hook).unwrap().instructions[1],
            Instruction::call("scr_step", 1)
        );
    }

    #[test]
    fn test_second_hard_hook_wraps_first() {
        let mut image = image();
        let mut session = PatchSession::new();
        let compiler = AsmCompiler::new();
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
        let first = engine
            .hard_hook("scr_step", "call #orig#(argc=1)", 1, DEFAULT_PLACEHOLDER)
            .unwrap();
        let second = engine
            .hard_hook("scr_step", "call #orig#(argc=1)", 1, DEFAULT_PLACEHOLDER)
            .unwrap();

        assert_eq!(
            engine.image().code(&second).unwrap().instructions[0],
            Instruction::call(first.as_str(), 1)
        );
        assert_eq!(
            engine.session().redirects.get("scr_step").map(|r| r.replacement.as_str()),
            Some(second.as_str())
        );
    }

    #[test]
    fn test_hard_hook_missing_function() {
        let mut image = image();
        let mut session = PatchSession::new();
        let compiler = AsmCompiler::new();
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
        assert!(matches!(
            engine.hard_hook("scr_nope", "ret", 0, DEFAULT_PLACEHOLDER),
            Err(HookError::NotFound(_))
        ));
        assert!(matches!(
            engine.hook_function("scr_nope", "ret", DEFAULT_PLACEHOLDER),
            Err(HookError::NotFound(_))
        ));
        assert!(session.redirects.is_empty());
    }

    #[test]
    fn test_hook_asm_edits_original_body() {
        let mut image = image();
        let mut session = PatchSession::new();
        let compiler = AsmCompiler::new();
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
        let preserved = engine
            .hook("scr_step", "call #orig#(argc=1)\nret", DEFAULT_PLACEHOLDER)
            .unwrap();

        engine
            .hook_asm("scr_step", |cursor| {
                if cursor.goto_next(&Instruction::PushArgument(0)) {
                    cursor.insert_after(Instruction::PushInt(2));
                    cursor.insert_after(Instruction::Add);
                }
            })
            .unwrap();

        assert_eq!(
            image.code(&preserved).unwrap().instructions,
            vec![
                Instruction::PushArgument(0),
                Instruction::PushInt(2),
                Instruction::Add,
                Instruction::Return,
            ]
        );
        assert_eq!(image.code("scr_step").unwrap().instructions.len(), 2);
    }

    #[test]
    fn test_create_function_rejects_duplicates() {
        let mut image = image();
        let mut session = PatchSession::new();
        let compiler = AsmCompiler::strict();
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);

        engine
            .create_function("scr_double", "push.a 0\npush.a 0\nadd\nret", 1)
            .unwrap();
        assert_eq!(
            engine.create_function("scr_step", "ret", 0),
            Err(HookError::AlreadyExists("scr_step".into()))
        );
        assert_eq!(engine.image().arguments_count("scr_double"), Some(1));
    }

    #[test]
    fn test_compile_error_carries_target() {
        let mut image = image();
        let mut session = PatchSession::new();
        let compiler = AsmCompiler::new();
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
        let err = engine.create_function("scr_bad", "jump 3", 0).unwrap_err();
        match err {
            HookError::Compile { target, source } => {
                assert_eq!(target, "scr_bad");
                assert_eq!(source.line, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
