//! Whole-image call-site redirection.

use super::cursor::AsmCursor;
use super::session::{is_synthetic, RedirectTable};
use crate::error::HookError;
use crate::image::{BytecodeImage, Instruction};

/// Rewrite every call and function reference named in `table`.
///
/// Calls are matched by target name and argument count, function references
/// by name. Child entries and units generated by the hook engine are left
/// alone, so replacement bodies keep calling the function they wrap.
///
/// Returns the number of rewritten instructions. Running the same table twice
/// rewrites nothing the second time, because rewritten instructions no longer
/// name the original target.
pub fn redirect_calls(image: &mut BytecodeImage, table: &RedirectTable) -> Result<usize, HookError> {
    for (function, redirect) in table.iter() {
        if image.code(&redirect.replacement).is_none() {
            return Err(HookError::InvalidRedirect {
                function: function.clone(),
                replacement: redirect.replacement.clone(),
            });
        }
    }

    let mut rewritten = 0usize;
    for unit in image.code.iter_mut() {
        if unit.is_child() {
            continue;
        }
        if is_synthetic(&unit.name) {
            log::debug!("Skipping hook rewrite for {}", unit.name);
            continue;
        }

        for (function, redirect) in table.iter() {
            let call = Instruction::call(function.as_str(), redirect.argc);
            let mut cursor = AsmCursor::new(unit);
            while cursor.goto_next(&call) {
                cursor.replace(Instruction::call(redirect.replacement.as_str(), redirect.argc));
                rewritten += 1;
            }

            let reference = Instruction::PushFunction(function.clone());
            let mut cursor = AsmCursor::new(unit);
            while cursor.goto_next(&reference) {
                cursor.replace(Instruction::PushFunction(redirect.replacement.clone()));
                rewritten += 1;
            }
        }
    }

    Ok(rewritten)
}
