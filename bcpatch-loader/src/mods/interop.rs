//! Interop exports.
//!
//! Mods can expose native functions to the host program. All of them go
//! through one extension whose library dispatches on a selector set right
//! before each call:
//!
//! ```text
//! score_changed(x)
//!     push.s "my_mod"
//!     push.s "on_score_changed"
//!     push.l 1
//!     call interop_set_function(argc=3)
//!     pop
//!     push.a 0
//!     call score_changed_interop(argc=1)
//!     ret
//! ```

use std::path::Path;

use bcpatch_core::error::HookError;
use bcpatch_core::hooker::HookEngine;
use bcpatch_core::image::{Extension, ExtensionFile, ExtensionFunction, Instruction};

use super::InteropExport;

pub const INTEROP_EXTENSION: &str = "bcpatch_interop";
pub const SET_FUNCTION: &str = "interop_set_function";
/// Library symbol every export dispatches through
pub const DISPATCH_SYMBOL: &str = "interop_function";
pub const INTEROP_VERSION: &str = "1.0.0";
/// Extension function kind of native library exports
pub const NATIVE_KIND: u32 = 11;

/// Declare the interop extension and its selector function.
///
/// Runs once per rebuild, before any mod patches, so the selector receives
/// the first free extension id.
pub fn setup_interop(engine: &mut HookEngine<'_>, library: &Path) -> Result<(), HookError> {
    if engine.image().contains_name(SET_FUNCTION) {
        return Err(HookError::AlreadyExists(SET_FUNCTION.to_string()));
    }

    let id = engine.next_extension_id();
    engine.image_mut().extensions.push(Extension {
        name: INTEROP_EXTENSION.to_string(),
        version: INTEROP_VERSION.to_string(),
        files: vec![ExtensionFile {
            filename: library.display().to_string(),
            functions: vec![ExtensionFunction {
                name: SET_FUNCTION.to_string(),
                ext_name: SET_FUNCTION.to_string(),
                kind: NATIVE_KIND,
                id,
                argc: 3,
            }],
        }],
    });

    log::info!("Interop extension set up with {}", library.display());
    Ok(())
}

/// Declare the native side of `export` and the wrapper unit calling it.
pub fn register_export(
    engine: &mut HookEngine<'_>,
    mod_id: &str,
    export: &InteropExport,
) -> Result<(), HookError> {
    let native = format!("{}_interop", export.name);
    if engine.image().contains_name(&native) {
        return Err(HookError::AlreadyExists(native));
    }
    if engine.image().extension_function(SET_FUNCTION).is_none() {
        return Err(HookError::not_found(SET_FUNCTION));
    }

    let id = engine.next_extension_id();
    let file = engine
        .image_mut()
        .extension_mut(INTEROP_EXTENSION)
        .and_then(|extension| extension.files.first_mut())
        .ok_or_else(|| HookError::not_found(INTEROP_EXTENSION))?;
    file.functions.push(ExtensionFunction {
        name: native.clone(),
        ext_name: DISPATCH_SYMBOL.to_string(),
        kind: NATIVE_KIND,
        id,
        argc: export.argc,
    });

    let source = wrapper_source(mod_id, export, &native);
    engine.create_function(&export.name, &source, export.argc)?;

    log::info!(
        "Exported {} from mod {} as {} (id {})",
        export.symbol,
        mod_id,
        export.name,
        id
    );
    Ok(())
}

fn wrapper_source(mod_id: &str, export: &InteropExport, native: &str) -> String {
    let mut body = vec![
        Instruction::PushString(mod_id.to_string()),
        Instruction::PushString(export.symbol.clone()),
        Instruction::PushInt(i64::from(export.argc)),
        Instruction::call(SET_FUNCTION, 3),
        Instruction::Pop,
    ];
    body.extend((0..export.argc).map(Instruction::PushArgument));
    body.push(Instruction::call(native, export.argc));
    body.push(Instruction::Return);

    body.iter()
        .map(|instruction| instruction.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
