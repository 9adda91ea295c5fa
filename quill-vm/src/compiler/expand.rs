// quill-vm - Macro expansion
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Macro expansion: running macro bodies on the VM at compile time.
//!
//! A form expands when its head is a symbol carrying a macro in its
//! package. The macro body is an ordinary compiled closure executed with
//! the *unevaluated* argument forms; its result replaces the form. The
//! compiler re-dispatches after each step, so expansion recurses into
//! sub-expressions as they are compiled.

use quill_reader::QuillVal;

use crate::vm::{Result, RuntimeError, Vm};

/// Iteration cap for [`macroexpand`]; a self-producing macro would
/// otherwise loop forever.
const MAX_EXPANSIONS: usize = 1_000;

/// One expansion step. `Ok(None)` when the head is not a macro call.
pub fn macroexpand_1(vm: &Vm, form: &QuillVal) -> Result<Option<QuillVal>> {
    let Some(cell) = form.as_cons() else {
        return Ok(None);
    };
    let Some(sym) = cell.first.as_symbol() else {
        return Ok(None);
    };
    let Some(package) = sym.package() else {
        return Ok(None);
    };
    let Some(def) = package.macro_of(sym) else {
        return Ok(None);
    };
    let args = cell.rest.elements().ok_or_else(|| {
        RuntimeError::type_error("proper list in macro call", form.type_name())
    })?;
    vm.execute(&def.body, &args).map(Some)
}

/// The fixed point of iterated [`macroexpand_1`] on the head position.
pub fn macroexpand(vm: &Vm, form: &QuillVal) -> Result<QuillVal> {
    let mut current = form.clone();
    for _ in 0..MAX_EXPANSIONS {
        match macroexpand_1(vm, &current)? {
            Some(next) => current = next,
            None => return Ok(current),
        }
    }
    Err(RuntimeError::Internal(
        "macro expansion did not reach a fixed point".into(),
    ))
}
